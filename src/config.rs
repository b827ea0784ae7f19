use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::MatrixConversion;
use crate::record::{KmerSet, Metric};
use crate::taxonomy::DEFAULT_ACCESSION_COLUMN;
use crate::terminal::{FuseArgs, RunArgs, SelectionArgs};

/// Metric and accepted k-mer sizes for one fusion axis
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MetricSelection {
    pub metric: Metric,
    pub kmers: KmerSet,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaxonomyConfig {
    pub path: PathBuf,
    pub column: String,
}

impl TaxonomyConfig {
    pub fn with_default(path: PathBuf) -> Self {
        Self {
            path,
            column: DEFAULT_ACCESSION_COLUMN.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub workdir: PathBuf,
    pub source: Option<PathBuf>,
    pub x: MetricSelection,
    pub y: MetricSelection,
    pub taxonomy: Option<TaxonomyConfig>,
    pub sketch_matrix: MatrixConversion,
}

impl PipelineConfig {
    /// Configuration with all k-mer sizes accepted and no taxonomy reference
    pub fn with_default(workdir: PathBuf, metric_x: Metric, metric_y: Metric) -> Self {
        Self {
            workdir,
            source: None,
            x: MetricSelection {
                metric: metric_x,
                kmers: KmerSet::any(),
            },
            y: MetricSelection {
                metric: metric_y,
                kmers: KmerSet::any(),
            },
            taxonomy: None,
            sketch_matrix: MatrixConversion::Euclidean,
        }
    }
    pub fn from_run_args(args: &RunArgs) -> Self {
        let (x, y) = selections(&args.selection);
        Self {
            workdir: args.workdir.clone(),
            source: args.source.clone(),
            x,
            y,
            taxonomy: args.taxonomy.as_ref().map(|path| TaxonomyConfig {
                path: path.clone(),
                column: args.taxonomy_column.clone(),
            }),
            sketch_matrix: args.sketch_matrix,
        }
    }
    pub fn from_fuse_args(args: &FuseArgs) -> Self {
        let (x, y) = selections(&args.selection);
        Self {
            x,
            y,
            ..Self::with_default(args.workdir.clone(), args.selection.metric_x, args.selection.metric_y)
        }
    }
    /// Whether both axes select the same metric family table
    pub fn same_metric(&self) -> bool {
        self.x.metric == self.y.metric
    }
}

fn selections(args: &SelectionArgs) -> (MetricSelection, MetricSelection) {
    (
        MetricSelection {
            metric: args.metric_x,
            kmers: args.kmers_x.clone().unwrap_or_default(),
        },
        MetricSelection {
            metric: args.metric_y,
            kmers: args.kmers_y.clone().unwrap_or_default(),
        },
    )
}
