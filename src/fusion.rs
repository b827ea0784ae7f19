use std::collections::HashMap;
use std::path::Path;

use itertools::Itertools;

use crate::error::MetricsError;
use crate::family::FamilyTable;
use crate::record::{GenomePairRecord, KmerSet, Metric, Parameter, Tool};

/// One side of a pairwise fusion
#[derive(Debug, Clone, Copy)]
pub struct FusionSide<'a> {
    pub metric: Metric,
    pub kmers: &'a KmerSet,
    pub table: &'a FamilyTable,
}

/// Value, parameter and algorithm contributed by one side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideValue {
    pub value: f64,
    pub parameter: Parameter,
    pub algorithm: Tool,
}

impl From<&GenomePairRecord> for SideValue {
    fn from(record: &GenomePairRecord) -> Self {
        Self {
            value: record.value,
            parameter: record.parameter,
            algorithm: record.algorithm,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedRecord {
    pub genome_a: String,
    pub genome_b: String,
    pub x: SideValue,
    pub y: SideValue,
}

impl FusedRecord {
    fn fields(&self) -> [String; 8] {
        [
            self.genome_a.clone(),
            self.genome_b.clone(),
            self.x.value.to_string(),
            self.x.parameter.to_string(),
            self.x.algorithm.to_string(),
            self.y.value.to_string(),
            self.y.parameter.to_string(),
            self.y.algorithm.to_string(),
        ]
    }
}

/// Fused table of two metric families for one taxon
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub header: Vec<String>,
    pub records: Vec<FusedRecord>,
}

impl Summary {
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    /// Write the summary, header only when the join is empty
    pub fn write_csv(&self, path: &Path) -> Result<(), MetricsError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(&self.header)?;
        for record in &self.records {
            writer.write_record(record.fields())?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Column names of the fused table; the same metric on both sides is suffixed `_x` and `_y`
pub fn summary_header(x: Metric, y: Metric) -> Vec<String> {
    let (suffix_x, suffix_y) = if x == y { ("_x", "_y") } else { ("", "") };
    let side = |metric: Metric, suffix: &str| {
        let key = metric.key();
        [
            format!("{key}_distance{suffix}"),
            format!("kmer_{key}{suffix}"),
            format!("algorithm_{key}{suffix}"),
        ]
    };

    let mut header = vec!["GenomeA".to_string(), "GenomeB".to_string()];
    header.extend(side(x, suffix_x));
    header.extend(side(y, suffix_y));
    header
}

/// Inner join of two family tables on the genome pair.
///
/// Every algorithm and accepted parameter of one side is joined with every
/// algorithm and accepted parameter of the other, in tool order and ascending
/// parameter order. Rows of one combination are sorted by genome pair. For the
/// same metric on both sides a sub-table is never joined with itself.
pub fn fuse(x: &FusionSide, y: &FusionSide) -> Summary {
    let same_metric = x.metric == y.metric;
    let mut records = Vec::new();

    for (tool_x, tool_y) in x.metric.tools().iter().cartesian_product(y.metric.tools().iter()) {
        let parameters_x = accepted_parameters(x, *tool_x);
        let parameters_y = accepted_parameters(y, *tool_y);

        for (parameter_x, parameter_y) in parameters_x.iter().cartesian_product(parameters_y.iter()) {
            if same_metric && tool_x == tool_y && parameter_x == parameter_y {
                continue;
            }

            let right: HashMap<(&str, &str), &GenomePairRecord> = y
                .table
                .subset(*tool_y, *parameter_y)
                .into_iter()
                .map(|r| ((r.genome_a.as_str(), r.genome_b.as_str()), r))
                .collect();

            let joined = x
                .table
                .subset(*tool_x, *parameter_x)
                .into_iter()
                .filter_map(|left| {
                    right
                        .get(&(left.genome_a.as_str(), left.genome_b.as_str()))
                        .map(|right| FusedRecord {
                            genome_a: left.genome_a.clone(),
                            genome_b: left.genome_b.clone(),
                            x: SideValue::from(left),
                            y: SideValue::from(*right),
                        })
                })
                .sorted_by(|a, b| (&a.genome_a, &a.genome_b).cmp(&(&b.genome_a, &b.genome_b)))
                .collect::<Vec<_>>();

            log::debug!(
                "Joined {tool_x} (k = {parameter_x}) with {tool_y} (k = {parameter_y}): {} rows",
                joined.len()
            );
            records.extend(joined);
        }
    }

    Summary {
        header: summary_header(x.metric, y.metric),
        records,
    }
}

fn accepted_parameters(side: &FusionSide, tool: Tool) -> Vec<Parameter> {
    side.table
        .parameters(tool)
        .into_iter()
        .filter(|p| side.kmers.accepts(p))
        .collect()
}
