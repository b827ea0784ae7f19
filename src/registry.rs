use std::path::PathBuf;

use indexmap::IndexMap;

use crate::error::MetricsError;
use crate::parser::{
    DistanceMatrixParser, DistancePairParser, IdentityLayout, IdentityPairParser,
    MatrixConversion, ParameterPattern, ToolParser,
};
use crate::record::{Metric, MetricFamily, Tool};
use crate::utils::{get_file_component, list_files, FileComponent};
use crate::workspace::{is_derived_artifact, TaxonWorkspace};

/// File names a tool writes its output under
#[derive(Debug, Clone)]
pub struct FilePattern {
    /// Accepted file name prefixes
    pub prefixes: &'static [&'static str],
    /// Required file name suffix
    pub suffix: Option<&'static str>,
    /// Rejected file name suffix
    pub exclude_suffix: Option<&'static str>,
    /// Additional directory below the taxon workspace, `{taxon}` is substituted
    pub nested: Option<&'static str>,
}

impl FilePattern {
    pub fn matches(&self, file_name: &str) -> bool {
        if is_derived_artifact(file_name) {
            return false;
        }
        let prefixed = self.prefixes.iter().any(|p| file_name.starts_with(p));
        let suffixed = self.suffix.map_or(true, |s| file_name.ends_with(s));
        let excluded = self.exclude_suffix.map_or(false, |s| file_name.ends_with(s));

        prefixed && suffixed && !excluded
    }
    /// Directories searched for a taxon workspace
    pub fn search_dirs(&self, workspace: &TaxonWorkspace) -> Vec<PathBuf> {
        let mut dirs = vec![workspace.path.clone()];
        if let Some(nested) = self.nested {
            dirs.push(workspace.path.join(nested.replace("{taxon}", &workspace.name)));
        }
        dirs
    }
}

/// Everything needed to turn one tool's output files into records
#[derive(Debug)]
pub struct ToolEntry {
    pub tool: Tool,
    pub family: MetricFamily,
    pub files: FilePattern,
    pub parameter: ParameterPattern,
    pub parser: Box<dyn ToolParser>,
}

impl ToolEntry {
    /// Raw output files of this tool in a taxon workspace, in sorted path order
    pub fn locate(&self, workspace: &TaxonWorkspace) -> Result<Vec<PathBuf>, MetricsError> {
        let mut found = Vec::new();
        for dir in self.files.search_dirs(workspace) {
            if !dir.is_dir() {
                continue;
            }
            for path in list_files(&dir)? {
                let file_name = get_file_component(&path, FileComponent::FileName)?;
                if self.files.matches(&file_name) {
                    found.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Ordered mapping of tools to their file patterns and parsers
#[derive(Debug)]
pub struct ToolRegistry {
    entries: IndexMap<Tool, ToolEntry>,
}

impl ToolRegistry {
    /// Registry with the sketch similarity matrix converted as requested
    pub fn new(sketch_matrix: MatrixConversion) -> Self {
        let entries = vec![
            ToolEntry {
                tool: Tool::Fastani,
                family: MetricFamily::Identity,
                files: FilePattern {
                    prefixes: &["fastani"],
                    suffix: None,
                    exclude_suffix: Some(".csv"),
                    nested: None,
                },
                parameter: ParameterPattern::TrailingDigits,
                parser: Box::new(IdentityPairParser::new(IdentityLayout::FragmentMapping)),
            },
            ToolEntry {
                tool: Tool::Skani,
                family: MetricFamily::Identity,
                files: FilePattern {
                    prefixes: &["skani"],
                    suffix: None,
                    exclude_suffix: Some(".csv"),
                    nested: None,
                },
                parameter: ParameterPattern::Static,
                parser: Box::new(IdentityPairParser::new(IdentityLayout::AlignFraction)),
            },
            ToolEntry {
                tool: Tool::Mash,
                family: MetricFamily::Distance,
                files: FilePattern {
                    prefixes: &["mash"],
                    suffix: Some(".tab"),
                    exclude_suffix: None,
                    nested: None,
                },
                parameter: ParameterPattern::KmerTag,
                parser: Box::new(DistancePairParser),
            },
            ToolEntry {
                tool: Tool::Sourmash,
                family: MetricFamily::Distance,
                files: FilePattern {
                    prefixes: &["sourmash"],
                    suffix: Some(".csv"),
                    exclude_suffix: None,
                    nested: None,
                },
                parameter: ParameterPattern::KmerTag,
                parser: Box::new(DistanceMatrixParser::new(sketch_matrix)),
            },
            ToolEntry {
                tool: Tool::Comparem,
                family: MetricFamily::Identity,
                files: FilePattern {
                    prefixes: &["aai_summary"],
                    suffix: Some(".tsv"),
                    exclude_suffix: None,
                    nested: Some("{taxon}_compare_results/aai"),
                },
                parameter: ParameterPattern::Static,
                parser: Box::new(IdentityPairParser::new(IdentityLayout::OrthologSummary)),
            },
            ToolEntry {
                tool: Tool::Viridic,
                family: MetricFamily::Identity,
                files: FilePattern {
                    prefixes: &["viridic"],
                    suffix: Some(".csv"),
                    exclude_suffix: None,
                    nested: None,
                },
                parameter: ParameterPattern::Static,
                parser: Box::new(DistanceMatrixParser::new(MatrixConversion::AsIs)),
            },
            ToolEntry {
                tool: Tool::Vcontact2,
                family: MetricFamily::Identity,
                files: FilePattern {
                    prefixes: &["vcontact2", "c1"],
                    suffix: Some(".ntw"),
                    exclude_suffix: None,
                    nested: None,
                },
                parameter: ParameterPattern::Static,
                parser: Box::new(IdentityPairParser::new(IdentityLayout::SimilarityNetwork)),
            },
        ];

        Self {
            entries: entries.into_iter().map(|entry| (entry.tool, entry)).collect(),
        }
    }
    pub fn entry(&self, tool: Tool) -> Option<&ToolEntry> {
        self.entries.get(&tool)
    }
    /// Entries contributing to a metric, in the metric's tool order
    pub fn entries_for(&self, metric: Metric) -> impl Iterator<Item = &ToolEntry> {
        metric.tools().iter().filter_map(|tool| self.entries.get(tool))
    }
    /// Whether any tool of the metrics has raw output in the workspace
    pub fn has_raw_inputs(&self, workspace: &TaxonWorkspace, metrics: &[Metric]) -> bool {
        metrics
            .iter()
            .flat_map(|metric| self.entries_for(*metric))
            .any(|entry| entry.locate(workspace).map_or(false, |files| !files.is_empty()))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(MatrixConversion::Euclidean)
    }
}

#[cfg(test)]
#[cfg(not(tarpaulin_include))]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use std::path::Path;

    #[test]
    fn registry_covers_every_metric_tool() {
        let registry = ToolRegistry::default();
        for metric in [Metric::Mash, Metric::Ani, Metric::Aai, Metric::Viridic, Metric::Vcontact2] {
            let tools = registry.entries_for(metric).map(|e| e.tool).collect::<Vec<_>>();
            assert_eq!(tools, metric.tools().to_vec());
            for entry in registry.entries_for(metric) {
                assert_eq!(entry.family, metric.family());
            }
        }
    }

    #[test]
    fn file_pattern_matches_raw_outputs() {
        let registry = ToolRegistry::default();
        let fastani = &registry.entry(Tool::Fastani).unwrap().files;
        assert!(fastani.matches("fastani_Testvirus_frag_500_16.txt"));
        assert!(!fastani.matches("fastani_Testvirus_16.csv"));

        let mash = &registry.entry(Tool::Mash).unwrap().files;
        assert!(mash.matches("mash_Testvirus_k21.tab"));
        assert!(!mash.matches("mash_Testvirus_k21.txt"));

        let vcontact2 = &registry.entry(Tool::Vcontact2).unwrap().files;
        assert!(vcontact2.matches("c1.ntw"));
    }

    #[test]
    fn file_pattern_rejects_derived_artifacts() {
        let registry = ToolRegistry::default();
        let viridic = &registry.entry(Tool::Viridic).unwrap().files;
        assert!(viridic.matches("viridic_Testvirus.csv"));
        assert!(!viridic.matches("viridic_results_Testvirus.csv"));
        assert!(!viridic.matches("viridic_metrics_Testvirus.csv"));

        let mash = &registry.entry(Tool::Mash).unwrap().files;
        assert!(!mash.matches("mash_results_Testvirus.tab"));
    }

    #[test]
    fn locate_searches_nested_comparem_dir() {
        let registry = ToolRegistry::default();
        let workspace = TaxonWorkspace::new(Path::new("tests/cases"), "Testvirus");

        let comparem = registry.entry(Tool::Comparem).unwrap().locate(&workspace).unwrap();
        assert_eq!(
            comparem,
            vec![PathBuf::from(
                "tests/cases/Testvirus/Testvirus_compare_results/aai/aai_summary.tsv"
            )]
        );

        let mash = registry.entry(Tool::Mash).unwrap().locate(&workspace).unwrap();
        assert_eq!(mash.len(), 2);
        assert!(mash[0] < mash[1]);
    }

    #[test]
    fn default_sketch_matrix_uses_row_distances() {
        let registry = ToolRegistry::default();
        let sourmash = registry.entry(Tool::Sourmash).unwrap();
        let pairs = sourmash
            .parser
            .parse(Path::new("tests/cases/sourmash_matrix_k31.csv"))
            .unwrap();

        // rows G1 and G2 differ by 0.2, 0.2 and 0.1
        assert_eq!(pairs.len(), 3);
        assert_float_eq!(pairs[0].value, 0.3, abs <= 1e-12);
        assert_float_eq!(pairs[2].value, 0.54f64.sqrt(), abs <= 1e-12);
    }

    #[test]
    fn has_raw_inputs_ok() {
        let registry = ToolRegistry::default();
        let workspace = TaxonWorkspace::new(Path::new("tests/cases"), "Testvirus");
        assert!(registry.has_raw_inputs(&workspace, &[Metric::Ani]));

        let empty = tempfile::tempdir().unwrap();
        let workspace = TaxonWorkspace::new(empty.path(), "Emptyvirus");
        assert!(!registry.has_raw_inputs(&workspace, &[Metric::Ani, Metric::Mash]));
    }
}
