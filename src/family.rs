use std::collections::HashSet;
use std::path::Path;

use indexmap::map::Entry;
use indexmap::IndexMap;
use itertools::Itertools;

use crate::error::MetricsError;
use crate::genome::normalize_genome_id;
use crate::record::{GenomePairRecord, KmerSet, Metric, Parameter, RecordKey, Tool};
use crate::registry::{ToolEntry, ToolRegistry};
use crate::taxonomy::TaxonomyReference;
use crate::utils::{get_file_component, FileComponent};
use crate::workspace::TaxonWorkspace;

/// Decimal digits of persisted metric values
pub const ROUND_DIGITS: i32 = 6;

/// Column names of a persisted family table
pub fn family_header(metric: Metric) -> Vec<String> {
    let key = metric.key();
    vec![
        "GenomeA".to_string(),
        "GenomeB".to_string(),
        format!("{key}_distance"),
        format!("kmer_{key}"),
        format!("algorithm_{key}"),
    ]
}

/// All records of one metric family for one taxon
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyTable {
    pub metric: Metric,
    pub records: Vec<GenomePairRecord>,
}

/// Running state while records are collected into a table
#[derive(Default)]
struct Collector {
    records: IndexMap<RecordKey, GenomePairRecord>,
    duplicates: usize,
    unresolved: HashSet<String>,
    excluded: usize,
}

impl Collector {
    fn insert(&mut self, record: GenomePairRecord, taxonomy: Option<&TaxonomyReference>) {
        if let Some(reference) = taxonomy {
            let mut resolved = true;
            for genome in [&record.genome_a, &record.genome_b] {
                if !reference.resolves(genome) {
                    resolved = false;
                    if self.unresolved.insert(genome.clone()) {
                        log::warn!("Genome '{genome}' not found in taxonomy reference, excluding its records");
                    }
                }
            }
            if !resolved {
                self.excluded += 1;
                return;
            }
        }
        match self.records.entry(record.key()) {
            Entry::Occupied(_) => self.duplicates += 1,
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }
}

impl FamilyTable {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            records: Vec::new(),
        }
    }
    /// Collect every accepted raw output of the metric's tools in a taxon workspace.
    ///
    /// Files that cannot be listed, named or parsed are skipped with a warning.
    /// Records keep file order; the first occurrence of a duplicate key wins.
    pub fn aggregate(
        metric: Metric,
        workspace: &TaxonWorkspace,
        registry: &ToolRegistry,
        kmers: &KmerSet,
        taxonomy: Option<&TaxonomyReference>,
    ) -> Self {
        let mut collector = Collector::default();

        for entry in registry.entries_for(metric) {
            let files = match entry.locate(workspace) {
                Ok(files) => files,
                Err(e) => {
                    log::warn!("Failed to list {} outputs for '{}': {e}", entry.tool, workspace.name);
                    continue;
                }
            };
            if files.is_empty() {
                log::warn!("No {} output found for '{}'", entry.tool, workspace.name);
                continue;
            }
            for file in files {
                collect_file(entry, &file, kmers, taxonomy, &mut collector);
            }
        }

        if collector.duplicates > 0 {
            log::warn!(
                "Dropped {} duplicate {} records for '{}'",
                collector.duplicates,
                metric,
                workspace.name
            );
        }
        if collector.excluded > 0 {
            log::warn!(
                "Excluded {} {} records with genomes missing from the taxonomy reference",
                collector.excluded,
                metric
            );
        }

        let table = Self {
            metric,
            records: collector.records.into_values().collect(),
        };
        if table.is_empty() {
            log::warn!("No {} records collected for '{}'", metric, workspace.name);
        }
        table
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn rounded(&self) -> Self {
        Self {
            metric: self.metric,
            records: self.records.iter().map(|r| r.rounded(ROUND_DIGITS)).collect(),
        }
    }
    /// Records of one algorithm and parameter, in table order
    pub fn subset(&self, tool: Tool, parameter: Parameter) -> Vec<&GenomePairRecord> {
        self.records
            .iter()
            .filter(|r| r.algorithm == tool && r.parameter == parameter)
            .collect()
    }
    /// Distinct parameters recorded for an algorithm, ascending with `static` last
    pub fn parameters(&self, tool: Tool) -> Vec<Parameter> {
        self.records
            .iter()
            .filter(|r| r.algorithm == tool)
            .map(|r| r.parameter)
            .unique()
            .sorted()
            .collect()
    }
    pub fn write_csv(&self, path: &Path) -> Result<(), MetricsError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;

        writer.write_record(family_header(self.metric))?;
        for record in &self.records {
            writer.write_record([
                record.genome_a.clone(),
                record.genome_b.clone(),
                record.value.to_string(),
                record.parameter.to_string(),
                record.algorithm.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
    /// Reload a table persisted by [`FamilyTable::write_csv`]
    pub fn from_csv(metric: Metric, path: &Path) -> Result<Self, MetricsError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

        let expected = family_header(metric);
        let headers = reader.headers()?.clone();
        if !headers.iter().eq(expected.iter().map(String::as_str)) {
            return Err(MetricsError::FamilyHeaderMismatch {
                path: path.to_path_buf(),
                expected: expected.join(","),
                found: headers.iter().join(","),
            });
        }

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result?;
            if row.len() < expected.len() {
                return Err(MetricsError::FamilyRecordSize(path.to_path_buf()));
            }
            records.push(GenomePairRecord {
                genome_a: row[0].to_string(),
                genome_b: row[1].to_string(),
                value: row[2].parse::<f64>()?,
                parameter: row[3].parse::<Parameter>()?,
                algorithm: row[4].parse::<Tool>()?,
                family: metric.family(),
            });
        }
        Ok(Self { metric, records })
    }
}

fn collect_file(
    entry: &ToolEntry,
    file: &Path,
    kmers: &KmerSet,
    taxonomy: Option<&TaxonomyReference>,
    collector: &mut Collector,
) {
    let file_name = match get_file_component(file, FileComponent::FileName) {
        Ok(name) => name,
        Err(e) => {
            log::warn!("Skipping {}: {e}", file.display());
            return;
        }
    };
    let parameter = match entry.parameter.extract(&file_name) {
        Ok(parameter) => parameter,
        Err(e) => {
            log::warn!("Skipping {} output {}: {e}", entry.tool, file.display());
            return;
        }
    };
    if !kmers.accepts(&parameter) {
        log::debug!("Skipping {} output {} (k = {parameter})", entry.tool, file.display());
        return;
    }
    let pairs = match entry.parser.parse(file) {
        Ok(pairs) => pairs,
        Err(e) => {
            log::warn!("Skipping {} output {}: {e}", entry.tool, file.display());
            return;
        }
    };
    if pairs.is_empty() {
        log::warn!("No records in {} output {}", entry.tool, file.display());
    }

    for pair in pairs {
        collector.insert(
            GenomePairRecord {
                genome_a: normalize_genome_id(&pair.genome_a),
                genome_b: normalize_genome_id(&pair.genome_b),
                value: pair.value,
                parameter,
                algorithm: entry.tool,
                family: entry.family,
            },
            taxonomy,
        );
    }
}

#[cfg(test)]
#[cfg(not(tarpaulin_include))]
mod tests {

    use float_eq::assert_float_eq;
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::*;

    /*
    ===============
      Test cases
    ===============
    */

    struct TestCases {
        workdir: PathBuf,
        taxon: String,
    }

    impl TestCases {
        fn new() -> Self {
            Self {
                workdir: PathBuf::from("tests/cases"),
                taxon: String::from("Testvirus"),
            }
        }
        fn workspace(&self) -> TaxonWorkspace {
            TaxonWorkspace::new(&self.workdir, &self.taxon)
        }
    }

    #[test]
    fn aggregate_mash_family_ok() {
        let test_cases = TestCases::new();
        let table = FamilyTable::aggregate(
            Metric::Mash,
            &test_cases.workspace(),
            &ToolRegistry::default(),
            &KmerSet::any(),
            None,
        );
        // k15: 1, k21: 3 after the duplicate, sourmash k31: 3
        assert_eq!(table.len(), 7);
        assert_eq!(
            table.parameters(Tool::Mash),
            vec![Parameter::Kmer(15), Parameter::Kmer(21)]
        );
        assert_eq!(table.parameters(Tool::Sourmash), vec![Parameter::Kmer(31)]);
    }

    #[test]
    fn aggregate_skips_malformed_and_unnamed_files() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = TaxonWorkspace::new(dir.path(), "G");
        std::fs::create_dir(&workspace.path).unwrap();
        std::fs::write(workspace.path.join("mash_G_k21.tab"), "A.fasta\tB.fasta\t0.03\t0.01\t500\n").unwrap();
        std::fs::write(workspace.path.join("mash_G_k15.tab"), "A.fasta\tC.fasta\t0.04\n").unwrap();
        std::fs::write(workspace.path.join("mash_G.tab"), "B.fasta\tC.fasta\t0.05\t0.01\t480\n").unwrap();

        let table = FamilyTable::aggregate(
            Metric::Mash,
            &workspace,
            &ToolRegistry::default(),
            &KmerSet::any(),
            None,
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].genome_a, "A");
        assert_eq!(table.records[0].genome_b, "B");
        assert_eq!(table.records[0].parameter, Parameter::Kmer(21));
        assert_eq!(table.parameters(Tool::Mash), vec![Parameter::Kmer(21)]);
    }

    #[test]
    fn aggregate_keeps_first_duplicate() {
        let test_cases = TestCases::new();
        let table = FamilyTable::aggregate(
            Metric::Mash,
            &test_cases.workspace(),
            &ToolRegistry::default(),
            &KmerSet::from_sizes(&[21]),
            None,
        );
        let subset = table.subset(Tool::Mash, Parameter::Kmer(21));
        assert_eq!(subset.len(), 3);
        assert_eq!(subset[0].genome_a, "MN000001");
        assert_eq!(subset[0].genome_b, "MN000002");
        assert_float_eq!(subset[0].value, 0.03, abs <= f64::EPSILON);
    }

    #[test]
    fn aggregate_keys_are_unique() {
        let test_cases = TestCases::new();
        let table = FamilyTable::aggregate(
            Metric::Ani,
            &test_cases.workspace(),
            &ToolRegistry::default(),
            &KmerSet::any(),
            None,
        );
        let keys = table.records.iter().map(|r| r.key()).collect::<HashSet<_>>();
        assert_eq!(keys.len(), table.len());
        // fastani 3 unique pairs at k16, skani 2 static pairs
        assert_eq!(table.len(), 5);
        assert_eq!(table.parameters(Tool::Skani), vec![Parameter::Static]);
    }

    #[test]
    fn aggregate_kmer_filter_keeps_static() {
        let test_cases = TestCases::new();
        let table = FamilyTable::aggregate(
            Metric::Ani,
            &test_cases.workspace(),
            &ToolRegistry::default(),
            &KmerSet::from_sizes(&[21]),
            None,
        );
        assert!(table.records.iter().all(|r| r.parameter == Parameter::Static));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn aggregate_taxonomy_excludes_unresolved() {
        let test_cases = TestCases::new();
        let reference = TaxonomyReference::from_accessions(["MN000001", "MN000002"]);
        let table = FamilyTable::aggregate(
            Metric::Aai,
            &test_cases.workspace(),
            &ToolRegistry::default(),
            &KmerSet::any(),
            Some(&reference),
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].genome_b, "MN000002");
    }

    #[test]
    fn aggregate_missing_outputs_empty() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = TaxonWorkspace::new(dir.path(), "Emptyvirus");
        let table = FamilyTable::aggregate(
            Metric::Viridic,
            &workspace,
            &ToolRegistry::default(),
            &KmerSet::any(),
            None,
        );
        assert!(table.is_empty());
    }

    #[test]
    fn rounded_values_ok() {
        let test_cases = TestCases::new();
        let table = FamilyTable::aggregate(
            Metric::Mash,
            &test_cases.workspace(),
            &ToolRegistry::default(),
            &KmerSet::from_sizes(&[21]),
            None,
        )
        .rounded();
        let subset = table.subset(Tool::Mash, Parameter::Kmer(21));
        assert_eq!(subset[1].value.to_string(), "0.123457");
    }

    #[test]
    fn write_and_reload_ok() {
        let test_cases = TestCases::new();
        let table = FamilyTable::aggregate(
            Metric::Ani,
            &test_cases.workspace(),
            &ToolRegistry::default(),
            &KmerSet::any(),
            None,
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ani_results_Testvirus.csv");
        table.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("GenomeA,GenomeB,ani_distance,kmer_ani,algorithm_ani\n"));
        assert!(content.contains("MN000001,MN000002,95.2,16,fastani\n"));
        assert!(content.contains(",static,skani\n"));

        let reloaded = FamilyTable::from_csv(Metric::Ani, &path).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn reload_header_mismatch_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mash_metrics_Testvirus.csv");
        std::fs::write(&path, "GenomeA,GenomeB,ani_distance,kmer_ani,algorithm_ani\n").unwrap();
        let error = FamilyTable::from_csv(Metric::Mash, &path).unwrap_err();
        assert!(matches!(error, MetricsError::FamilyHeaderMismatch { .. }));
    }
}
