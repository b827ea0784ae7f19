use std::fmt;
use std::fs::{create_dir_all, read_dir, rename};
use std::path::{Path, PathBuf};

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::{MetricSelection, PipelineConfig};
use crate::error::MetricsError;
use crate::family::FamilyTable;
use crate::fusion::{fuse, FusionSide, Summary};
use crate::record::{KmerSet, Metric};
use crate::registry::ToolRegistry;
use crate::taxonomy::TaxonomyReference;
use crate::utils::list_subdirectories;

/// Directory name fragment of sketch signature stores, never a taxon
pub const SIGNATURES_TAG: &str = "signatures";

const METRIC_KEYS: [&str; 5] = ["mash", "ani", "aai", "viridic", "vcontact2"];

/// Whether a file name is an artifact written by this crate rather than raw tool output
pub fn is_derived_artifact(file_name: &str) -> bool {
    if file_name.starts_with("summary_") || file_name.starts_with("alignment_fraction_") {
        return true;
    }
    METRIC_KEYS.iter().any(|key| {
        file_name.starts_with(&format!("{key}_results_")) || file_name.starts_with(&format!("{key}_metrics_"))
    })
}

/*
=================
Taxon workspaces
=================
*/

/// Directory of one taxonomic group holding raw tool outputs and derived tables
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonWorkspace {
    pub name: String,
    pub path: PathBuf,
}

impl TaxonWorkspace {
    pub fn new(workdir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: workdir.join(name),
        }
    }
    /// Create the workspace directory if missing
    pub fn ensure(&self) -> Result<(), MetricsError> {
        if !self.path.is_dir() {
            create_dir_all(&self.path)?;
            log::info!("Created workspace for taxon '{}': {}", self.name, self.path.display());
        }
        Ok(())
    }
    pub fn results_path(&self, metric: Metric) -> PathBuf {
        self.path.join(format!("{}_results_{}.csv", metric.key(), self.name))
    }
    pub fn metrics_path(&self, metric: Metric) -> PathBuf {
        self.path.join(format!("{}_metrics_{}.csv", metric.key(), self.name))
    }
    pub fn summary_path(&self) -> PathBuf {
        self.path.join(format!("summary_{}.csv", self.name))
    }
    pub fn alignment_fraction_path(&self) -> PathBuf {
        self.path.join(format!("alignment_fraction_{}.csv", self.name))
    }
    /// Move stray files and signature directories of this taxon from the working root.
    ///
    /// A file belongs to the longest taxon name it contains. Signature
    /// directories are left in place when the destination already exists.
    pub fn relocate_stray(&self, workdir: &Path, taxa: &[String]) -> Result<usize, MetricsError> {
        let mut moved = 0;
        for entry in read_dir(workdir)? {
            let path = entry?.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if best_taxon_match(&name, taxa) != Some(self.name.as_str()) {
                continue;
            }

            let destination = self.path.join(&name);
            if path.is_file() {
                rename(&path, &destination)?;
                log::debug!("Moved {} to {}", path.display(), destination.display());
                moved += 1;
            } else if path.is_dir() && name.starts_with(&format!("{SIGNATURES_TAG}_")) {
                if destination.exists() {
                    log::warn!("Signature directory already exists: {}", destination.display());
                    continue;
                }
                rename(&path, &destination)?;
                moved += 1;
            }
        }
        if moved > 0 {
            log::info!("Moved {moved} stray outputs into workspace '{}'", self.name);
        }
        Ok(moved)
    }
}

fn best_taxon_match<'a>(name: &str, taxa: &'a [String]) -> Option<&'a str> {
    taxa.iter()
        .filter(|taxon| !taxon.is_empty() && name.contains(taxon.as_str()))
        .max_by_key(|taxon| taxon.len())
        .map(String::as_str)
}

/// Sorted taxon names from the genome source root, or the working root without one
pub fn discover_taxa(workdir: &Path, source: Option<&Path>) -> Result<Vec<String>, MetricsError> {
    let root = source.unwrap_or(workdir);
    Ok(list_subdirectories(root)?
        .into_iter()
        .filter(|name| !name.contains(SIGNATURES_TAG))
        .collect())
}

/// Create every taxon workspace and move stray outputs into it
pub fn organize(workdir: &Path, source: Option<&Path>) -> Result<Vec<TaxonWorkspace>, MetricsError> {
    let taxa = discover_taxa(workdir, source)?;
    let mut workspaces = Vec::with_capacity(taxa.len());
    for taxon in &taxa {
        let workspace = TaxonWorkspace::new(workdir, taxon);
        workspace.ensure()?;
        workspace.relocate_stray(workdir, &taxa)?;
        workspaces.push(workspace);
    }
    Ok(workspaces)
}

/*
===========
Run report
===========
*/

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaxonStatus {
    Completed,
    /// Summary written without any fused rows
    Empty,
    Skipped,
    Failed,
}

impl fmt::Display for TaxonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonStatus::Completed => write!(f, "completed"),
            TaxonStatus::Empty => write!(f, "empty"),
            TaxonStatus::Skipped => write!(f, "skipped"),
            TaxonStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct TaxonReport {
    #[tabled(rename = "Taxon")]
    pub taxon: String,
    #[tabled(rename = "Records X")]
    pub records_x: usize,
    #[tabled(rename = "Records Y")]
    pub records_y: usize,
    #[tabled(rename = "Fused")]
    pub fused: usize,
    #[tabled(rename = "Status")]
    pub status: TaxonStatus,
}

impl TaxonReport {
    fn without_records(taxon: &str, status: TaxonStatus) -> Self {
        Self {
            taxon: taxon.to_string(),
            records_x: 0,
            records_y: 0,
            fused: 0,
            status,
        }
    }
}

pub fn print_reports(reports: &[TaxonReport]) {
    let mut table = Table::new(reports);
    table.with(Style::modern());
    eprintln!("{}", table);
}

fn log_reports(reports: &[TaxonReport]) {
    let count = |status: TaxonStatus| reports.iter().filter(|r| r.status == status).count();
    log::info!(
        "Processed {} taxa: {} completed, {} empty, {} skipped, {} failed",
        reports.len(),
        count(TaxonStatus::Completed),
        count(TaxonStatus::Empty),
        count(TaxonStatus::Skipped),
        count(TaxonStatus::Failed)
    );
}

/*
=========
Pipeline
=========
*/

/// Per-taxon parse, aggregate and fuse driver
#[derive(Debug)]
pub struct Pipeline {
    pub config: PipelineConfig,
    registry: ToolRegistry,
    taxonomy: Option<TaxonomyReference>,
}

impl Pipeline {
    pub fn from_config(config: PipelineConfig) -> Result<Self, MetricsError> {
        if !config.workdir.is_dir() {
            return Err(MetricsError::WorkdirMissing(config.workdir.clone()));
        }
        if let Some(source) = &config.source {
            if !source.is_dir() {
                return Err(MetricsError::SourceMissing(source.clone()));
            }
        }

        let taxonomy = match &config.taxonomy {
            Some(taxonomy) => Some(TaxonomyReference::from_csv(&taxonomy.path, &taxonomy.column)?),
            None => {
                log::info!("No taxonomy reference provided, genome identifiers are not filtered");
                None
            }
        };

        Ok(Self {
            registry: ToolRegistry::new(config.sketch_matrix),
            config,
            taxonomy,
        })
    }
    /// Process every discovered taxon; per-taxon failures are logged and reported
    pub fn run(&self) -> Result<Vec<TaxonReport>, MetricsError> {
        let taxa = discover_taxa(&self.config.workdir, self.config.source.as_deref())?;
        if taxa.is_empty() {
            log::warn!("No taxon directories found");
        }

        log::info!(
            "Fusing '{}' (k = {}) with '{}' (k = {}) for {} taxa",
            self.config.x.metric,
            self.config.x.kmers,
            self.config.y.metric,
            self.config.y.kmers,
            taxa.len()
        );

        let mut reports = Vec::with_capacity(taxa.len());
        for taxon in &taxa {
            let workspace = TaxonWorkspace::new(&self.config.workdir, taxon);
            match self.process_taxon(&workspace, &taxa) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    log::error!("Failed to process taxon '{taxon}': {e}");
                    reports.push(TaxonReport::without_records(taxon, TaxonStatus::Failed));
                }
            }
        }
        log_reports(&reports);
        Ok(reports)
    }
    pub fn process_taxon(&self, workspace: &TaxonWorkspace, taxa: &[String]) -> Result<TaxonReport, MetricsError> {
        workspace.ensure()?;
        workspace.relocate_stray(&self.config.workdir, taxa)?;

        let metrics = [self.config.x.metric, self.config.y.metric];
        if !self.registry.has_raw_inputs(workspace, &metrics) {
            log::warn!("No tool outputs for the selected metrics in '{}', skipping", workspace.name);
            return Ok(TaxonReport::without_records(&workspace.name, TaxonStatus::Skipped));
        }

        log::info!("Processing taxon '{}'", workspace.name);

        let (x_table, y_table) = if self.config.same_metric() {
            let kmers = self.config.x.kmers.union(&self.config.y.kmers);
            let table = self.aggregate_and_persist(workspace, self.config.x.metric, &kmers)?;
            (table.clone(), table)
        } else {
            (
                self.aggregate_and_persist(workspace, self.config.x.metric, &self.config.x.kmers)?,
                self.aggregate_and_persist(workspace, self.config.y.metric, &self.config.y.kmers)?,
            )
        };

        let summary = self.fuse_and_persist(workspace, &x_table, &y_table)?;
        Ok(self.report(workspace, &x_table, &y_table, &summary))
    }
    /// Rebuild summaries from persisted metric tables without reading raw outputs
    pub fn fuse_persisted(&self) -> Result<Vec<TaxonReport>, MetricsError> {
        let taxa = discover_taxa(&self.config.workdir, None)?;

        let mut reports = Vec::with_capacity(taxa.len());
        for taxon in &taxa {
            let workspace = TaxonWorkspace::new(&self.config.workdir, taxon);
            let report = self.load_tables(&workspace).and_then(|tables| match tables {
                Some((x_table, y_table)) => {
                    let summary = self.fuse_and_persist(&workspace, &x_table, &y_table)?;
                    Ok(self.report(&workspace, &x_table, &y_table, &summary))
                }
                None => Ok(TaxonReport::without_records(taxon, TaxonStatus::Skipped)),
            });
            match report {
                Ok(report) => reports.push(report),
                Err(e) => {
                    log::error!("Failed to fuse taxon '{taxon}': {e}");
                    reports.push(TaxonReport::without_records(taxon, TaxonStatus::Failed));
                }
            }
        }
        log_reports(&reports);
        Ok(reports)
    }
    fn load_tables(&self, workspace: &TaxonWorkspace) -> Result<Option<(FamilyTable, FamilyTable)>, MetricsError> {
        let mut tables = Vec::with_capacity(2);
        for metric in [self.config.x.metric, self.config.y.metric] {
            let path = workspace.metrics_path(metric);
            if !path.is_file() {
                log::warn!("No {metric} metrics table in '{}', skipping", workspace.name);
                return Ok(None);
            }
            tables.push(FamilyTable::from_csv(metric, &path)?);
        }
        let y_table = tables.pop();
        let x_table = tables.pop();
        Ok(x_table.zip(y_table))
    }
    fn aggregate_and_persist(
        &self,
        workspace: &TaxonWorkspace,
        metric: Metric,
        kmers: &KmerSet,
    ) -> Result<FamilyTable, MetricsError> {
        let table = FamilyTable::aggregate(metric, workspace, &self.registry, kmers, self.taxonomy.as_ref());
        table.write_csv(&workspace.results_path(metric))?;

        let rounded = table.rounded();
        rounded.write_csv(&workspace.metrics_path(metric))?;

        log::info!("Collected {} {} records for '{}'", table.len(), metric, workspace.name);
        Ok(rounded)
    }
    fn fuse_and_persist(
        &self,
        workspace: &TaxonWorkspace,
        x_table: &FamilyTable,
        y_table: &FamilyTable,
    ) -> Result<Summary, MetricsError> {
        let summary = fuse(
            &fusion_side(&self.config.x, x_table),
            &fusion_side(&self.config.y, y_table),
        );
        if summary.is_empty() {
            log::warn!(
                "No genome pairs shared between '{}' and '{}' for '{}'",
                self.config.x.metric,
                self.config.y.metric,
                workspace.name
            );
        }
        summary.write_csv(&workspace.summary_path())?;
        Ok(summary)
    }
    fn report(&self, workspace: &TaxonWorkspace, x_table: &FamilyTable, y_table: &FamilyTable, summary: &Summary) -> TaxonReport {
        TaxonReport {
            taxon: workspace.name.clone(),
            records_x: x_table.len(),
            records_y: y_table.len(),
            fused: summary.len(),
            status: if summary.is_empty() {
                TaxonStatus::Empty
            } else {
                TaxonStatus::Completed
            },
        }
    }
}

fn fusion_side<'a>(selection: &'a MetricSelection, table: &'a FamilyTable) -> FusionSide<'a> {
    FusionSide {
        metric: selection.metric,
        kmers: &selection.kmers,
        table,
    }
}

#[cfg(test)]
#[cfg(not(tarpaulin_include))]
mod tests {

    use std::fs::{copy, create_dir, read_to_string, write};

    use super::*;
    use crate::config::TaxonomyConfig;

    /*
    ===============
      Test cases
    ===============
    */

    struct TestCases {
        testvirus: PathBuf,
    }

    impl TestCases {
        fn new() -> Self {
            Self {
                testvirus: PathBuf::from("tests/cases/Testvirus"),
            }
        }
        /// Working root with a scratch copy of the Testvirus outputs
        fn workdir(&self) -> tempfile::TempDir {
            let dir = tempfile::tempdir().unwrap();
            copy_dir(&self.testvirus, &dir.path().join("Testvirus"));
            dir
        }
    }

    fn copy_dir(from: &Path, to: &Path) {
        create_dir(to).unwrap();
        for entry in read_dir(from).unwrap() {
            let path = entry.unwrap().path();
            let target = to.join(path.file_name().unwrap());
            if path.is_dir() {
                copy_dir(&path, &target);
            } else {
                copy(&path, &target).unwrap();
            }
        }
    }

    #[test]
    fn derived_artifacts_ok() {
        assert!(is_derived_artifact("summary_Testvirus.csv"));
        assert!(is_derived_artifact("mash_metrics_Testvirus.csv"));
        assert!(is_derived_artifact("vcontact2_results_Testvirus.csv"));
        assert!(is_derived_artifact("alignment_fraction_Testvirus.csv"));
        assert!(!is_derived_artifact("mash_Testvirus_k21.tab"));
        assert!(!is_derived_artifact("sourmash_Testvirus_k31.csv"));
    }

    #[test]
    fn workspace_paths_ok() {
        let workspace = TaxonWorkspace::new(Path::new("work"), "Testvirus");
        assert_eq!(workspace.metrics_path(Metric::Mash), PathBuf::from("work/Testvirus/mash_metrics_Testvirus.csv"));
        assert_eq!(workspace.results_path(Metric::Ani), PathBuf::from("work/Testvirus/ani_results_Testvirus.csv"));
        assert_eq!(workspace.summary_path(), PathBuf::from("work/Testvirus/summary_Testvirus.csv"));
    }

    #[test]
    fn discover_taxa_ignores_signatures() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Betavirus", "Alphavirus", "signatures", "signatures_Alphavirus"] {
            create_dir(dir.path().join(name)).unwrap();
        }
        assert_eq!(
            discover_taxa(dir.path(), None).unwrap(),
            vec!["Alphavirus".to_string(), "Betavirus".to_string()]
        );
    }

    #[test]
    fn relocate_stray_longest_match() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path().join("mash_Abc_k21.tab"), "").unwrap();
        write(dir.path().join("mash_Abcd_k21.tab"), "").unwrap();
        create_dir(dir.path().join("signatures_Abc")).unwrap();

        let taxa = vec!["Abc".to_string(), "Abcd".to_string()];
        let workspaces = taxa
            .iter()
            .map(|taxon| TaxonWorkspace::new(dir.path(), taxon))
            .collect::<Vec<_>>();
        for workspace in &workspaces {
            workspace.ensure().unwrap();
        }

        assert_eq!(workspaces[0].relocate_stray(dir.path(), &taxa).unwrap(), 2);
        assert_eq!(workspaces[1].relocate_stray(dir.path(), &taxa).unwrap(), 1);
        assert!(dir.path().join("Abc/mash_Abc_k21.tab").is_file());
        assert!(dir.path().join("Abc/signatures_Abc").is_dir());
        assert!(dir.path().join("Abcd/mash_Abcd_k21.tab").is_file());
    }

    #[test]
    fn relocate_keeps_existing_signatures() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = TaxonWorkspace::new(dir.path(), "Abc");
        workspace.ensure().unwrap();
        create_dir(dir.path().join("Abc/signatures_Abc")).unwrap();
        create_dir(dir.path().join("signatures_Abc")).unwrap();

        let moved = workspace.relocate_stray(dir.path(), &["Abc".to_string()]).unwrap();
        assert_eq!(moved, 0);
        assert!(dir.path().join("signatures_Abc").is_dir());
    }

    #[test]
    fn pipeline_missing_workdir_fail() {
        let config = PipelineConfig::with_default(PathBuf::from("tests/cases/does_not_exist"), Metric::Ani, Metric::Mash);
        let error = Pipeline::from_config(config).unwrap_err();
        assert!(matches!(error, MetricsError::WorkdirMissing(_)));
    }

    #[test]
    fn pipeline_run_writes_artifacts() {
        let test_cases = TestCases::new();
        let dir = test_cases.workdir();

        let mut config = PipelineConfig::with_default(dir.path().to_path_buf(), Metric::Ani, Metric::Mash);
        config.x.kmers = KmerSet::from_sizes(&[16]);
        config.y.kmers = KmerSet::from_sizes(&[21]);

        let reports = Pipeline::from_config(config).unwrap().run().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, TaxonStatus::Completed);
        // fastani16 x mash21: 3 pairs, skani x mash21: 2 pairs
        assert_eq!(reports[0].fused, 5);

        let workspace = TaxonWorkspace::new(dir.path(), "Testvirus");
        for path in [
            workspace.results_path(Metric::Ani),
            workspace.metrics_path(Metric::Ani),
            workspace.results_path(Metric::Mash),
            workspace.metrics_path(Metric::Mash),
            workspace.summary_path(),
        ] {
            assert!(path.is_file(), "missing {}", path.display());
        }

        let summary = read_to_string(workspace.summary_path()).unwrap();
        let lines = summary.lines().collect::<Vec<_>>();
        assert_eq!(
            lines[0],
            "GenomeA,GenomeB,ani_distance,kmer_ani,algorithm_ani,mash_distance,kmer_mash,algorithm_mash"
        );
        assert_eq!(lines[1], "MN000001,MN000002,95.2,16,fastani,0.03,21,mash");
        assert_eq!(lines[2], "MN000001,MN000003,82.123457,16,fastani,0.123457,21,mash");

        let raw = read_to_string(workspace.results_path(Metric::Ani)).unwrap();
        assert!(raw.contains("82.123456789"));
    }

    #[test]
    fn pipeline_rerun_is_idempotent() {
        let test_cases = TestCases::new();
        let dir = test_cases.workdir();
        let config = PipelineConfig::with_default(dir.path().to_path_buf(), Metric::Aai, Metric::Mash);
        let pipeline = Pipeline::from_config(config).unwrap();
        let workspace = TaxonWorkspace::new(dir.path(), "Testvirus");

        pipeline.run().unwrap();
        let first = read_to_string(workspace.summary_path()).unwrap();
        pipeline.run().unwrap();
        let second = read_to_string(workspace.summary_path()).unwrap();

        assert_eq!(first, second);
        assert!(first.lines().count() > 1);
    }

    #[test]
    fn pipeline_skips_taxon_without_outputs() {
        let test_cases = TestCases::new();
        let dir = test_cases.workdir();
        create_dir(dir.path().join("Emptyvirus")).unwrap();

        let config = PipelineConfig::with_default(dir.path().to_path_buf(), Metric::Ani, Metric::Mash);
        let reports = Pipeline::from_config(config).unwrap().run().unwrap();

        assert_eq!(reports[0].taxon, "Emptyvirus");
        assert_eq!(reports[0].status, TaxonStatus::Skipped);
        assert!(!dir.path().join("Emptyvirus/summary_Emptyvirus.csv").exists());
        assert_eq!(reports[1].status, TaxonStatus::Completed);
    }

    #[test]
    fn pipeline_taxonomy_filters_genomes() {
        let test_cases = TestCases::new();
        let dir = test_cases.workdir();
        let reference = dir.path().join("vmr.csv");
        write(&reference, "Genus,Virus GENBANK accession\nTestvirus,MN000001.1; MN000002.1\n").unwrap();

        let mut config = PipelineConfig::with_default(dir.path().to_path_buf(), Metric::Ani, Metric::Aai);
        config.taxonomy = Some(TaxonomyConfig::with_default(reference));

        let reports = Pipeline::from_config(config).unwrap().run().unwrap();
        let report = reports.iter().find(|r| r.taxon == "Testvirus").unwrap();
        // fastani and skani MN000001-MN000002 joined with the single resolved AAI pair
        assert_eq!(report.fused, 2);
    }

    #[test]
    fn fuse_persisted_rebuilds_summary() {
        let test_cases = TestCases::new();
        let dir = test_cases.workdir();
        let config = PipelineConfig::with_default(dir.path().to_path_buf(), Metric::Ani, Metric::Mash);
        let pipeline = Pipeline::from_config(config).unwrap();
        pipeline.run().unwrap();

        let workspace = TaxonWorkspace::new(dir.path(), "Testvirus");
        let first = read_to_string(workspace.summary_path()).unwrap();
        std::fs::remove_file(workspace.summary_path()).unwrap();

        let reports = pipeline.fuse_persisted().unwrap();
        assert_eq!(reports[0].status, TaxonStatus::Completed);
        assert_eq!(read_to_string(workspace.summary_path()).unwrap(), first);
    }

    #[test]
    fn same_metric_run_suffixes_columns() {
        let test_cases = TestCases::new();
        let dir = test_cases.workdir();
        let config = PipelineConfig::with_default(dir.path().to_path_buf(), Metric::Ani, Metric::Ani);
        let reports = Pipeline::from_config(config).unwrap().run().unwrap();
        assert_eq!(reports[0].status, TaxonStatus::Completed);

        let summary = read_to_string(TaxonWorkspace::new(dir.path(), "Testvirus").summary_path()).unwrap();
        assert!(summary.starts_with("GenomeA,GenomeB,ani_distance_x,kmer_ani_x,algorithm_ani_x,ani_distance_y"));
    }
}
