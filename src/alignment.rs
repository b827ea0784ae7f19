use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MetricsError;
use crate::genome::normalize_genome_id;
use crate::parser::{parse_value, read_fixed_rows, HeaderPolicy};
use crate::record::{Parameter, Tool};
use crate::registry::{ToolEntry, ToolRegistry};
use crate::utils::{get_file_component, FileComponent};
use crate::workspace::{discover_taxa, TaxonWorkspace};

/// Identity and aligned fraction of one genome pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignmentFractionRecord {
    #[serde(rename = "GenomeA")]
    pub genome_a: String,
    #[serde(rename = "GenomeB")]
    pub genome_b: String,
    #[serde(rename = "ANI")]
    pub ani: f64,
    #[serde(rename = "AF")]
    pub af: f64,
    pub algorithm: Tool,
    pub kmer: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignmentFractionTable {
    pub records: Vec<AlignmentFractionRecord>,
}

impl AlignmentFractionTable {
    /// Collect skani and fastANI rows of a taxon workspace, skipping unreadable files
    pub fn from_workspace(workspace: &TaxonWorkspace, registry: &ToolRegistry) -> Self {
        let mut records = Vec::new();
        let readers: [(Tool, FractionReader); 2] = [(Tool::Skani, skani_fractions), (Tool::Fastani, fastani_fractions)];
        for (tool, reader) in readers {
            let Some(entry) = registry.entry(tool) else {
                continue;
            };
            let files = match entry.locate(workspace) {
                Ok(files) => files,
                Err(e) => {
                    log::warn!("Failed to list {tool} outputs for '{}': {e}", workspace.name);
                    continue;
                }
            };
            for file in files {
                match read_alignment_fractions(entry, &file, reader) {
                    Ok(rows) => records.extend(rows),
                    Err(e) => log::warn!("Skipping {tool} output {}: {e}", file.display()),
                }
            }
        }
        Self { records }
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn write_csv(&self, path: &Path) -> Result<(), MetricsError> {
        let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

type FractionReader = fn(&Path, Parameter) -> Result<Vec<AlignmentFractionRecord>, MetricsError>;

fn read_alignment_fractions(entry: &ToolEntry, path: &Path, reader: FractionReader) -> Result<Vec<AlignmentFractionRecord>, MetricsError> {
    let file_name = get_file_component(path, FileComponent::FileName)?;
    let parameter = entry.parameter.extract(&file_name)?;
    reader(path, parameter)
}

/// skani reports the aligned fraction of the query directly
fn skani_fractions(path: &Path, parameter: Parameter) -> Result<Vec<AlignmentFractionRecord>, MetricsError> {
    let mut records = Vec::new();
    for (line, row) in read_fixed_rows(path, b'\t', 7, HeaderPolicy::Detect)? {
        records.push(AlignmentFractionRecord {
            genome_a: normalize_genome_id(&row[0]),
            genome_b: normalize_genome_id(&row[1]),
            ani: parse_value(&row[2], line)?,
            af: parse_value(&row[4], line)?,
            algorithm: Tool::Skani,
            kmer: parameter.to_string(),
        });
    }
    Ok(records)
}

/// fastANI fraction of mapped fragments, in percent
fn fastani_fractions(path: &Path, parameter: Parameter) -> Result<Vec<AlignmentFractionRecord>, MetricsError> {
    let mut records = Vec::new();
    let mut dropped = 0;
    for (line, row) in read_fixed_rows(path, b'\t', 5, HeaderPolicy::None)? {
        let mapped = parse_value(&row[3], line)?;
        let total = parse_value(&row[4], line)?;
        if total == 0.0 {
            dropped += 1;
            continue;
        }
        records.push(AlignmentFractionRecord {
            genome_a: normalize_genome_id(&row[0]),
            genome_b: normalize_genome_id(&row[1]),
            ani: parse_value(&row[2], line)?,
            af: mapped / total * 100.0,
            algorithm: Tool::Fastani,
            kmer: parameter.to_string(),
        });
    }
    if dropped > 0 {
        log::warn!("Dropped {dropped} rows without fragments in {}", path.display());
    }
    Ok(records)
}

/// Write an alignment fraction table for every taxon with skani or fastANI output
pub fn alignment_fractions(workdir: &Path, source: Option<&Path>) -> Result<usize, MetricsError> {
    let registry = ToolRegistry::default();
    let mut written = 0;
    for taxon in discover_taxa(workdir, source)? {
        let workspace = TaxonWorkspace::new(workdir, &taxon);
        if !workspace.path.is_dir() {
            log::warn!("No workspace for taxon '{taxon}', skipping");
            continue;
        }
        let table = AlignmentFractionTable::from_workspace(&workspace, &registry);
        if table.is_empty() {
            log::warn!("No alignment fractions for taxon '{taxon}'");
            continue;
        }
        table.write_csv(&workspace.alignment_fraction_path())?;
        log::info!(
            "Wrote {} alignment fractions for '{taxon}': {}",
            table.records.len(),
            workspace.alignment_fraction_path().display()
        );
        written += 1;
    }
    Ok(written)
}
