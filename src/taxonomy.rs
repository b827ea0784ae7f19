use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::MetricsError;
use crate::genome::normalize_genome_id;

/// Accession column of the ICTV virus metadata resource
pub const DEFAULT_ACCESSION_COLUMN: &str = "Virus_GENBANK_accession";

/// Genome identifiers known to the taxonomy reference table
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyReference {
    pub source: PathBuf,
    accessions: HashSet<String>,
}

impl TaxonomyReference {
    /// Read the accession column of a comma-separated reference table.
    ///
    /// Cells may list several accessions separated by `;`, each optionally
    /// prefixed with a segment label (`L: MN000001.1`). Header names are
    /// compared with spaces and underscores treated alike.
    pub fn from_csv(path: &Path, column: &str) -> Result<Self, MetricsError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let wanted = header_key(column);
        let index = reader
            .headers()?
            .iter()
            .position(|h| header_key(h) == wanted)
            .ok_or_else(|| MetricsError::TaxonomyColumnMissing(column.to_string(), path.to_path_buf()))?;

        let mut accessions = HashSet::new();
        for result in reader.records() {
            let record = result?;
            if let Some(cell) = record.get(index) {
                accessions.extend(split_accessions(cell));
            }
        }

        log::info!(
            "Loaded {} genome accessions from taxonomy reference: {}",
            accessions.len(),
            path.display()
        );

        Ok(Self {
            source: path.to_path_buf(),
            accessions,
        })
    }
    pub fn from_accessions<I, S>(accessions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            source: PathBuf::new(),
            accessions: accessions
                .into_iter()
                .map(|a| normalize_genome_id(a.as_ref()))
                .collect(),
        }
    }
    /// Whether a normalized genome identifier has an entry in the reference
    pub fn resolves(&self, genome: &str) -> bool {
        self.accessions.contains(genome)
    }
    pub fn len(&self) -> usize {
        self.accessions.len()
    }
    pub fn is_empty(&self) -> bool {
        self.accessions.is_empty()
    }
}

fn header_key(header: &str) -> String {
    header.trim().replace(' ', "_").to_lowercase()
}

fn split_accessions(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(|part| part.rsplit(':').next().unwrap_or(part).trim())
        .filter(|part| !part.is_empty())
        .map(normalize_genome_id)
        .collect()
}
