use std::path::Path;

use serde::{Deserialize, Serialize};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::MetricsError;
use crate::utils::{list_files, list_subdirectories};
use crate::workspace::SIGNATURES_TAG;

/// File extension of genome sequences placed by the retrieval stage
pub const GENOME_EXTENSION: &str = "fasta";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Tabled)]
pub struct CensusRecord {
    #[serde(rename = "Taxon")]
    #[tabled(rename = "Taxon")]
    pub taxon: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

/// Genome counts per taxon directory of a source root
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeCensus {
    pub records: Vec<CensusRecord>,
}

impl GenomeCensus {
    pub fn from_source(source: &Path) -> Result<Self, MetricsError> {
        let mut records = Vec::new();
        for taxon in list_subdirectories(source)? {
            if taxon.contains(SIGNATURES_TAG) {
                continue;
            }
            let count = list_files(&source.join(&taxon))?
                .iter()
                .filter(|path| path.extension().map_or(false, |ext| ext == GENOME_EXTENSION))
                .count();
            records.push(CensusRecord { taxon, count });
        }
        Ok(Self { records })
    }
    /// Taxa with strictly more than `min_genomes` genomes
    pub fn filter_min(&self, min_genomes: usize) -> Self {
        let records = self
            .records
            .iter()
            .filter(|r| r.count > min_genomes)
            .cloned()
            .collect::<Vec<_>>();

        log::info!(
            "{} of {} taxa have more than {min_genomes} genomes",
            records.len(),
            self.records.len()
        );
        Self { records }
    }
    pub fn write_csv(&self, path: &Path) -> Result<(), MetricsError> {
        let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
    pub fn print_table(&self) {
        let mut table = Table::new(&self.records);
        table.with(Style::modern());
        eprintln!("{}", table);
    }
}

#[cfg(test)]
#[cfg(not(tarpaulin_include))]
mod tests {
    use super::*;
    use std::fs::{create_dir, write};

    fn source_with_counts(counts: &[(&str, usize)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (taxon, count) in counts {
            create_dir(dir.path().join(taxon)).unwrap();
            for i in 0..*count {
                write(dir.path().join(taxon).join(format!("MN{i:06}.fasta")), ">x\nACGT\n").unwrap();
            }
            write(dir.path().join(taxon).join("sizes.tsv"), "").unwrap();
        }
        dir
    }

    #[test]
    fn census_counts_fasta_only() {
        let census = GenomeCensus::from_source(Path::new("tests/cases")).unwrap();
        let testvirus = census.records.iter().find(|r| r.taxon == "Testvirus").unwrap();
        assert_eq!(testvirus.count, 3);
    }

    #[test]
    fn census_filter_strictly_greater() {
        let dir = source_with_counts(&[("Alphavirus", 10), ("Betavirus", 11), ("signatures_Betavirus", 12)]);
        let census = GenomeCensus::from_source(dir.path()).unwrap();
        assert_eq!(census.records.len(), 2);

        let kept = census.filter_min(10);
        assert_eq!(
            kept.records,
            vec![CensusRecord {
                taxon: "Betavirus".to_string(),
                count: 11
            }]
        );
    }

    #[test]
    fn census_write_csv_ok() {
        let dir = source_with_counts(&[("Alphavirus", 2)]);
        let census = GenomeCensus::from_source(dir.path()).unwrap();
        let output = dir.path().join("census.csv");
        census.write_csv(&output).unwrap();
        assert_eq!(std::fs::read_to_string(output).unwrap(), "Taxon,Count\nAlphavirus,2\n");
    }
}
