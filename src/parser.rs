use std::fmt::Debug;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::genome::normalize_genome_id;
use crate::record::Parameter;

/*
========================
Custom error definitions
========================
*/

#[derive(Error, Debug)]
pub enum ParseError {
    /// Indicates failure to read file
    #[error("failed to read file: {0}")]
    FileIO(#[from] std::io::Error),
    /// Indicates failure to open a (possibly compressed) file
    #[error("failed to open file: {0}")]
    Niffler(#[from] niffler::Error),
    /// Indicates failure to read a delimited record
    #[error("failed to read a delimited record: {0}")]
    Csv(#[from] csv::Error),
    /// Indicates a file too short to contain any record
    #[error("file is empty: {}", .0.display())]
    EmptyFile(PathBuf),
    /// Indicates a record that does not match the column contract of the layout
    #[error("record on line {line} has {found} fields, expected {expected}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },
    /// Indicates that a named column is missing from the header
    #[error("column '{0}' not found in header")]
    MissingColumn(String),
    /// Indicates failure to parse a score from a record
    #[error("failed to parse a valid score '{value}' on line {line}")]
    Value { line: u64, value: String },
    /// Indicates a similarity matrix that is not square
    #[error("matrix is not square: {rows} rows for {columns} columns")]
    NotSquare { rows: usize, columns: usize },
    /// Indicates a matrix index label that does not match the header at the same position
    #[error("matrix row label '{row}' does not match column label '{column}'")]
    MatrixLabel { row: String, column: String },
    /// Indicates a file name that does not carry the expected parameter pattern
    #[error("no k-mer size found in file name: {0}")]
    NoParameter(String),
    /// Indicates an invalid file name pattern
    #[error("invalid file name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Genome pair and score as reported by a tool, identifiers not yet normalized
#[derive(Debug, Clone, PartialEq)]
pub struct RawPair {
    pub genome_a: String,
    pub genome_b: String,
    pub value: f64,
}

/// Capability shared by all tool output parsers
pub trait ToolParser: Debug {
    fn parse(&self, path: &Path) -> Result<Vec<RawPair>, ParseError>;
}

/*
=============================
File name encoded parameters
=============================
*/

/// How a tool encodes its k-mer size in the output file name
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum ParameterPattern {
    /// First `k<digits>` tag, e.g. `mash_Genus_k21.tab`
    KmerTag,
    /// Digits after the last underscore, e.g. `fastani_Genus_frag_500_16.txt`
    TrailingDigits,
    /// Parameter-free tool
    Static,
}

static KMER_TAG: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static KMER_LOOSE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static TRAILING_DIGITS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Compile a file name pattern once per process
fn cached_regex(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex, ParseError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| ParseError::Pattern(e.clone()))
}

impl ParameterPattern {
    pub fn extract(&self, file_name: &str) -> Result<Parameter, ParseError> {
        let captured = match self {
            ParameterPattern::Static => return Ok(Parameter::Static),
            ParameterPattern::KmerTag => {
                // Prefer a separator-delimited tag over a 'k' inside a taxon name
                let tagged = cached_regex(&KMER_TAG, r"(?:^|[_.\-])k(\d+)(?:[_.\-]|$)")?;
                let loose = cached_regex(&KMER_LOOSE, r"k(\d+)")?;
                tagged
                    .captures(file_name)
                    .or_else(|| loose.captures(file_name))
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            }
            ParameterPattern::TrailingDigits => cached_regex(&TRAILING_DIGITS, r"_(\d+)(?:\.[^_]*)?$")?
                .captures(file_name)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        };

        captured
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(Parameter::Kmer)
            .ok_or_else(|| ParseError::NoParameter(file_name.to_string()))
    }
}

/*
==================
Delimited readers
==================
*/

/// Whether a table starts with a descriptive header row
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeaderPolicy {
    None,
    /// Skip the first row if its score column is not numeric
    Detect,
}

/// Open a plain or compressed delimited file
pub fn open_table(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<Box<dyn Read>>, ParseError> {
    let (reader, _format) = match niffler::from_path(path) {
        Ok(reader_format) => reader_format,
        Err(niffler::Error::FileTooShort) => return Err(ParseError::EmptyFile(path.to_path_buf())),
        Err(e) => return Err(ParseError::Niffler(e)),
    };
    let reader: Box<dyn Read> = reader;

    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader))
}

/// Read all rows of a headerless table with a fixed column count
///
/// Returns the rows with their line numbers.
pub fn read_fixed_rows(
    path: &Path,
    delimiter: u8,
    columns: usize,
    header: HeaderPolicy,
) -> Result<Vec<(u64, csv::StringRecord)>, ParseError> {
    let mut reader = open_table(path, delimiter, false)?;
    let mut rows = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let line = record.position().map_or(index as u64 + 1, |pos| pos.line());

        if index == 0 && header == HeaderPolicy::Detect && is_header_row(&record) {
            log::debug!("Skipping header row in {}", path.display());
            continue;
        }
        if record.len() != columns {
            return Err(ParseError::ColumnCount {
                line,
                expected: columns,
                found: record.len(),
            });
        }
        rows.push((line, record));
    }
    Ok(rows)
}

fn is_header_row(record: &csv::StringRecord) -> bool {
    record
        .get(2)
        .map_or(true, |value| value.parse::<f64>().is_err())
}

pub fn parse_value(value: &str, line: u64) -> Result<f64, ParseError> {
    value.parse::<f64>().map_err(|_| ParseError::Value {
        line,
        value: value.to_string(),
    })
}

fn pairs_from_rows(rows: Vec<(u64, csv::StringRecord)>) -> Result<Vec<RawPair>, ParseError> {
    rows.into_iter()
        .map(|(line, record)| {
            Ok(RawPair {
                genome_a: record[0].to_string(),
                genome_b: record[1].to_string(),
                value: parse_value(&record[2], line)?,
            })
        })
        .collect()
}

/*
=====================
Identity pair tables
=====================
*/

/// Column layouts of identity-style tools
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum IdentityLayout {
    /// fastANI: query, reference, ANI, mapped fragments, total fragments
    FragmentMapping,
    /// skani: Ref_file, Query_file, ANI, Align_fraction_ref, Align_fraction_query, Ref_name, Query_name
    AlignFraction,
    /// CompareM AAI summary with named columns
    OrthologSummary,
    /// vConTACT2 network: genome, genome, weight
    SimilarityNetwork,
}

pub const ORTHOLOG_GENOME_A: &str = "#Genome A";
pub const ORTHOLOG_GENOME_B: &str = "Genome B";
pub const ORTHOLOG_MEAN_AAI: &str = "Mean AAI";

#[derive(Debug, Clone)]
pub struct IdentityPairParser {
    pub layout: IdentityLayout,
}

impl IdentityPairParser {
    pub fn new(layout: IdentityLayout) -> Self {
        Self { layout }
    }
    fn parse_named(&self, path: &Path) -> Result<Vec<RawPair>, ParseError> {
        let mut reader = open_table(path, b'\t', true)?;
        let headers = reader.headers()?.clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ParseError::MissingColumn(name.to_string()))
        };
        let (a, b, v) = (
            column(ORTHOLOG_GENOME_A)?,
            column(ORTHOLOG_GENOME_B)?,
            column(ORTHOLOG_MEAN_AAI)?,
        );

        let mut pairs = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result?;
            let line = record.position().map_or(index as u64 + 2, |pos| pos.line());
            if record.len() != headers.len() {
                return Err(ParseError::ColumnCount {
                    line,
                    expected: headers.len(),
                    found: record.len(),
                });
            }
            pairs.push(RawPair {
                genome_a: record[a].to_string(),
                genome_b: record[b].to_string(),
                value: parse_value(&record[v], line)?,
            });
        }
        Ok(pairs)
    }
}

impl ToolParser for IdentityPairParser {
    fn parse(&self, path: &Path) -> Result<Vec<RawPair>, ParseError> {
        match self.layout {
            IdentityLayout::FragmentMapping => {
                pairs_from_rows(read_fixed_rows(path, b'\t', 5, HeaderPolicy::None)?)
            }
            IdentityLayout::AlignFraction => {
                pairs_from_rows(read_fixed_rows(path, b'\t', 7, HeaderPolicy::Detect)?)
            }
            IdentityLayout::SimilarityNetwork => {
                pairs_from_rows(read_fixed_rows(path, b' ', 3, HeaderPolicy::None)?)
            }
            IdentityLayout::OrthologSummary => self.parse_named(path),
        }
    }
}

/*
=====================
Distance pair tables
=====================
*/

/// Mash `dist` output: reference, query, distance, p-value, shared hashes
#[derive(Debug, Clone, Default)]
pub struct DistancePairParser;

impl ToolParser for DistancePairParser {
    fn parse(&self, path: &Path) -> Result<Vec<RawPair>, ParseError> {
        pairs_from_rows(read_fixed_rows(path, b'\t', 5, HeaderPolicy::None)?)
    }
}

/*
=========================
Distance matrix parsing
=========================
*/

/// Conversion of matrix cells into pairwise values
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, clap::ValueEnum)]
pub enum MatrixConversion {
    /// Similarity `s` becomes distance `1 - s`
    Complement,
    /// Cell values are used unchanged
    AsIs,
    /// Euclidean distance between matrix rows
    Euclidean,
}

impl std::fmt::Display for MatrixConversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixConversion::Complement => write!(f, "complement"),
            MatrixConversion::AsIs => write!(f, "as-is"),
            MatrixConversion::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Square all-pairs matrix keyed by genome identifiers on both axes
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl SquareMatrix {
    /// Read a comma-separated matrix with an optional index column
    pub fn from_csv(path: &Path) -> Result<Self, ParseError> {
        let mut reader = open_table(path, b',', true)?;
        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<Result<Vec<_>, csv::Error>>()?;

        let mut labels: Vec<String> = headers.iter().map(String::from).collect();
        // Empty corner cell, or a labelled corner above non-numeric row labels
        let labelled_index = records.first().map_or(false, |first| {
            first.len() == labels.len()
                && first.get(0).map_or(false, |value| value.parse::<f64>().is_err())
        });
        let corner = labels.first().map_or(false, |first| first.is_empty()) || labelled_index;
        if corner {
            labels.remove(0);
        }

        let mut values = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let line = record.position().map_or(index as u64 + 2, |pos| pos.line());

            let indexed = corner || record.len() == labels.len() + 1;
            let fields = match indexed {
                true => {
                    let row_label = record.get(0).unwrap_or_default();
                    if let Some(column_label) = labels.get(index) {
                        if normalize_genome_id(row_label) != normalize_genome_id(column_label) {
                            return Err(ParseError::MatrixLabel {
                                row: row_label.to_string(),
                                column: column_label.to_string(),
                            });
                        }
                    }
                    record.iter().skip(1).collect::<Vec<_>>()
                }
                false => record.iter().collect::<Vec<_>>(),
            };

            if fields.len() != labels.len() {
                return Err(ParseError::ColumnCount {
                    line,
                    expected: labels.len(),
                    found: fields.len(),
                });
            }
            let row = fields
                .into_iter()
                .map(|value| parse_value(value, line))
                .collect::<Result<Vec<f64>, ParseError>>()?;
            values.push(row);
        }

        if values.len() != labels.len() {
            return Err(ParseError::NotSquare {
                rows: values.len(),
                columns: labels.len(),
            });
        }

        Ok(Self { labels, values })
    }
    /// Upper triangle without the diagonal: every unordered pair exactly once
    pub fn condensed(&self, conversion: MatrixConversion) -> Vec<RawPair> {
        let n = self.labels.len();
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let value = match conversion {
                    MatrixConversion::AsIs => self.values[i][j],
                    MatrixConversion::Complement => 1.0 - self.values[i][j],
                    MatrixConversion::Euclidean => euclidean(&self.values[i], &self.values[j]),
                };
                pairs.push(RawPair {
                    genome_a: self.labels[i].clone(),
                    genome_b: self.labels[j].clone(),
                    value,
                });
            }
        }
        pairs
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[derive(Debug, Clone)]
pub struct DistanceMatrixParser {
    pub conversion: MatrixConversion,
}

impl DistanceMatrixParser {
    pub fn new(conversion: MatrixConversion) -> Self {
        Self { conversion }
    }
}

impl ToolParser for DistanceMatrixParser {
    fn parse(&self, path: &Path) -> Result<Vec<RawPair>, ParseError> {
        Ok(SquareMatrix::from_csv(path)?.condensed(self.conversion))
    }
}
