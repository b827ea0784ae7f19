use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    /// Represents all other cases of `csv::Error`.
    #[error(transparent)]
    CsvError(#[from] csv::Error),
    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// Represents all other cases of `niffler::Error`.
    #[error(transparent)]
    NifflerError(#[from] niffler::Error),
    /// Represents a failure to parse a tool output file
    #[error("failed to parse tool output: {0}")]
    Parse(#[from] crate::parser::ParseError),
    #[error("Failed to convert OsString to String")]
    FileNameConversionError,
    /// Indicates an algorithm name that is not registered
    #[error("unknown algorithm: '{0}'")]
    UnknownTool(String),
    /// Indicates a k-mer parameter that is neither an integer nor 'static'
    #[error("invalid k-mer parameter: '{0}'")]
    InvalidParameter(String),
    /// Indicates a k-mer selection that could not be parsed
    #[error("invalid k-mer selection '{0}' - expected comma-separated positive integers")]
    InvalidKmerSet(String),
    /// Indicates that the working directory root does not exist
    #[error("working directory does not exist: {}", .0.display())]
    WorkdirMissing(PathBuf),
    /// Indicates that the genome source directory does not exist
    #[error("genome source directory does not exist: {}", .0.display())]
    SourceMissing(PathBuf),
    /// Indicates that the accession column is missing from the taxonomy reference
    #[error("column '{0}' not found in taxonomy reference: {}", .1.display())]
    TaxonomyColumnMissing(String, PathBuf),
    /// Indicates that a persisted family table does not carry the expected header
    #[error("unexpected header in {}: expected '{expected}', found '{found}'", .path.display())]
    FamilyHeaderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
    /// Indicates a persisted family table row with too few fields
    #[error("record in {} has too few fields", .0.display())]
    FamilyRecordSize(PathBuf),
    /// Indicates failure to parse a value from a persisted family table
    #[error("failed to parse a valid float from record")]
    FloatError(#[from] std::num::ParseFloatError),
}
