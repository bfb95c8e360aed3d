use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Unable to generate output file name: station has no identifier and no output was given")]
    MissingTarget,

    #[error("Archive '{0}' already exists")]
    TargetExists(PathBuf),

    #[error("Archive '{0}' does not exist, cannot append")]
    TargetMissing(PathBuf),

    #[error("Archive '{path}' is not compatible: {reason}")]
    IncompatibleStore { path: PathBuf, reason: String },

    #[error("Failed to read archive '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode archive '{0}'")]
    Decode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode archive '{0}'")]
    Encode(PathBuf, #[source] Box<bincode::error::EncodeError>),

    #[error("Failed to write archive '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Position {index} is outside the time index of length {length} for '{variable}'")]
    IndexOutOfRange {
        variable: String,
        index: usize,
        length: usize,
    },

    #[error("Variable '{0}' not found in archive")]
    MissingVariable(String),

    #[error("Attribute '{0}' not found in archive")]
    MissingAttribute(String),

    #[error("Failed to read attribute template '{0}'")]
    TemplateRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse attribute template")]
    TemplateParse(#[source] serde_yaml::Error),

    #[error("Attribute template entry '{0}' must be a scalar value")]
    TemplateValue(String),

    #[error("Attribute '{attribute}' refers to unknown field '{field}'")]
    TemplateField { attribute: String, field: String },

    #[error("Failed to build DataFrame from archive")]
    Frame(#[from] PolarsError),

    #[error("I/O error writing parquet file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),
}
