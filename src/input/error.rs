use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read input file '{0}'")]
    ReadFile(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse JSON from '{0}'")]
    JsonParse(PathBuf, #[source] serde_json::Error),

    #[error("Reference time '{value}' is not an ISO-8601 timestamp with timezone")]
    InvalidReferenceTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Station descriptor '{0}' contains no station")]
    EmptyStationList(PathBuf),
}
