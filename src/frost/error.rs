use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrostApiError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {0}")]
    Decode(String, #[source] reqwest::Error),

    #[error("No data returned for {0}")]
    NoData(String),

    #[error("Failed to create directory '{0}'")]
    CreateDir(PathBuf, #[source] std::io::Error),

    #[error("Failed to write observations to '{0}'")]
    WriteFile(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode observations for '{0}'")]
    Encode(PathBuf, #[source] serde_json::Error),

    #[error("Invalid month '{value}', expected YYYY-MM")]
    InvalidMonth {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Time range out of bounds: {0}")]
    InvalidTimeRange(String),
}
