//! Error types for the library boundaries

use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the management API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API error ({status}) for {endpoint}: {body}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: String,
        body: String,
    },

    #[error("request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to parse response from {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("digest authentication failed for {endpoint}: {reason}")]
    DigestAuth { endpoint: String, reason: String },

    #[error("invalid API URL")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to create HTTP client")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    /// HTTP status of the failure, when the server answered
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure loading one of the configuration tables
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV")]
    Csv(#[from] csv::Error),

    #[error("invalid row at line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },

    #[error("missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),
}

/// Failure processing a single cluster entry
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("malformed cluster document")]
    MalformedCluster(#[from] serde_json::Error),
}

/// Failure writing or reading a run report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization failed")]
    Csv(#[from] csv::Error),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("invalid value '{value}' in column '{column}'")]
    InvalidCell { column: String, value: String },
}
