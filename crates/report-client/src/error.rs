use std::path::PathBuf;

use report_spec::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("invalid configuration value for {key}: {reason}")]
    ConfigValue { key: &'static str, reason: String },
    #[error("invalid base url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base url '{0}' cannot be extended with a path")]
    OpaqueBaseUrl(String),
    #[error("session token cannot be sent as a header")]
    InvalidToken,
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("form schema rejected: {0}")]
    Schema(#[from] SchemaError),
}

impl ClientError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}
