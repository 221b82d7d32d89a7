//! Table error types

use thiserror::Error;

/// Errors raised by table controller operations
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Table not found: {0}")]
    NotFound(String),

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Column not found: {0}")]
    UnknownColumn(String),

    #[error("Column position {position} out of range (table has {len} columns)")]
    InvalidPosition { position: usize, len: usize },

    #[error("Saved filter not found: {0}")]
    SavedFilterNotFound(String),

    #[error("AI query correction is disabled")]
    AiDisabled,

    #[error("Failed to load rows for table {table}: {message}")]
    Rows { table: String, message: String },
}

/// Errors from collaborators reached over the network (correction service, row source)
///
/// Display strings are shaped so the error classifier recognises them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Failed to fetch: {0}")]
    Network(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("gRPC Error: {code} {text} - {details}")]
    Rpc {
        code: u16,
        text: String,
        details: String,
    },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    /// Service answered with a bare error string
    #[error("{0}")]
    Rejected(String),

    /// Service answered with neither a result nor an error
    #[error("Empty response")]
    Empty,
}

impl ServiceError {
    /// Error name used as the fallback title when classified
    pub fn name(&self) -> &'static str {
        match self {
            Self::Network(_) => "NetworkError",
            Self::Timeout(_) => "TimeoutError",
            Self::Rpc { .. } => "RpcError",
            Self::Http { .. } => "HttpError",
            Self::Decode(_) => "DecodeError",
            Self::Rejected(_) => "Error",
            Self::Empty => "UnknownError",
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            Self::Network(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            }
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
