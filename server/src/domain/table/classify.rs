//! Error classification
//!
//! Maps heterogeneous failures into a displayable [`ErrorInfo`]. Sources are
//! first lifted into the closed [`ErrorSource`] union, then matched against an
//! ordered rule list where the first match wins:
//!
//! | # | Source                                         | Title                      |
//! |---|------------------------------------------------|----------------------------|
//! | 1 | error, `gRPC Error: <code> <text> - <details>` | `gRPC Error <code>: <text>`|
//! | 2 | error containing `Failed to fetch`             | `Network Error`            |
//! | 3 | error containing `timeout`                     | `Timeout Error`            |
//! | 4 | any other error                                | error name or `Error`      |
//! | 5 | plain string                                   | `Error`                    |
//! | 6 | anything else                                  | `Unknown Error`            |

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::error::ServiceError;

static GRPC_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)gRPC Error: (\d+) (.+?) - (.*)").expect("valid gRPC error pattern")
});

const NETWORK_TITLE: &str = "Network Error";
const NETWORK_MESSAGE: &str =
    "Unable to connect to the server. Please check your connection and try again.";
const TIMEOUT_TITLE: &str = "Timeout Error";
const TIMEOUT_MESSAGE: &str = "The request took too long to complete. Please try again.";
const UNKNOWN_TITLE: &str = "Unknown Error";
const UNKNOWN_MESSAGE: &str = "An unexpected error occurred.";

/// User-facing error descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Anything that can fail, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSource {
    /// Structured error with an optional name and stack
    Error {
        name: Option<String>,
        message: String,
        stack: Option<String>,
    },
    /// Bare error string
    Text(String),
    /// Unrecognised failure shape
    Unknown,
}

impl From<&ServiceError> for ErrorSource {
    fn from(e: &ServiceError) -> Self {
        match e {
            ServiceError::Rejected(message) => Self::Text(message.clone()),
            ServiceError::Empty => Self::Unknown,
            other => Self::Error {
                name: Some(other.name().to_string()),
                message: other.to_string(),
                stack: None,
            },
        }
    }
}

/// Classify a failure into a displayable descriptor
pub fn classify(source: &ErrorSource) -> ErrorInfo {
    match source {
        ErrorSource::Error {
            name,
            message,
            stack,
        } => {
            if let Some(caps) = GRPC_ERROR.captures(message) {
                return ErrorInfo {
                    title: format!("gRPC Error {}: {}", &caps[1], caps[2].trim()),
                    message: caps[3].to_string(),
                    stack: stack.clone(),
                };
            }
            if message.contains("Failed to fetch") {
                return ErrorInfo {
                    title: NETWORK_TITLE.to_string(),
                    message: NETWORK_MESSAGE.to_string(),
                    stack: None,
                };
            }
            if message.contains("timeout") {
                return ErrorInfo {
                    title: TIMEOUT_TITLE.to_string(),
                    message: TIMEOUT_MESSAGE.to_string(),
                    stack: None,
                };
            }
            ErrorInfo {
                title: name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("Error")
                    .to_string(),
                message: message.clone(),
                stack: stack.clone(),
            }
        }
        ErrorSource::Text(message) => ErrorInfo {
            title: "Error".to_string(),
            message: message.clone(),
            stack: None,
        },
        ErrorSource::Unknown => ErrorInfo {
            title: UNKNOWN_TITLE.to_string(),
            message: UNKNOWN_MESSAGE.to_string(),
            stack: None,
        },
    }
}
