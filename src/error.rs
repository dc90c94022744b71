//! Error types for ngsiflow.
//!
//! All errors are represented by the `NgsiError` enum. Upstream HTTP errors
//! are not errors at this level: they are classified into a
//! [`ResponseOutcome`](crate::ngsi::ResponseOutcome) and reported by the node.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all ngsiflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum NgsiError {
    /// Node or broker configuration errors, detected before any network call.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML, header values).
    #[error("{0}")]
    Convert(String),

    /// No response was received from the remote service.
    #[error("{0}")]
    Transport(String),

    /// Token acquisition errors.
    #[error("{0}")]
    Auth(String),

    /// Node registration or lookup errors.
    #[error("{0}")]
    Node(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Runtime errors.
    #[error("{0}")]
    Runtime(String),
}

impl NgsiError {
    /// A required identifier is absent or empty.
    pub fn missing(field: &str) -> Self {
        NgsiError::Config(format!("{} not found", field))
    }
}

impl From<NgsiError> for String {
    fn from(val: NgsiError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for NgsiError {
    fn from(error: std::io::Error) -> Self {
        NgsiError::IoError(error.to_string())
    }
}

impl From<NgsiError> for std::io::Error {
    fn from(val: NgsiError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for NgsiError {
    fn from(_: FromUtf8Error) -> Self {
        NgsiError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for NgsiError {
    fn from(error: serde_json::Error) -> Self {
        NgsiError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for NgsiError {
    fn from(error: toml::de::Error) -> Self {
        NgsiError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for NgsiError {
    fn from(error: reqwest::Error) -> Self {
        NgsiError::Transport(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for NgsiError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        NgsiError::Config(error.to_string())
    }
}
