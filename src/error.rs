// src/error.rs
//! Closed error taxonomy for everything that can go wrong per article or per source.
//!
//! Startup/config code uses `anyhow` instead; these kinds are what the pipeline
//! and the orchestrator report back to callers.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport-level failure (connect, timeout, TLS, body read), or a source
    /// page served with a non-2xx status.
    #[error("network error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// Malformed input: invalid article fields, unparseable payloads or pages.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The storage API answered, but not with success.
    #[error("storage error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Storage {
        status: Option<u16>,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Serializable tag used in reports and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Parse,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::Storage => "storage",
        }
    }
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network {
            status: None,
            message: message.into(),
        }
    }

    /// A page fetch answered with a non-2xx status.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Error::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    pub fn storage(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Storage {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } => ErrorKind::Network,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// HTTP status carried by the error, if the remote answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Network { status, .. } | Error::Storage { status, .. } => *status,
            Error::Parse { .. } => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Network failures, rate limiting (429) and server errors (5xx) may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::Storage {
                status: Some(s), ..
            } => *s == 429 || *s >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            Error::storage(Some(status.as_u16()), e.to_string())
        } else if e.is_decode() {
            Error::parse(e.to_string())
        } else {
            Error::network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::parse(e.to_string())
    }
}
