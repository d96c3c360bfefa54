//! Error type shared by the client, the version workflow and the proxy server
//!
//! Every failure the studio can hit falls into one of three user-facing
//! classes:
//!
//! | Variant | Raised when | Network touched? |
//! |---------|-------------|------------------|
//! | `Validation` | input rejected locally (empty commit message, no version) | never |
//! | `Transport` | the request could not be delivered (offline, refused, timeout) | attempted |
//! | `Backend` | the backend answered non-2xx, or with a body we cannot parse | yes |
//!
//! Reads degrade to bundled fallback data on `Transport`/`Backend`; writes
//! never do, so the user always learns that a mutation did not happen.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{0}")]
    Validation(String),

    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend error {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    pub fn validation(message: impl Into<String>) -> Self {
        StudioError::Validation(message.into())
    }

    /// A 2xx response whose body did not decode
    pub fn malformed(status: u16, detail: impl std::fmt::Display) -> Self {
        StudioError::Backend {
            status,
            body: format!("malformed response: {}", detail),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StudioError::Validation(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, StudioError::Transport(_))
    }

    /// HTTP status for backend errors
    pub fn status(&self) -> Option<u16> {
        match self {
            StudioError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a read operation may substitute fallback data for this error
    pub fn allows_fallback(&self) -> bool {
        matches!(self, StudioError::Transport(_) | StudioError::Backend { .. })
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
