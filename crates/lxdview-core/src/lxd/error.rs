//! Errors from the LXD client.

use std::path::PathBuf;

/// Errors from the LXD client.
#[derive(Debug, thiserror::Error)]
pub enum LxdError {
    #[error("LXD socket not found at {0}")]
    SocketNotFound(PathBuf),

    #[error("{0} is not a unix socket")]
    NotASocket(PathBuf),

    #[error("failed to connect to LXD socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("request to {uri} failed: {message}")]
    Transport { uri: String, message: String },

    #[error("failed to decode response from {uri}: {source}")]
    Decode {
        uri: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Daemon(#[from] Box<DaemonError>),

    /// The resource URI does not have the shape the caller relies on.
    #[error("malformed resource URI {uri:?}: expected a path starting with {expected:?}")]
    InvalidResourceUri { uri: String, expected: &'static str },
}

impl LxdError {
    /// Whether the error means the socket could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            LxdError::SocketNotFound(_) | LxdError::NotASocket(_) | LxdError::Connect { .. }
        )
    }

    /// The structured daemon error, if the daemon answered with one.
    pub fn daemon(&self) -> Option<&DaemonError> {
        match self {
            LxdError::Daemon(err) => Some(err),
            _ => None,
        }
    }
}

/// The daemon answered with an `error` envelope.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "LXD daemon returned an error response ({code}: {message}). See response metadata for more details."
)]
pub struct DaemonError {
    /// The envelope's `error` text.
    pub message: String,
    /// The envelope's `error_code`.
    pub code: i64,
    /// Fully resolved URI of the failed request.
    pub request_uri: String,
    /// Raw `metadata` of the error envelope.
    pub metadata: serde_json::Value,
}
