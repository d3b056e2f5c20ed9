use crate::endpoint::{ApiVersion, Operation};
use std::env;
use thiserror::Error;

/// Result type returned by every [`QBittorrentClient`](crate::client::QBittorrentClient) operation
pub type Result<T> = std::result::Result<T, QbitError>;

/// Custom error types for the [`QBittorrentClient`](crate::client::QBittorrentClient)
#[derive(Error, Debug)]
pub enum QbitError {
    #[error("No active session, call login() first")]
    Unauthenticated,

    #[error("Authorization error: {0}")]
    Unauthorized(String),

    /// The daemon refused the stored session cookie (401/403). The session has been cleared.
    #[error("Session rejected by qBittorrent with status {status}")]
    SessionExpired { status: u16 },

    #[error("Invalid torrent hash: {0:?}")]
    InvalidIdentity(String),

    #[error("Operation {operation} is not supported by Web API {version}")]
    UnsupportedOperation {
        operation: Operation,
        version: ApiVersion,
    },

    #[error("Network request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("qBittorrent API error: status={status}, message={message}")]
    Api { status: u16, message: String },

    #[error("Torrent submission rejected: {0}")]
    TorrentAdd(String),

    #[error("Invalid input parameter: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Environment variable error: {0}")]
    Environment(#[from] env::VarError),
}

impl QbitError {
    /// Whether the error belongs to the authentication class: no session,
    /// rejected credentials or a session the daemon no longer accepts.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::Unauthorized(_) | Self::SessionExpired { .. }
        )
    }
}
