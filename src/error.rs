use std::{fmt, io};

use thiserror::Error;

use crate::{encoding::EncodingError, protocol::TransportError};

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// What a failed replace/store targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Blob,
}

impl ResourceKind {
    fn verb(&self) -> &'static str {
        match self {
            ResourceKind::Document => "replace",
            ResourceKind::Blob => "store",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Document => f.write_str("document"),
            ResourceKind::Blob => f.write_str("blob"),
        }
    }
}

/// Errors surfaced by connections, sessions and queries. Server-reported
/// failures carry the server's message text verbatim.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("query compilation failed: {0}")]
    QueryCompileFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("cannot create database: {0}")]
    DatabaseCreateFailed(String),

    #[error("cannot add resource: {0}")]
    ResourceAddFailed(String),

    #[error("cannot {} {kind}: {message}", .kind.verb())]
    ResourceReplaceFailed { kind: ResourceKind, message: String },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("unexpected reply '{0}'")]
    UnexpectedReply(String),

    #[error("invalid connection options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    pub(crate) fn replace_failed(kind: ResourceKind) -> impl FnOnce(String) -> ClientError {
        move |message| ClientError::ResourceReplaceFailed { kind, message }
    }

    /// True for the errors reported by the server itself, as opposed to
    /// local I/O, encoding or lifecycle errors.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ClientError::AuthenticationFailed(_)
                | ClientError::CommandFailed(_)
                | ClientError::QueryCompileFailed(_)
                | ClientError::QueryFailed(_)
                | ClientError::DatabaseCreateFailed(_)
                | ClientError::ResourceAddFailed(_)
                | ClientError::ResourceReplaceFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_failures_name_the_operation() {
        let replace = ClientError::replace_failed(ResourceKind::Document)("locked".into());
        assert_eq!(replace.to_string(), "cannot replace document: locked");

        let store = ClientError::replace_failed(ResourceKind::Blob)("no database".into());
        assert_eq!(store.to_string(), "cannot store blob: no database");
    }
}
