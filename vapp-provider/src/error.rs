//! Errors reported by a control-plane client.
//!
//! These describe what the client saw on the wire. The orchestrator turns
//! them into structured launch errors once it knows which resource a call
//! was about.

use thiserror::Error;

/// Why the control plane refused a request outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InsufficientCapacity,
    InvalidRequest,
    Busy,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Request rejected ({reason:?}): {message}")]
    Rejected { reason: RejectReason, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl ClientError {
    pub fn not_found(kind: &str, name: impl Into<String>) -> Self {
        ClientError::NotFound {
            kind: kind.to_string(),
            name: name.into(),
        }
    }

    pub fn rejected(reason: RejectReason, message: impl Into<String>) -> Self {
        ClientError::Rejected {
            reason,
            message: message.into(),
        }
    }

    /// Only transport failures may be retried; everything else was an
    /// answer from the control plane.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
