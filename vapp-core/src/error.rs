//! Structured errors shared by every launcher crate.
//!
//! Each variant names the resource it concerns so callers can branch on
//! [`ErrorKind`] instead of parsing messages.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`LaunchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    RemoteFailure,
    Timeout,
    PartialConfiguration,
    Conflict,
    Capacity,
    NotFound,
    Transport,
    Cancelled,
    Config,
    Io,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::RemoteFailure => "RemoteFailure",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::PartialConfiguration => "PartialConfigurationError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::Capacity => "CapacityError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Io => "IoError",
        };
        f.write_str(name)
    }
}

/// A single metadata key that could not be written.
#[derive(Debug)]
pub struct KeyFailure {
    pub key: String,
    pub error: LaunchError,
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Validation error on {resource}: {detail}")]
    Validation { resource: String, detail: String },

    #[error("Remote task failed on {resource}: {detail}")]
    RemoteFailure { resource: String, detail: String },

    #[error("Timed out after {waited:?} waiting on {resource}")]
    Timeout { resource: String, waited: Duration },

    #[error("Capacity error on {resource}: {detail}")]
    Capacity { resource: String, detail: String },

    #[error("Not found: {resource}: {detail}")]
    NotFound { resource: String, detail: String },

    #[error("Conflict on {resource}: {detail}")]
    Conflict { resource: String, detail: String },

    #[error("Control plane unreachable while working on {resource}: {detail}")]
    Transport { resource: String, detail: String },

    #[error("Cancelled while working on {resource}")]
    Cancelled { resource: String },

    #[error("Partial configuration of {resource} (applied: [{}]): {source}", .applied.join(", "))]
    PartialConfiguration {
        resource: String,
        applied: Vec<String>,
        source: Box<LaunchError>,
    },

    #[error("Metadata on {resource}: failed keys [{}]", failed_keys(.failures))]
    MetadataKeys {
        resource: String,
        applied: Vec<String>,
        failures: Vec<KeyFailure>,
    },

    #[error("VM {vm} failed at {step} (applied: [{}]): {source}", .applied.join(", "))]
    VmConfiguration {
        vm: String,
        step: String,
        applied: Vec<String>,
        source: Box<LaunchError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn failed_keys(failures: &[KeyFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.key, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl LaunchError {
    pub fn validation(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        LaunchError::Validation {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    pub fn remote(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        LaunchError::RemoteFailure {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        LaunchError::NotFound {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        LaunchError::Conflict {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    /// The kind callers should branch on. A VM wrapper reports the kind of
    /// the error that stopped the VM.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaunchError::Validation { .. } => ErrorKind::Validation,
            LaunchError::RemoteFailure { .. } => ErrorKind::RemoteFailure,
            LaunchError::Timeout { .. } => ErrorKind::Timeout,
            LaunchError::Capacity { .. } => ErrorKind::Capacity,
            LaunchError::NotFound { .. } => ErrorKind::NotFound,
            LaunchError::Conflict { .. } => ErrorKind::Conflict,
            LaunchError::Transport { .. } => ErrorKind::Transport,
            LaunchError::Cancelled { .. } => ErrorKind::Cancelled,
            LaunchError::PartialConfiguration { .. } | LaunchError::MetadataKeys { .. } => {
                ErrorKind::PartialConfiguration
            }
            LaunchError::VmConfiguration { source, .. } => source.kind(),
            LaunchError::Config(_) => ErrorKind::Config,
            LaunchError::Io(_) => ErrorKind::Io,
        }
    }

    /// Identifier of the resource involved, when there is one.
    pub fn resource(&self) -> Option<&str> {
        match self {
            LaunchError::Validation { resource, .. }
            | LaunchError::RemoteFailure { resource, .. }
            | LaunchError::Timeout { resource, .. }
            | LaunchError::Capacity { resource, .. }
            | LaunchError::NotFound { resource, .. }
            | LaunchError::Conflict { resource, .. }
            | LaunchError::Transport { resource, .. }
            | LaunchError::Cancelled { resource }
            | LaunchError::PartialConfiguration { resource, .. }
            | LaunchError::MetadataKeys { resource, .. } => Some(resource),
            LaunchError::VmConfiguration { vm, .. } => Some(vm),
            LaunchError::Config(_) | LaunchError::Io(_) => None,
        }
    }

    /// The innermost error, skipping the VM and partial-configuration wrappers.
    pub fn root_cause(&self) -> &LaunchError {
        match self {
            LaunchError::VmConfiguration { source, .. }
            | LaunchError::PartialConfiguration { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_yaml_ng::Error> for LaunchError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        LaunchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LaunchError {
    fn from(err: serde_json::Error) -> Self {
        LaunchError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;
