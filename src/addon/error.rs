//! Addon lifecycle error types.

use std::path::PathBuf;

use serde_json::{json, Value};
use thiserror::Error;

/// Result type for addon operations.
pub type AddonResult<T> = Result<T, AddonError>;

/// Code reported for conflicting global files.
pub const CONFLICT_CODE: i64 = -3;

/// Errors that can occur during addon operations.
#[derive(Debug, Error)]
pub enum AddonError {
    /// The package request itself failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote endpoint answered with an error envelope.
    #[error("{msg}")]
    Remote { code: i64, msg: String, data: Value },

    /// A required path is not writable.
    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be opened or extracted.
    #[error("Extract error: {0}")]
    Extract(String),

    /// Addon directory or module missing.
    #[error("Addon not found: {0}")]
    NotFound(String),

    /// Module present but its info self-check failed.
    #[error("Addon '{0}' has incomplete configuration")]
    IncompleteConfig(String),

    /// Global files would collide with existing shared-root files.
    #[error("Conflicting files found: {}", files.join(", "))]
    Conflict { files: Vec<String> },

    /// Install without force onto an existing addon directory.
    #[error("Addon '{0}' already exists")]
    AlreadyExists(String),

    /// The addon's own install/uninstall hook failed.
    #[error("Addon '{name}' hook failed: {message}")]
    Hook { name: String, message: String },

    /// Seed script import failed.
    #[error("Seed script failed: {0}")]
    Seed(String),

    /// Addon name is empty or unsafe as a path component.
    #[error("Invalid addon name: '{0}'")]
    InvalidName(String),

    /// Configuration or metadata could not be parsed/serialized.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AddonError {
    /// Wrap an IO failure at `path` as a [`AddonError::Write`].
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write { path: path.into(), source }
    }

    /// Machine-readable code.
    pub fn code(&self) -> i64 {
        match self {
            Self::Remote { code, .. } => *code,
            Self::Conflict { .. } => CONFLICT_CODE,
            _ => 0,
        }
    }

    /// Auxiliary payload carried by structured errors.
    pub fn data(&self) -> Value {
        match self {
            Self::Remote { data, .. } => data.clone(),
            Self::Conflict { files } => json!({ "conflictlist": files }),
            _ => Value::Null,
        }
    }

    /// Conflicting paths, when this is a conflict error.
    pub fn conflicts(&self) -> Option<&[String]> {
        match self {
            Self::Conflict { files } => Some(files),
            _ => None,
        }
    }

    /// `{code, msg, data}` envelope, the same shape the remote endpoint uses.
    pub fn to_envelope(&self) -> Value {
        json!({
            "code": self.code(),
            "msg": self.to_string(),
            "data": self.data(),
        })
    }
}
