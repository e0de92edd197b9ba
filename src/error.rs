//! Error types for shcache
//!
//! All modules use `ShcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shcache operations
pub type ShcacheResult<T> = Result<T, ShcacheError>;

/// All errors that can occur in shcache
#[derive(Error, Debug)]
pub enum ShcacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache entry errors
    #[error("Failed to lock cache entry {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Exit code file {path} has no exit code: {content:?}")]
    CodeFileInvalid { path: PathBuf, content: String },

    // Process errors
    #[error("Command cannot be empty")]
    EmptyCommand,

    #[error("Failed to start command: {command}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed reading output of command: {command}")]
    CommandOutput {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a lock error for the given entry path
    pub fn lock(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Lock {
            path: path.into(),
            source,
        }
    }

    /// Create a command spawn error
    pub fn command_spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandSpawn {
            command: command.into(),
            source,
        }
    }

    /// Whether the error came from launching or running the cached command.
    ///
    /// These never escape `update`: the leader caches them as an empty
    /// result with the sentinel exit code.
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            Self::EmptyCommand | Self::CommandSpawn { .. } | Self::CommandOutput { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid { .. } | Self::TomlParse(_) => {
                Some("Run: shcache config init --force")
            }
            Self::CodeFileInvalid { .. } => Some("Run: shcache update <command> to rebuild the entry"),
            Self::EmptyCommand => Some("Pass the command as a single quoted argument"),
            _ => None,
        }
    }
}
