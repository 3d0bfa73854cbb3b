//! Core error types for Athlethia.
//!
//! Target parsing, configuration and collaborator failures each get their own
//! enum so callers can decide which ones are fatal. Only configuration errors
//! stop the system from serving scans.

use thiserror::Error;

/// Reasons a submitted target cannot be turned into a [`crate::NormalizedTarget`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// Nothing was submitted (or only whitespace)
    #[error("target is empty")]
    Empty,

    /// Scheme other than http or https
    #[error("unsupported scheme '{0}', only http and https can be scanned")]
    UnsupportedScheme(String),

    /// The URL parser rejected the input
    #[error("target is not a valid URL: {0}")]
    Invalid(String),

    /// The URL has no host component
    #[error("target has no host")]
    MissingHost,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by external collaborators (database, classifier, intel feeds).
#[derive(Error, Debug, Clone)]
pub enum CollaboratorError {
    /// The collaborator could not be reached
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        /// Collaborator name
        collaborator: String,
        /// Error message
        message: String,
    },

    /// The collaborator was reached but failed the request
    #[error("{collaborator} error: {message}")]
    Backend {
        /// Collaborator name
        collaborator: String,
        /// Error message
        message: String,
    },

    /// The requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

impl CollaboratorError {
    /// Shorthand for an unreachable collaborator.
    #[must_use]
    pub fn unavailable(collaborator: &str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator: collaborator.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a collaborator-side failure.
    #[must_use]
    pub fn backend(collaborator: &str, message: impl Into<String>) -> Self {
        Self::Backend {
            collaborator: collaborator.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
