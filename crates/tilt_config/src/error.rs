//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `tilt.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A pin specification is malformed.
    #[error("invalid pin for '{role}': {reason}")]
    InvalidPin {
        /// The logical pin role (`select`, `sclk`, ...).
        role: String,
        /// Why the specification was rejected.
        reason: String,
    },

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}
