//! Error types for the prompt library
//!
//! Every failure in the core degrades to "operation did not take effect".
//! Callers of manual operations see these errors; background sync only logs
//! them.

use thiserror::Error;

/// Result type alias for prompt library operations
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Main error type for the prompt library
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Malformed persisted or imported document
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid, expired or rejected credential
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Any other non-success response from the remote API
    #[error("Remote error{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Remote {
        status:  Option<u16>,
        message: String,
    },

    /// Image decode/encode failure
    #[error("Image codec error: {0}")]
    Codec(String),

    /// Sync requested without a (verified) credential
    #[error("Remote sync is not configured")]
    NotConfigured,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command not found in registry
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Invalid command arguments
    #[error("Invalid arguments for command '{command}': {reason}")]
    InvalidArgs { command: String, reason: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error (catch-all)
    #[error("{0}")]
    Other(String),
}

impl LibraryError {
    /// Build a remote error from a response status
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        LibraryError::Remote {
            status:  Some(status),
            message: message.into(),
        }
    }

    /// Get user-friendly error message for the presentation layer
    pub fn user_message(&self) -> String {
        match self {
            LibraryError::CommandNotFound(cmd) => {
                format!(
                    "Command '{}' not found. Run `prompt-library help` for available commands.",
                    cmd
                )
            },
            LibraryError::InvalidArgs { command, reason } => {
                format!("Invalid arguments for '{}': {}", command, reason)
            },
            LibraryError::Auth(_) => {
                "GitHub rejected the token. Check that it is valid and has repo access.".to_string()
            },
            LibraryError::NotConfigured => {
                "Verify a GitHub token before syncing.".to_string()
            },
            LibraryError::Parse(msg) => format!("Invalid library data: {}", msg),
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            LibraryError::Parse(_) => "parse",
            LibraryError::Auth(_) => "auth",
            LibraryError::Remote { .. } => "remote",
            LibraryError::Codec(_) => "codec",
            LibraryError::NotConfigured => "not_configured",
            LibraryError::Serde(_) => "serialization",
            LibraryError::Io(_) => "io",
            LibraryError::CommandNotFound(_) => "command",
            LibraryError::InvalidArgs { .. } => "arguments",
            LibraryError::Validation(_) => "validation",
            LibraryError::Config(_) => "config",
            LibraryError::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        LibraryError::Remote {
            status:  err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<image::ImageError> for LibraryError {
    fn from(err: image::ImageError) -> Self {
        LibraryError::Codec(err.to_string())
    }
}

impl From<anyhow::Error> for LibraryError {
    fn from(err: anyhow::Error) -> Self {
        LibraryError::Other(err.to_string())
    }
}

impl From<String> for LibraryError {
    fn from(err: String) -> Self {
        LibraryError::Other(err)
    }
}

impl From<&str> for LibraryError {
    fn from(err: &str) -> Self {
        LibraryError::Other(err.to_string())
    }
}
