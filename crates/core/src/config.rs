//! Runtime configuration
//!
//! Read from the environment (optionally seeded from a `.env` file):
//! - `PROMPT_LIBRARY_DIR`: directory holding the library and token slots
//! - `PROMPT_LIBRARY_LOG`: tracing filter directive
//!
//! The GitHub repository coordinates are fixed and not configurable here.

use std::path::PathBuf;

use crate::errors::{LibraryError, Result};

pub const DATA_DIR_ENV: &str = "PROMPT_LIBRARY_DIR";
pub const LOG_ENV: &str = "PROMPT_LIBRARY_LOG";

const DEFAULT_LOG_FILTER: &str = "info";
const APP_DIR_NAME: &str = "prompt-library";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir:   PathBuf,
    pub log_filter: String,
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        // A missing .env file is the normal case
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration rooted at an explicit data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir:   data_dir.into(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let log_filter = lookup(LOG_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            data_dir,
            log_filter,
        })
    }
}

/// Platform data directory for the library (`~/.local/share/prompt-library`
/// on Linux)
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| LibraryError::Config("Could not determine data directory".into()))
}
