//! prompt-library-core: local-first prompt library with GitHub sync
//!
//! Stores AI prompts (text, category, tags, optional embedded image) grouped
//! into optional projects, and mirrors the whole library to a single JSON
//! file in a GitHub repository:
//! - Local store persisted on every mutation
//! - Pull at startup, adopting the remote copy when it is larger
//! - Debounced auto-push after local edits
//! - Manual push/pull with error reporting
//! - Image recompression to JPEG data URIs
//!
//! ## Architecture
//!
//! - **storage**: durable key/value slots and the in-memory library store
//! - **sync**: GitHub contents API client and the sync orchestrator
//! - **commands**: JSON command surface used by front ends and the CLI
//! - **app**: wires everything together with an explicit start/shutdown

// Module declarations
pub mod app;
pub mod commands;
pub mod config;
pub mod errors;
pub mod image_codec;
pub mod logging;
pub mod model;
pub mod runtime;
pub mod storage;
pub mod sync;

pub use app::Library;
pub use config::Config;
pub use errors::{LibraryError, Result};
pub use model::{AppData, Project, Prompt, PromptCategory};
