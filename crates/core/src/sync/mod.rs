//! Remote sync against a single JSON file in a GitHub repository
//!
//! - `credentials`: the stored GitHub token
//! - `github`: the contents API client (read with revision, conditional write)
//! - `orchestrator`: when to pull and push

pub mod credentials;
pub mod github;
pub mod orchestrator;
#[cfg(test)]
mod orchestrator_test;

pub use credentials::CredentialStore;
pub use github::{GitHubClient, RemoteDocument, RemoteStore};
pub use orchestrator::{
    PullOutcome, StartupOutcome, SyncEvent, SyncOrchestrator, SyncState, AUTO_PUSH_DEBOUNCE,
};
