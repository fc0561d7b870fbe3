//! Library handle
//!
//! Wires the durable slots, local store, credential slot, GitHub client and
//! sync orchestrator together. Lifecycle is explicit:
//!
//! ```text
//! Library::open(&config)  -> load local state
//! library.start().await   -> auto-push watcher + startup reconciliation
//! library.shutdown().await -> flush pending push, stop background tasks
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::Result;
use crate::storage::{FileSlot, KeyValueSlot, LibraryStore};
use crate::sync::{CredentialStore, GitHubClient, RemoteStore, StartupOutcome, SyncOrchestrator};

pub struct Library {
    store:       Arc<LibraryStore>,
    credentials: CredentialStore,
    sync:        Arc<SyncOrchestrator>,
    tasks:       Mutex<Vec<JoinHandle<()>>>,
}

impl Library {
    /// Open the library stored under `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        let slot: Arc<dyn KeyValueSlot> = Arc::new(FileSlot::open(&config.data_dir)?);
        let credentials = CredentialStore::new(Arc::clone(&slot));
        let remote = Arc::new(GitHubClient::new(credentials.clone())?);
        info!(data_dir = %config.data_dir.display(), "Opening prompt library");
        Ok(Self::from_parts(slot, remote))
    }

    /// Open over `slot`, talking to a GitHub-compatible API at `api_base`
    pub fn with_api_base(slot: Arc<dyn KeyValueSlot>, api_base: &str) -> Result<Self> {
        let credentials = CredentialStore::new(Arc::clone(&slot));
        let remote = Arc::new(GitHubClient::with_base_url(credentials, api_base)?);
        Ok(Self::from_parts(slot, remote))
    }

    /// Assemble from an arbitrary remote
    pub fn from_parts(slot: Arc<dyn KeyValueSlot>, remote: Arc<dyn RemoteStore>) -> Self {
        let store = Arc::new(LibraryStore::open(Arc::clone(&slot)));
        let credentials = CredentialStore::new(slot);
        let sync = Arc::new(SyncOrchestrator::new(
            Arc::clone(&store),
            remote,
            credentials.clone(),
        ));

        Self {
            store,
            credentials,
            sync,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    pub fn sync(&self) -> &Arc<SyncOrchestrator> {
        &self.sync
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Start background sync and run startup reconciliation
    ///
    /// Must be called from within a Tokio runtime. The watcher starts first,
    /// so a startup import schedules a push like any other mutation.
    pub async fn start(&self) -> StartupOutcome {
        let watcher = self.sync.spawn_auto_push();
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(watcher);

        let outcome = self.sync.startup_reconcile().await;
        debug!(?outcome, "Startup reconciliation finished");
        outcome
    }

    /// Stop background tasks and push any change not yet pushed
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            task.abort();
            // Cancelled
            let _ = task.await;
        }

        self.sync.flush().await;
        debug!("Prompt library shut down");
    }
}
