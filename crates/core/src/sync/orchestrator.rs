//! Sync orchestration
//!
//! Decides when the library talks to GitHub:
//! - once at startup, pulling and adopting the remote copy when it holds
//!   more prompts than the local one
//! - 2 s after the last local mutation (trailing-edge debounce), pushing the
//!   library as it is when the timer fires
//! - on explicit manual push/pull requests, which report their errors
//!
//! Only one remote operation runs at a time. Background failures are logged
//! and published on the event channel, never returned.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::github::RemoteStore;
use crate::errors::{LibraryError, Result};
use crate::storage::LibraryStore;

/// Quiet period after the last mutation before an automatic push
pub const AUTO_PUSH_DEBOUNCE: Duration = Duration::from_secs(2);

const EVENT_CAPACITY: usize = 32;

/// What the orchestrator is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Pulling,
    Pushing,
}

/// Published after every remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Pulled { prompts: usize, projects: usize },
    Pushed { prompts: usize, projects: usize },
    PullFailed { category: &'static str, message: String },
    PushFailed { category: &'static str, message: String },
    Skipped { reason: &'static str },
}

/// Result of a manual pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum PullOutcome {
    Imported { prompts: usize, projects: usize },
    NoRemoteData,
}

/// Result of startup reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    AlreadyRan,
    NotConfigured,
    NoRemoteData,
    Imported,
    KeptLocal,
    Failed,
}

struct PendingPush {
    generation: u64,
    handle:     JoinHandle<()>,
}

/// Resets the state to idle when the operation ends
struct StateGuard<'a> {
    state: &'a Mutex<SyncState>,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a Mutex<SyncState>, next: SyncState) -> Self {
        *lock(state) = next;
        Self { state }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = SyncState::Idle;
    }
}

/// Coordinates the local store with the remote copy
pub struct SyncOrchestrator {
    store:           Arc<LibraryStore>,
    remote:          Arc<dyn RemoteStore>,
    credentials:     CredentialStore,
    debounce:        Duration,
    state:           Mutex<SyncState>,
    remote_lock:     tokio::sync::Mutex<()>,
    pending:         Mutex<Option<PendingPush>>,
    /// Timer whose push is underway
    running:         Mutex<Option<PendingPush>>,
    next_generation: AtomicU64,
    seen_revision:   AtomicU64,
    watching:        AtomicBool,
    verified:        AtomicBool,
    startup_ran:     AtomicBool,
    events:          broadcast::Sender<SyncEvent>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<LibraryStore>,
        remote: Arc<dyn RemoteStore>,
        credentials: CredentialStore,
    ) -> Self {
        Self::with_debounce(store, remote, credentials, AUTO_PUSH_DEBOUNCE)
    }

    pub fn with_debounce(
        store: Arc<LibraryStore>,
        remote: Arc<dyn RemoteStore>,
        credentials: CredentialStore,
        debounce: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            remote,
            credentials,
            debounce,
            state: Mutex::new(SyncState::Idle),
            remote_lock: tokio::sync::Mutex::new(()),
            pending: Mutex::new(None),
            running: Mutex::new(None),
            next_generation: AtomicU64::new(0),
            seen_revision: AtomicU64::new(0),
            watching: AtomicBool::new(false),
            verified: AtomicBool::new(false),
            startup_ran: AtomicBool::new(false),
            events,
        }
    }

    pub fn state(&self) -> SyncState {
        *lock(&self.state)
    }

    /// Subscribe to sync events
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Whether a debounced push is waiting for its timer
    pub fn has_pending_push(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Whether a credential was verified during this session
    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::SeqCst) && self.credentials.is_configured()
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    // ========================================
    // Credentials
    // ========================================

    /// Check `token` against the API; on success store it and mark verified
    pub async fn verify_credential(&self, token: &str) -> Result<bool> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(false);
        }

        if !self.remote.verify_credential(token).await {
            info!("GitHub token rejected");
            return Ok(false);
        }

        self.credentials.set(token)?;
        self.verified.store(true, Ordering::SeqCst);
        info!("GitHub token verified and stored");
        Ok(true)
    }

    /// Store a token without verifying it
    pub fn set_credential(&self, token: &str) -> Result<()> {
        self.credentials.set(token)?;
        self.verified.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Forget the stored token and drop any pending push
    pub fn clear_credential(&self) -> Result<()> {
        self.cancel_pending_push();
        self.credentials.clear()?;
        self.verified.store(false, Ordering::SeqCst);
        Ok(())
    }

    // ========================================
    // Startup reconciliation
    // ========================================

    /// Pull once at startup and adopt the remote copy if it is larger
    ///
    /// The remote library replaces the local one when the local library is
    /// empty or has strictly fewer prompts. Failures are logged only.
    pub async fn startup_reconcile(&self) -> StartupOutcome {
        if self.startup_ran.swap(true, Ordering::SeqCst) {
            return StartupOutcome::AlreadyRan;
        }
        if !self.credentials.is_configured() {
            debug!("No GitHub token, skipping startup pull");
            return StartupOutcome::NotConfigured;
        }

        let pulled = {
            let _remote = self.remote_lock.lock().await;
            let _state = StateGuard::enter(&self.state, SyncState::Pulling);
            self.remote.pull().await
        };

        let data = match pulled {
            Ok(Some(data)) if data.record_count() > 0 => data,
            Ok(_) => {
                debug!("No remote library to reconcile with");
                return StartupOutcome::NoRemoteData;
            },
            Err(e) => {
                warn!(error = %e, category = e.category(), "Startup pull failed");
                self.emit(SyncEvent::PullFailed {
                    category: e.category(),
                    message:  e.to_string(),
                });
                return StartupOutcome::Failed;
            },
        };

        let local = self.store.prompt_count();
        if self.store.is_empty() || local < data.prompts.len() {
            let (prompts, projects) = (data.prompts.len(), data.projects.len());
            self.store.replace(data);
            info!(prompts, projects, "Adopted remote library at startup");
            self.emit(SyncEvent::Pulled { prompts, projects });
            StartupOutcome::Imported
        } else {
            debug!(
                local,
                remote = data.prompts.len(),
                "Local library is at least as large, keeping it"
            );
            StartupOutcome::KeptLocal
        }
    }

    // ========================================
    // Debounced auto-push
    // ========================================

    /// Watch the store and schedule a push after every mutation
    ///
    /// The state at the time of the call does not count as a mutation.
    pub fn spawn_auto_push(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.store.subscribe();
        self.seen_revision
            .store(*changes.borrow_and_update(), Ordering::SeqCst);
        self.watching.store(true, Ordering::SeqCst);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let revision = *changes.borrow_and_update();
                this.schedule_push();
                this.seen_revision.store(revision, Ordering::SeqCst);
            }
        })
    }

    /// Arm the debounce timer, cancelling any timer already armed
    pub fn schedule_push(self: &Arc<Self>) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);

        // Spawn and swap under the lock so the new timer cannot claim itself
        // before it is registered.
        let mut pending = lock(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(this.debounce).await;
            if this.claim_pending(generation) {
                this.auto_push().await;
                this.finish_running(generation);
            }
        });
        if let Some(previous) = pending.replace(PendingPush { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Push now if a debounced push is pending
    ///
    /// Waits for a debounced push that is already underway. Also covers
    /// mutations the watcher has not picked up yet, so stop the watcher
    /// before the final flush.
    pub async fn flush(&self) {
        let running = lock(&self.running).take();
        if let Some(running) = running {
            debug!("Waiting for in-flight auto-push");
            // A panicked or aborted push has nothing left to wait for
            let _ = running.handle.await;
        }

        let pending = lock(&self.pending).take();
        let revision = self.store.revision();
        let unseen = self.watching.load(Ordering::SeqCst)
            && revision > self.seen_revision.swap(revision, Ordering::SeqCst);

        if let Some(pending) = &pending {
            pending.handle.abort();
        }
        if pending.is_some() || unseen {
            self.auto_push().await;
        }
    }

    /// Drop a pending push without running it
    pub fn cancel_pending_push(&self) {
        if let Some(pending) = lock(&self.pending).take() {
            pending.handle.abort();
        }
    }

    /// Move the pending timer to `running` if `generation` is still current
    fn claim_pending(&self, generation: u64) -> bool {
        let mut pending = lock(&self.pending);
        match pending.as_ref() {
            Some(p) if p.generation == generation => {
                *lock(&self.running) = pending.take();
                true
            },
            _ => false,
        }
    }

    fn finish_running(&self, generation: u64) {
        let mut running = lock(&self.running);
        if running.as_ref().is_some_and(|r| r.generation == generation) {
            running.take();
        }
    }

    async fn auto_push(&self) {
        if !self.credentials.is_configured() {
            debug!("No GitHub token, skipping auto-push");
            self.emit(SyncEvent::Skipped {
                reason: "not_configured",
            });
            return;
        }

        match self.push_current().await {
            Ok((prompts, projects)) => {
                debug!(prompts, projects, "Auto-push complete");
                self.emit(SyncEvent::Pushed { prompts, projects });
            },
            Err(e) => {
                warn!(error = %e, category = e.category(), "Auto-push failed");
                self.emit(SyncEvent::PushFailed {
                    category: e.category(),
                    message:  e.to_string(),
                });
            },
        }
    }

    /// Push the library as it is once the remote is free
    async fn push_current(&self) -> Result<(usize, usize)> {
        let _remote = self.remote_lock.lock().await;
        let _state = StateGuard::enter(&self.state, SyncState::Pushing);
        let data = self.store.snapshot();
        self.remote.push(&data).await?;
        Ok((data.prompts.len(), data.projects.len()))
    }

    // ========================================
    // Manual operations
    // ========================================

    /// Push the current library, reporting failure
    pub async fn manual_push(&self) -> Result<(usize, usize)> {
        self.require_verified()?;
        self.cancel_pending_push();

        let result = self.push_current().await;
        match &result {
            Ok((prompts, projects)) => self.emit(SyncEvent::Pushed {
                prompts:  *prompts,
                projects: *projects,
            }),
            Err(e) => self.emit(SyncEvent::PushFailed {
                category: e.category(),
                message:  e.to_string(),
            }),
        }
        result
    }

    /// Pull the remote library and replace the local one with it
    pub async fn manual_pull(&self) -> Result<PullOutcome> {
        self.require_verified()?;

        let pulled = {
            let _remote = self.remote_lock.lock().await;
            let _state = StateGuard::enter(&self.state, SyncState::Pulling);
            self.remote.pull().await
        };

        match pulled {
            Ok(Some(data)) => {
                let (prompts, projects) = (data.prompts.len(), data.projects.len());
                self.store.replace(data);
                self.emit(SyncEvent::Pulled { prompts, projects });
                Ok(PullOutcome::Imported { prompts, projects })
            },
            Ok(None) => Ok(PullOutcome::NoRemoteData),
            Err(e) => {
                self.emit(SyncEvent::PullFailed {
                    category: e.category(),
                    message:  e.to_string(),
                });
                Err(e)
            },
        }
    }

    fn require_verified(&self) -> Result<()> {
        if self.is_verified() {
            Ok(())
        } else {
            Err(LibraryError::NotConfigured)
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
