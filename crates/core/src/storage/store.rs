//! Local library store
//!
//! Sole owner of the in-memory prompt and project collections. Every
//! mutation that takes effect is written through to the `DATA_KEY` slot
//! before the write lock is released, then announced on a watch channel so
//! the sync layer can schedule a push.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{KeyValueSlot, BACKUP_KEY, DATA_KEY};
use crate::errors::{LibraryError, Result};
use crate::model::{
    timestamp, AppData, NewProject, NewPrompt, Project, ProjectPatch, Prompt, PromptCategory,
    PromptPatch,
};

#[derive(Debug, Default)]
struct LibraryState {
    prompts:  Vec<Prompt>,
    projects: Vec<Project>,
}

/// In-memory library with write-through persistence
pub struct LibraryStore {
    state:   RwLock<LibraryState>,
    slot:    Arc<dyn KeyValueSlot>,
    /// False when the slot may hold data we failed to load
    persist: bool,
    changes: watch::Sender<u64>,
}

impl LibraryStore {
    /// Load the library from `slot`
    ///
    /// A missing document yields an empty library. A document that does not
    /// parse is copied to `BACKUP_KEY` before the store starts empty, so the
    /// next save cannot destroy it. If that copy fails, or the slot cannot
    /// be read at all, the store runs without writing to the slot.
    pub fn open(slot: Arc<dyn KeyValueSlot>) -> Self {
        let mut persist = true;
        let state = match slot.get(DATA_KEY) {
            Ok(Some(raw)) => match AppData::parse(&raw) {
                Ok(data) => {
                    debug!(
                        prompts = data.prompts.len(),
                        projects = data.projects.len(),
                        "Loaded library from local slot"
                    );
                    LibraryState {
                        prompts:  data.prompts,
                        projects: data.projects,
                    }
                },
                Err(e) => {
                    match slot.set(BACKUP_KEY, &raw) {
                        Ok(()) => warn!(
                            error = %e,
                            backup = BACKUP_KEY,
                            "Stored library is unreadable, kept a copy and starting empty"
                        ),
                        Err(backup_err) => {
                            warn!(
                                error = %e,
                                backup_error = %backup_err,
                                "Stored library is unreadable and could not be backed up, changes will not be saved"
                            );
                            persist = false;
                        },
                    }
                    LibraryState::default()
                },
            },
            Ok(None) => LibraryState::default(),
            Err(e) => {
                warn!(
                    error = %e,
                    category = e.category(),
                    "Failed to read local slot, changes will not be saved"
                );
                persist = false;
                LibraryState::default()
            },
        };

        let (changes, _) = watch::channel(0);
        Self {
            state: RwLock::new(state),
            slot,
            persist,
            changes,
        }
    }

    /// Whether mutations are written to the slot
    pub fn is_persistent(&self) -> bool {
        self.persist
    }

    /// Subscribe to change notifications
    ///
    /// The value is a revision counter bumped once per mutation that took
    /// effect. The state at subscription time is not reported as a change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Current revision counter
    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    // ========================================
    // Prompt operations
    // ========================================

    /// Create a prompt and prepend it to the library
    pub fn add_prompt(&self, draft: NewPrompt) -> Prompt {
        let now = timestamp::now();
        let prompt = Prompt {
            id:         new_id(),
            title:      draft.title,
            content:    draft.content,
            category:   draft.category,
            tags:       draft.tags,
            image_url:  draft.image_url,
            project_id: draft.project_id,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.write();
        state.prompts.insert(0, prompt.clone());
        self.commit(&state);
        prompt
    }

    /// Merge `patch` into the prompt with `id`. Returns `None` if absent.
    pub fn update_prompt(&self, id: &str, patch: PromptPatch) -> Option<Prompt> {
        let mut state = self.write();
        let prompt = state.prompts.iter_mut().find(|p| p.id == id)?;
        prompt.apply(patch);
        prompt.updated_at = next_timestamp(prompt.updated_at);
        let updated = prompt.clone();
        self.commit(&state);
        Some(updated)
    }

    /// Remove the prompt with `id`. Returns whether anything was removed.
    pub fn delete_prompt(&self, id: &str) -> bool {
        let mut state = self.write();
        let before = state.prompts.len();
        state.prompts.retain(|p| p.id != id);
        if state.prompts.len() == before {
            return false;
        }
        self.commit(&state);
        true
    }

    // ========================================
    // Project operations
    // ========================================

    /// Create a project and prepend it to the library
    pub fn add_project(&self, draft: NewProject) -> Project {
        let now = timestamp::now();
        let project = Project {
            id:            new_id(),
            name:          draft.name,
            description:   draft.description,
            thumbnail_url: draft.thumbnail_url,
            created_at:    now,
            updated_at:    now,
        };

        let mut state = self.write();
        state.projects.insert(0, project.clone());
        self.commit(&state);
        project
    }

    /// Merge `patch` into the project with `id`. Returns `None` if absent.
    pub fn update_project(&self, id: &str, patch: ProjectPatch) -> Option<Project> {
        let mut state = self.write();
        let project = state.projects.iter_mut().find(|p| p.id == id)?;
        project.apply(patch);
        project.updated_at = next_timestamp(project.updated_at);
        let updated = project.clone();
        self.commit(&state);
        Some(updated)
    }

    /// Remove the project with `id` and detach its prompts
    ///
    /// Prompts that referenced the project become generic; they are never
    /// deleted and nothing else about them changes.
    pub fn delete_project(&self, id: &str) -> bool {
        let mut state = self.write();
        let before = state.projects.len();
        state.projects.retain(|p| p.id != id);
        if state.projects.len() == before {
            return false;
        }

        for prompt in state.prompts.iter_mut() {
            if prompt.project_id.as_deref() == Some(id) {
                prompt.project_id = None;
            }
        }
        self.commit(&state);
        true
    }

    // ========================================
    // Snapshots
    // ========================================

    /// Current library as a document stamped with the export time
    pub fn snapshot(&self) -> AppData {
        let state = self.read();
        AppData::new(state.prompts.clone(), state.projects.clone())
    }

    /// Pretty-printed export of the current library
    pub fn export_snapshot(&self) -> Result<String> {
        Ok(self.snapshot().to_pretty_json()?)
    }

    /// Replace the library with a serialized document
    ///
    /// Returns `false` and leaves the library untouched when the payload is
    /// not JSON or lacks the `prompts` or `projects` field.
    pub fn import_snapshot(&self, raw: &str) -> bool {
        match self.try_import_snapshot(raw) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Import rejected");
                false
            },
        }
    }

    /// Like [`import_snapshot`](Self::import_snapshot) but reports why
    pub fn try_import_snapshot(&self, raw: &str) -> Result<()> {
        let data = AppData::parse(raw)?;
        self.replace(data);
        Ok(())
    }

    /// Replace both collections with those of `data` (no merge)
    pub fn replace(&self, data: AppData) {
        let mut state = self.write();
        state.prompts = data.prompts;
        state.projects = data.projects;
        self.commit(&state);
    }

    // ========================================
    // Queries
    // ========================================

    pub fn prompts(&self) -> Vec<Prompt> {
        self.read().prompts.clone()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.read().projects.clone()
    }

    pub fn prompt(&self, id: &str) -> Option<Prompt> {
        self.read().prompts.iter().find(|p| p.id == id).cloned()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.read().projects.iter().find(|p| p.id == id).cloned()
    }

    pub fn prompt_count(&self) -> usize {
        self.read().prompts.len()
    }

    /// Whether the library holds no prompts and no projects
    pub fn is_empty(&self) -> bool {
        let state = self.read();
        state.prompts.is_empty() && state.projects.is_empty()
    }

    /// Prompts attached to the project with `project_id`
    pub fn prompts_for_project(&self, project_id: &str) -> Vec<Prompt> {
        self.read()
            .prompts
            .iter()
            .filter(|p| p.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect()
    }

    /// Prompts not attached to any project
    pub fn generic_prompts(&self) -> Vec<Prompt> {
        self.read()
            .prompts
            .iter()
            .filter(|p| p.project_id.is_none())
            .cloned()
            .collect()
    }

    /// Prompts matching a search term and optional category
    pub fn search(&self, term: &str, category: Option<PromptCategory>) -> Vec<Prompt> {
        self.read()
            .prompts
            .iter()
            .filter(|p| p.matches(term, category.as_ref()))
            .cloned()
            .collect()
    }

    // ========================================
    // Internals
    // ========================================

    fn read(&self) -> RwLockReadGuard<'_, LibraryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LibraryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist the full document and announce the change
    ///
    /// Called with the write lock held so no reader observes a state that is
    /// not yet in the slot.
    fn commit(&self, state: &LibraryState) {
        if self.persist {
            let data = AppData::new(state.prompts.clone(), state.projects.clone());
            let persisted = data
                .to_pretty_json()
                .map_err(LibraryError::from)
                .and_then(|json| self.slot.set(DATA_KEY, &json));
            if let Err(e) = persisted {
                warn!(error = %e, category = e.category(), "Failed to persist library");
            }
        } else {
            debug!("Slot not loaded, skipping local save");
        }
        self.changes.send_modify(|rev| *rev += 1);
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A timestamp strictly after `previous`, normally the current time
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = timestamp::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}
