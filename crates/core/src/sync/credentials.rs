//! GitHub credential slot
//!
//! The token lives in its own durable slot and only ever leaves the process
//! as the `Authorization` header of sync requests.

use std::sync::Arc;

use tracing::warn;

use crate::errors::Result;
use crate::storage::{KeyValueSlot, TOKEN_KEY};

/// Handle on the stored GitHub token
#[derive(Clone)]
pub struct CredentialStore {
    slot: Arc<dyn KeyValueSlot>,
}

impl CredentialStore {
    pub fn new(slot: Arc<dyn KeyValueSlot>) -> Self {
        Self { slot }
    }

    /// The stored token, if any. Blank values count as absent.
    pub fn get(&self) -> Option<String> {
        match self.slot.get(TOKEN_KEY) {
            Ok(token) => token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read credential slot");
                None
            },
        }
    }

    pub fn set(&self, token: &str) -> Result<()> {
        self.slot.set(TOKEN_KEY, token.trim())
    }

    pub fn clear(&self) -> Result<()> {
        self.slot.remove(TOKEN_KEY)
    }

    pub fn is_configured(&self) -> bool {
        self.get().is_some()
    }
}
