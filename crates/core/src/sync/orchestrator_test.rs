#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::errors::{LibraryError, Result};
    use crate::model::{AppData, NewProject, NewPrompt, PromptCategory};
    use crate::storage::{LibraryStore, MemorySlot};
    use crate::sync::credentials::CredentialStore;
    use crate::sync::github::{MockRemoteStore, RemoteStore};
    use crate::sync::orchestrator::{
        PullOutcome, StartupOutcome, SyncEvent, SyncOrchestrator, SyncState,
    };

    /// In-memory remote that records pushes
    #[derive(Default)]
    struct FakeRemote {
        document:  Mutex<Option<AppData>>,
        pushes:    Mutex<Vec<AppData>>,
        fail_pull: bool,
        fail_push: bool,
        /// Simulated request latency for pushes
        push_delay: Duration,
    }

    impl FakeRemote {
        fn with_document(data: AppData) -> Self {
            Self {
                document: Mutex::new(Some(data)),
                ..Default::default()
            }
        }

        fn push_count(&self) -> usize {
            self.pushes.lock().unwrap().len()
        }

        fn last_push(&self) -> AppData {
            self.pushes.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn pull(&self) -> Result<Option<AppData>> {
            if self.fail_pull {
                return Err(LibraryError::remote(500, "boom"));
            }
            Ok(self.document.lock().unwrap().clone())
        }

        async fn push(&self, data: &AppData) -> Result<()> {
            tokio::time::sleep(self.push_delay).await;
            if self.fail_push {
                return Err(LibraryError::remote(409, "conflict"));
            }
            self.pushes.lock().unwrap().push(data.clone());
            *self.document.lock().unwrap() = Some(data.clone());
            Ok(())
        }

        async fn verify_credential(&self, token: &str) -> bool {
            token == "ghp_good"
        }
    }

    fn draft(title: &str) -> NewPrompt {
        NewPrompt {
            title:      title.to_string(),
            content:    "content".to_string(),
            category:   PromptCategory::Code,
            tags:       vec![],
            image_url:  None,
            project_id: None,
        }
    }

    /// A document with `prompts` prompts and `projects` projects
    fn remote_library(prompts: usize, projects: usize) -> AppData {
        let store = LibraryStore::open(Arc::new(MemorySlot::new()));
        for i in 0..projects {
            store.add_project(NewProject {
                name:          format!("remote project {}", i),
                description:   String::new(),
                thumbnail_url: None,
            });
        }
        for i in 0..prompts {
            store.add_prompt(draft(&format!("remote {}", i)));
        }
        store.snapshot()
    }

    fn local_store(prompts: usize) -> Arc<LibraryStore> {
        let store = Arc::new(LibraryStore::open(Arc::new(MemorySlot::new())));
        for i in 0..prompts {
            store.add_prompt(draft(&format!("local {}", i)));
        }
        store
    }

    fn credentials(token: Option<&str>) -> CredentialStore {
        let creds = CredentialStore::new(Arc::new(MemorySlot::new()));
        if let Some(token) = token {
            creds.set(token).unwrap();
        }
        creds
    }

    fn orchestrator(
        store: Arc<LibraryStore>,
        remote: Arc<dyn RemoteStore>,
        token: Option<&str>,
    ) -> Arc<SyncOrchestrator> {
        Arc::new(SyncOrchestrator::new(store, remote, credentials(token)))
    }

    // ========================================
    // Startup reconciliation
    // ========================================

    #[tokio::test]
    async fn test_startup_adopts_larger_remote() {
        let store = local_store(2);
        let remote_data = remote_library(5, 1);
        let remote = Arc::new(FakeRemote::with_document(remote_data.clone()));
        let sync = orchestrator(store.clone(), remote, Some("ghp_good"));

        assert_eq!(sync.startup_reconcile().await, StartupOutcome::Imported);
        assert_eq!(store.prompts(), remote_data.prompts);
        assert_eq!(store.projects(), remote_data.projects);
    }

    #[tokio::test]
    async fn test_startup_keeps_larger_local() {
        let store = local_store(5);
        let before = store.prompts();
        let remote = Arc::new(FakeRemote::with_document(remote_library(2, 0)));
        let sync = orchestrator(store.clone(), remote, Some("ghp_good"));

        assert_eq!(sync.startup_reconcile().await, StartupOutcome::KeptLocal);
        assert_eq!(store.prompts(), before);
    }

    #[tokio::test]
    async fn test_startup_equal_counts_keep_local() {
        let store = local_store(3);
        let before = store.prompts();
        let remote = Arc::new(FakeRemote::with_document(remote_library(3, 0)));
        let sync = orchestrator(store.clone(), remote, Some("ghp_good"));

        assert_eq!(sync.startup_reconcile().await, StartupOutcome::KeptLocal);
        assert_eq!(store.prompts(), before);
    }

    #[tokio::test]
    async fn test_startup_empty_local_adopts_projects_only_remote() {
        let store = local_store(0);
        let remote = Arc::new(FakeRemote::with_document(remote_library(0, 2)));
        let sync = orchestrator(store.clone(), remote, Some("ghp_good"));

        assert_eq!(sync.startup_reconcile().await, StartupOutcome::Imported);
        assert_eq!(store.projects().len(), 2);
    }

    #[tokio::test]
    async fn test_startup_ignores_empty_remote() {
        let store = local_store(0);
        let remote = Arc::new(FakeRemote::with_document(remote_library(0, 0)));
        let sync = orchestrator(store.clone(), remote, Some("ghp_good"));

        assert_eq!(sync.startup_reconcile().await, StartupOutcome::NoRemoteData);
    }

    #[tokio::test]
    async fn test_startup_swallows_pull_failure() {
        let store = local_store(1);
        let before = store.prompts();
        let remote = Arc::new(FakeRemote {
            fail_pull: true,
            ..Default::default()
        });
        let sync = orchestrator(store.clone(), remote, Some("ghp_good"));
        let mut events = sync.events();

        assert_eq!(sync.startup_reconcile().await, StartupOutcome::Failed);
        assert_eq!(store.prompts(), before);
        assert_eq!(sync.state(), SyncState::Idle);
        assert!(matches!(
            events.try_recv().unwrap(),
            SyncEvent::PullFailed {
                category: "remote",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_startup_without_token_never_calls_remote() {
        let mut mock = MockRemoteStore::new();
        mock.expect_pull().times(0);
        let sync = orchestrator(local_store(0), Arc::new(mock), None);

        assert_eq!(sync.startup_reconcile().await, StartupOutcome::NotConfigured);
    }

    #[tokio::test]
    async fn test_startup_runs_once() {
        let mut mock = MockRemoteStore::new();
        mock.expect_pull().times(1).returning(|| Ok(None));
        let sync = orchestrator(local_store(0), Arc::new(mock), Some("ghp_good"));

        assert_eq!(sync.startup_reconcile().await, StartupOutcome::NoRemoteData);
        assert_eq!(sync.startup_reconcile().await, StartupOutcome::AlreadyRan);
    }

    // ========================================
    // Debounced auto-push
    // ========================================

    #[tokio::test(start_paused = true)]
    async fn test_rapid_mutations_push_once_with_latest_state() {
        let store = local_store(0);
        let remote = Arc::new(FakeRemote::default());
        let sync = orchestrator(store.clone(), remote.clone(), Some("ghp_good"));
        let watcher = sync.spawn_auto_push();

        for i in 0..5 {
            store.add_prompt(draft(&format!("burst {}", i)));
            tokio::task::yield_now().await;
            tokio::time::advance(Duration::from_millis(400)).await;
        }
        assert_eq!(remote.push_count(), 0);
        assert!(sync.has_pending_push());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(remote.push_count(), 1);
        assert_eq!(remote.last_push().prompts, store.prompts());
        assert_eq!(remote.last_push().prompts.len(), 5);
        assert!(!sync.has_pending_push());

        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_separated_mutations_push_separately() {
        let store = local_store(0);
        let remote = Arc::new(FakeRemote::default());
        let sync = orchestrator(store.clone(), remote.clone(), Some("ghp_good"));
        let watcher = sync.spawn_auto_push();

        store.add_prompt(draft("first"));
        tokio::time::sleep(Duration::from_secs(3)).await;
        store.add_prompt(draft("second"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(remote.push_count(), 2);
        assert_eq!(remote.last_push().prompts.len(), 2);
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_is_not_pushed() {
        let store = local_store(3);
        let remote = Arc::new(FakeRemote::default());
        let sync = orchestrator(store, remote.clone(), Some("ghp_good"));
        let watcher = sync.spawn_auto_push();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(remote.push_count(), 0);
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_push_without_token_is_skipped() {
        let store = local_store(0);
        let remote = Arc::new(FakeRemote::default());
        let sync = orchestrator(store.clone(), remote.clone(), None);
        let mut events = sync.events();
        let watcher = sync.spawn_auto_push();

        store.add_prompt(draft("offline"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(remote.push_count(), 0);
        assert_eq!(
            events.try_recv().unwrap(),
            SyncEvent::Skipped {
                reason: "not_configured"
            }
        );
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_push_failure_is_reported_not_raised() {
        let store = local_store(0);
        let remote = Arc::new(FakeRemote {
            fail_push: true,
            ..Default::default()
        });
        let sync = orchestrator(store.clone(), remote, Some("ghp_good"));
        let mut events = sync.events();
        let watcher = sync.spawn_auto_push();

        store.add_prompt(draft("doomed"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(matches!(
            events.try_recv().unwrap(),
            SyncEvent::PushFailed {
                category: "remote",
                ..
            }
        ));
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(store.prompts().len(), 1);
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_pushes_pending_immediately() {
        let store = local_store(0);
        let remote = Arc::new(FakeRemote::default());
        let sync = orchestrator(store.clone(), remote.clone(), Some("ghp_good"));
        let watcher = sync.spawn_auto_push();

        store.add_prompt(draft("unsaved"));
        tokio::task::yield_now().await;
        assert!(sync.has_pending_push());

        sync.flush().await;
        assert_eq!(remote.push_count(), 1);

        // The cancelled timer must not push again
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remote.push_count(), 1);
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_push_in_flight() {
        let store = local_store(0);
        let remote = Arc::new(FakeRemote {
            push_delay: Duration::from_secs(10),
            ..Default::default()
        });
        let sync = orchestrator(store.clone(), remote.clone(), Some("ghp_good"));
        let watcher = sync.spawn_auto_push();

        store.add_prompt(draft("slow"));
        // Timer fires and the push is now waiting on the remote
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!sync.has_pending_push());
        assert_eq!(sync.state(), SyncState::Pushing);
        assert_eq!(remote.push_count(), 0);

        watcher.abort();
        sync.flush().await;
        assert_eq!(remote.push_count(), 1);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    // ========================================
    // Manual operations
    // ========================================

    #[tokio::test]
    async fn test_manual_ops_require_verified_credential() {
        let mut mock = MockRemoteStore::new();
        mock.expect_push().times(0);
        mock.expect_pull().times(0);
        // A stored but unverified token is not enough
        let sync = orchestrator(local_store(1), Arc::new(mock), Some("ghp_unverified"));

        assert!(matches!(sync.manual_push().await, Err(LibraryError::NotConfigured)));
        assert!(matches!(sync.manual_pull().await, Err(LibraryError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_verify_stores_token() {
        let remote = Arc::new(FakeRemote::default());
        let creds = credentials(None);
        let sync = SyncOrchestrator::new(local_store(0), remote, creds.clone());

        assert!(!sync.verify_credential("ghp_bad").await.unwrap());
        assert!(creds.get().is_none());
        assert!(!sync.is_verified());

        assert!(sync.verify_credential("ghp_good").await.unwrap());
        assert_eq!(creds.get().as_deref(), Some("ghp_good"));
        assert!(sync.is_verified());

        sync.clear_credential().unwrap();
        assert!(creds.get().is_none());
        assert!(!sync.is_verified());
    }

    #[tokio::test]
    async fn test_manual_push_sends_current_snapshot() {
        let store = local_store(2);
        let mut mock = MockRemoteStore::new();
        mock.expect_verify_credential().returning(|_| true);
        mock.expect_push()
            .withf(|data: &AppData| data.prompts.len() == 2 && data.version == "1.0.0")
            .times(1)
            .returning(|_| Ok(()));
        let sync = orchestrator(store, Arc::new(mock), None);

        assert!(sync.verify_credential("ghp_any").await.unwrap());
        assert_eq!(sync.manual_push().await.unwrap(), (2, 0));
    }

    #[tokio::test]
    async fn test_manual_push_propagates_conflict() {
        let mut mock = MockRemoteStore::new();
        mock.expect_verify_credential().returning(|_| true);
        mock.expect_push()
            .times(1)
            .returning(|_| Err(LibraryError::remote(409, "does not match")));
        let sync = orchestrator(local_store(1), Arc::new(mock), None);
        sync.verify_credential("ghp_any").await.unwrap();

        match sync.manual_push().await {
            Err(LibraryError::Remote { status, .. }) => assert_eq!(status, Some(409)),
            other => panic!("Expected Remote error, got {:?}", other),
        }
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_manual_pull_replaces_local() {
        let store = local_store(4);
        let remote_data = remote_library(1, 1);
        let remote = Arc::new(FakeRemote::with_document(remote_data.clone()));
        let sync = orchestrator(store.clone(), remote, None);
        sync.verify_credential("ghp_good").await.unwrap();

        let outcome = sync.manual_pull().await.unwrap();
        assert_eq!(
            outcome,
            PullOutcome::Imported {
                prompts:  1,
                projects: 1,
            }
        );
        assert_eq!(store.prompts(), remote_data.prompts);
    }

    #[tokio::test]
    async fn test_manual_pull_without_remote_document() {
        let store = local_store(2);
        let before = store.prompts();
        let remote = Arc::new(FakeRemote::default());
        let sync = orchestrator(store.clone(), remote, None);
        sync.verify_credential("ghp_good").await.unwrap();

        assert_eq!(sync.manual_pull().await.unwrap(), PullOutcome::NoRemoteData);
        assert_eq!(store.prompts(), before);
    }

    #[tokio::test]
    async fn test_manual_pull_surfaces_auth_error() {
        let mut mock = MockRemoteStore::new();
        mock.expect_verify_credential().returning(|_| true);
        mock.expect_pull()
            .returning(|| Err(LibraryError::Auth("Bad credentials".to_string())));
        let store = local_store(1);
        let before = store.prompts();
        let sync = orchestrator(store.clone(), Arc::new(mock), None);
        sync.verify_credential("ghp_any").await.unwrap();

        assert!(matches!(sync.manual_pull().await, Err(LibraryError::Auth(_))));
        assert_eq!(store.prompts(), before);
    }
}
