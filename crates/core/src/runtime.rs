//! Shared Tokio runtime for the synchronous command surface
//!
//! Command handlers are plain functions. The ones that reach GitHub drive
//! their futures through [`block_on`]. Background sync started inside
//! `block_on(library.start())` is spawned onto this runtime too, so the
//! auto-push watcher and debounce timers keep running between commands.

use std::future::Future;

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};

const WORKER_THREADS: usize = 2;

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .thread_name("prompt-library-sync")
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime")
});

/// Drive `future` to completion on the shared runtime
///
/// Blocks the calling thread. Must not be called from inside an async
/// context.
pub fn block_on<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(future)
}
