//! src/tasks/scope.rs
//! ============================================================================
//! # `TaskScope`: component-lifetime ownership of async work
//!
//! Every pipeline a component starts (loads, refresh timers) is spawned through
//! its scope. Each task races a child of the scope's cancellation token, so
//! tearing the scope down, or dropping it, stops all pending work. Tasks that
//! lose the race resolve to `None` and never touch state afterwards.

use std::future::Future;

use compact_str::CompactString;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

#[derive(Debug)]
pub struct TaskScope {
    name: CompactString,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
}

impl TaskScope {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            cancel_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// A scope whose cancellation follows `parent`.
    pub fn child_of(parent: &Self, name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            cancel_token: parent.cancel_token.child_token(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Spawn `fut` under this scope. Resolves to `None` when cancelled first.
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let token = self.cancel_token.child_token();
        let scope = self.name.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(
                        marker = "TASK_CANCELLED",
                        operation_type = "task_scope",
                        scope = %scope,
                        "Scoped task cancelled"
                    );
                    None
                }
                out = fut => Some(out),
            }
        })
    }

    /// Cancel everything and wait for all tasks to observe it.
    pub async fn teardown(&self) {
        info!(
            marker = "SCOPE_TEARDOWN",
            operation_type = "task_scope",
            scope = %self.name,
            pending = self.tracker.len(),
            "Tearing down task scope"
        );
        self.cancel_token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
