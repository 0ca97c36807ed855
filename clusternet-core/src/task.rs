//! Task spawning abstraction.

use std::future::Future;

/// Provider for spawning background tasks.
///
/// Dispatch state machines run as spawned tasks, so implementations must
/// accept `Send` futures and may run them on any worker thread.
pub trait TaskProvider: Clone + Send + Sync + 'static {
    /// Spawn a named task.
    ///
    /// The name is only used for diagnostics.
    fn spawn_task<F>(&self, name: &str, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Tokio-based task provider using `tokio::spawn`.
#[derive(Clone, Debug, Default)]
pub struct TokioTaskProvider;

impl TaskProvider for TokioTaskProvider {
    fn spawn_task<F>(&self, name: &str, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_name = name.to_string();
        tokio::spawn(async move {
            tracing::trace!("Task {} starting", task_name);
            future.await;
            tracing::trace!("Task {} completed", task_name);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawned_task_runs_to_completion() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = TokioTaskProvider.spawn_task("test_task", async move {
            let _ = tx.send(42u32);
        });

        handle.await.expect("task should not panic");
        assert_eq!(rx.await.expect("value should be sent"), 42);
    }
}
