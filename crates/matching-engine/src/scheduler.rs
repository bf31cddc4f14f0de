//! Cancelable delayed tasks
//!
//! A page context schedules its pending-match recheck with
//! [`schedule_after`] and holds the returned [`ScheduledTask`]. Dropping or
//! cancelling the handle guarantees the task never runs against a torn-down
//! context.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to a task scheduled with [`schedule_after`]
///
/// Cancels the task when dropped.
#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<Option<()>>,
}

impl ScheduledTask {
    /// Stop the task if it has not finished; cancels an in-progress body too
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("Scheduled task cancelled");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end. True when the body ran to completion.
    pub async fn join(&mut self) -> bool {
        matches!((&mut self.handle).await, Ok(Some(())))
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Run `task` after `delay` on the tokio runtime unless cancelled first
pub fn schedule_after<F>(delay: Duration, task: F) -> ScheduledTask
where
    F: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let handle = tokio::spawn(run_until_cancelled(token.clone(), async move {
        tokio::time::sleep(delay).await;
        task.await;
    }));

    ScheduledTask { token, handle }
}

/// Run a future until the token is cancelled
///
/// Returns `Some(result)` if the future completed, `None` if cancellation won.
pub async fn run_until_cancelled<F, T>(token: CancellationToken, future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        _ = token.cancelled() => None,
        result = future => Some(result),
    }
}
