//! Async utilities and patterns
//!
//! Provides cancellable delayed tasks and timeout handling for authentication round trips

use crate::error::AuthError;
use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tracing::debug;

/// Timeout wrapper for an authentication round trip
pub async fn with_timeout<F, T>(
    future: F,
    timeout_ms: u64,
    operation_name: &str,
) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => result,
        Err(_) => {
            debug!(
                operation = operation_name,
                timeout_ms = timeout_ms,
                "Operation timed out"
            );
            Err(AuthError::Timeout {
                duration_ms: timeout_ms,
            })
        }
    }
}

/// A callback scheduled to run once after a delay.
///
/// Cancelling, or dropping the handle, before the delay elapses guarantees the
/// callback never starts. Once started it runs to completion.
#[derive(Debug)]
pub struct ScheduledTask {
    cancel_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    delay: Duration,
}

impl ScheduledTask {
    /// Spawn `task` on the current tokio runtime, to run after `delay`
    pub fn after<F, Fut>(delay: Duration, task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => task().await,
                _ = &mut cancel_rx => {
                    debug!(delay_ms = delay.as_millis() as u64, "Scheduled task cancelled");
                }
            }
        });

        Self {
            cancel_tx: Some(cancel_tx),
            handle,
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(mut self) {
        self.signal_cancel();
    }

    fn signal_cancel(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.signal_cancel();
    }
}
