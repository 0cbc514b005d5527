//! Cancellable background tasks
//!
//! [`schedule`] runs a task repeatedly with a fixed delay measured from the
//! end of the previous run. Both it and [`CancelToken::spawn`] hand back a
//! [`CancelToken`] that owns the spawned task. Dropping the token leaves the
//! task running; call [`CancelToken::cancel`] to stop it.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a spawned task
#[derive(Debug)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl CancelToken {
    /// Spawn `future` on the current tokio runtime
    pub fn spawn<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            handle: tokio::spawn(future),
        }
    }

    /// Stop the task; an in-flight run is dropped at its next await point
    ///
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True while the task has neither been cancelled nor run to completion
    pub fn is_active(&self) -> bool {
        !self.is_cancelled() && !self.handle.is_finished()
    }
}

/// Run `task` every `delay` until it breaks or the token is cancelled
///
/// The first run happens one `delay` after scheduling, and each following
/// run one `delay` after the previous one finished, so runs never overlap.
pub fn schedule<F, Fut>(delay: Duration, mut task: F) -> CancelToken
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);

    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(delay).await;
            if flag.load(Ordering::SeqCst) {
                break;
            }
            if task().await.is_break() {
                debug!("Scheduled task finished");
                break;
            }
        }
    });

    CancelToken { cancelled, handle }
}
