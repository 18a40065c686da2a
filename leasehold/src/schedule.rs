use futures::future::BoxFuture;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Runs tasks after a delay on the runtime the elector was created in.
#[derive(Debug, Clone)]
pub struct Scheduler {
    runtime: Handle,
}

impl Scheduler {
    /// Binds to the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`](crate::Error::NoRuntime) outside a runtime.
    pub fn current() -> crate::Result<Self> {
        Handle::try_current()
            .map(|runtime| Self { runtime })
            .map_err(|_| crate::Error::NoRuntime)
    }

    /// Runs `task` once `delay` has elapsed.
    pub fn submit(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TaskHandle {
        let join = self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        });
        TaskHandle {
            abort: join.abort_handle(),
        }
    }
}

/// Cancels a submitted task that has not finished yet.
#[derive(Debug)]
pub struct TaskHandle {
    abort: AbortHandle,
}

impl TaskHandle {
    pub fn cancel(self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}
