//! Leading-edge throttle without trailing invocation.
//!
//! The first call in a window runs the task; calls that land inside the same
//! window do not queue or retry, they await the run that already happened (or
//! is still in flight) and share its outcome.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::trace;

/// Handle to a throttled run; every clone resolves once the run completes.
pub type ThrottledRun = Shared<BoxFuture<'static, ()>>;

struct Execution {
    started: Instant,
    run: ThrottledRun,
}

/// Timestamp-gated guard admitting at most one execution per window.
pub struct Throttle {
    window: Duration,
    last: Mutex<Option<Execution>>,
}

impl Throttle {
    /// Construct a throttle with the given window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Run `task` unless a run already started within the window, in which
    /// case the existing run is returned and `task` is dropped unexecuted.
    pub fn run<F, Fut>(&self, task: F) -> ThrottledRun
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        let mut last = self.lock();

        if let Some(execution) = last.as_ref() {
            if now.saturating_duration_since(execution.started) < self.window {
                trace!("throttled call joins the run from this window");
                return execution.run.clone();
            }
        }

        let run = task().boxed().shared();
        *last = Some(Execution {
            started: now,
            run: run.clone(),
        });
        run
    }

    /// Forget the last execution so the next call runs immediately.
    pub fn reset(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Execution>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
