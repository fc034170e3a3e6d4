//! Memoize-on-first-call guard for one-time initialisation.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

enum GateState<T> {
    NotStarted,
    InProgress(Shared<BoxFuture<'static, T>>),
    Done(T),
}

/// Runs an initialiser at most once; every caller receives its outcome.
///
/// Callers arriving while the initialiser is in flight await the same run
/// instead of starting their own. Once it finishes, the outcome is cached and
/// returned without suspending.
pub struct InitGate<T> {
    state: Arc<Mutex<GateState<T>>>,
}

impl<T> InitGate<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Construct a gate that has not run yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState::NotStarted)),
        }
    }

    /// Run `init` if no call has started it yet, otherwise await the run
    /// already recorded. `init` is dropped unexecuted on every call but the first.
    pub async fn run<F, Fut>(&self, init: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let pending = {
            let mut state = lock(&self.state);
            match &*state {
                GateState::Done(outcome) => return outcome.clone(),
                GateState::InProgress(pending) => pending.clone(),
                GateState::NotStarted => {
                    let pending = complete_into(Arc::downgrade(&self.state), init());
                    *state = GateState::InProgress(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Cached outcome, `None` until the first run has finished.
    #[must_use]
    pub fn outcome(&self) -> Option<T> {
        match &*lock(&self.state) {
            GateState::Done(outcome) => Some(outcome.clone()),
            GateState::NotStarted | GateState::InProgress(_) => None,
        }
    }

    /// Whether a run has been started (finished or not).
    #[must_use]
    pub fn is_started(&self) -> bool {
        !matches!(&*lock(&self.state), GateState::NotStarted)
    }
}

impl<T> Default for InitGate<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn complete_into<T, Fut>(slot: Weak<Mutex<GateState<T>>>, init: Fut) -> Shared<BoxFuture<'static, T>>
where
    T: Clone + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    async move {
        let outcome = init.await;
        if let Some(state) = slot.upgrade() {
            *lock(&state) = GateState::Done(outcome.clone());
        }
        outcome
    }
    .boxed()
    .shared()
}

fn lock<T>(state: &Mutex<GateState<T>>) -> MutexGuard<'_, GateState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
