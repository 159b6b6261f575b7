//! Async request state with last-request-wins semantics.
//!
//! Every call to [`RequestCoordinator::request`] or [`RequestCoordinator::run`]
//! takes a new generation. Only the newest generation may settle the state; an
//! older in-flight future is dropped as soon as it is superseded, so a slow
//! response can never overwrite a newer one.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tracing::debug;

/// Observable state of a fetch-shaped operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T, E> {
    /// Last successful value, or the caller's default.
    pub result: T,
    /// True only while the newest request is in flight.
    pub is_loading: bool,
    /// Error raised by the newest settled request.
    pub error: Option<E>,
    /// Generation of the newest request (or cancellation).
    pub generation: u64,
}

/// How a single invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The value replaced `result`.
    Succeeded,
    /// The error was recorded; `result` was kept.
    Failed,
    /// A newer request or a cancellation took over; nothing was recorded.
    Superseded,
}

/// Stored fetcher invoked by [`RequestCoordinator::request`].
pub type Fetcher<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Tracks loading, error and result for a repeatable async call.
pub struct RequestCoordinator<T, E> {
    fetcher: Fetcher<T, E>,
    state: Arc<watch::Sender<RequestState<T, E>>>,
}

impl<T, E> Clone for RequestCoordinator<T, E> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, E> RequestCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a coordinator around `fetcher`, starting from `default`.
    pub fn new<F, Fut>(fetcher: F, default: T) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let fetcher: Fetcher<T, E> = Arc::new(move || fetcher().boxed());
        let (state, _) = watch::channel(RequestState {
            result: default,
            is_loading: false,
            error: None,
            generation: 0,
        });
        Self {
            fetcher,
            state: Arc::new(state),
        }
    }

    /// Invoke the stored fetcher.
    pub async fn request(&self) -> Settlement {
        let future = (self.fetcher)();
        self.run(future).await
    }

    /// Track an ad-hoc future (for calls that need arguments) as a new request.
    pub async fn run<F>(&self, future: F) -> Settlement
    where
        F: Future<Output = Result<T, E>>,
    {
        let generation = self.begin();
        let mut in_flight = InFlight {
            state: &self.state,
            generation: Some(generation),
        };
        let mut watcher = self.state.subscribe();
        let outcome = tokio::select! {
            outcome = future => Some(outcome),
            () = superseded(&mut watcher, generation) => None,
        };
        in_flight.generation.take();
        match outcome {
            Some(outcome) => self.settle(generation, outcome),
            None => {
                debug!(generation, "request superseded before completion");
                Settlement::Superseded
            }
        }
    }

    /// Replace `result` locally without a round trip.
    pub fn set_value(&self, value: T) {
        self.state.send_modify(|state| state.result = value);
    }

    /// Mutate `result` in place without a round trip.
    pub fn update_value(&self, update: impl FnOnce(&mut T)) {
        self.state.send_modify(|state| update(&mut state.result));
    }

    /// Clear the recorded error, keeping `result`.
    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|state| state.error.take().is_some());
    }

    /// Supersede whatever is in flight and stop loading.
    pub fn cancel(&self) {
        self.state.send_modify(|state| {
            state.generation += 1;
            state.is_loading = false;
        });
        debug!("request cancelled");
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> RequestState<T, E> {
        self.state.borrow().clone()
    }

    /// Watch every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T, E>> {
        self.state.subscribe()
    }

    /// Current `result`.
    #[must_use]
    pub fn result(&self) -> T {
        self.state.borrow().result.clone()
    }

    /// Whether the newest request is still in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Error of the newest settled request.
    #[must_use]
    pub fn error(&self) -> Option<E> {
        self.state.borrow().error.clone()
    }

    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.is_loading = true;
            generation = state.generation;
        });
        debug!(generation, "request started");
        generation
    }

    fn settle(&self, generation: u64, outcome: Result<T, E>) -> Settlement {
        let mut settlement = Settlement::Superseded;
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.is_loading = false;
            match outcome {
                Ok(value) => {
                    state.result = value;
                    state.error = None;
                    settlement = Settlement::Succeeded;
                }
                Err(error) => {
                    state.error = Some(error);
                    settlement = Settlement::Failed;
                }
            }
            true
        });
        if settlement == Settlement::Superseded {
            debug!(generation, "stale response discarded");
        }
        settlement
    }
}

/// Clears `is_loading` when a [`RequestCoordinator::run`] future is dropped
/// before it settles.
struct InFlight<'a, T, E> {
    state: &'a watch::Sender<RequestState<T, E>>,
    generation: Option<u64>,
}

impl<T, E> Drop for InFlight<'_, T, E> {
    fn drop(&mut self) {
        let Some(generation) = self.generation else {
            return;
        };
        let cleared = self.state.send_if_modified(|state| {
            if state.generation != generation || !state.is_loading {
                return false;
            }
            state.is_loading = false;
            true
        });
        if cleared {
            debug!(generation, "request dropped before completion");
        }
    }
}

async fn superseded<T, E>(watcher: &mut watch::Receiver<RequestState<T, E>>, generation: u64) {
    let changed = watcher
        .wait_for(|state| state.generation != generation)
        .await
        .map(|_| ());
    if changed.is_err() {
        std::future::pending::<()>().await;
    }
}
