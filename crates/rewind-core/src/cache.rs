//! Single-flight, lazily loaded snapshot of a remote dataset.
//!
//! A [`SharedCache`] owns at most one immutable snapshot and at most one
//! in-flight load. Concurrent readers collapse onto the same load, a refresh
//! cancels the load it supersedes, and only the most recently *started* load
//! may install its result.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::{debug, error, info};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fetches a fresh value for a [`SharedCache`].
#[async_trait]
pub trait Loader<T>: Send + Sync {
    type Error: std::error::Error + Clone + Send + Sync + 'static;

    /// Name used in log lines and cancellation errors.
    fn name(&self) -> &'static str;

    /// Load a new value. `previous` is the snapshot installed when the load
    /// started, if any. Implementations should stop early once `cancel`
    /// fires; the cache discards their result either way.
    async fn load(
        &self,
        cancel: CancellationToken,
        previous: Option<Arc<T>>,
    ) -> Result<T, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError<E> {
    #[error("cache has been disposed")]
    Disposed,
    #[error("{name} load was superseded or cancelled")]
    Cancelled { name: &'static str },
    #[error(transparent)]
    Load(E),
}

type SharedLoad<T, E> = Shared<BoxFuture<'static, Result<Arc<T>, CacheError<E>>>>;

struct InFlight<T, E> {
    seq: u64,
    cancel: CancellationToken,
    future: SharedLoad<T, E>,
}

struct State<T, E> {
    data: Option<Arc<T>>,
    in_flight: Option<InFlight<T, E>>,
    request_seq: u64,
    disposed: bool,
}

pub struct SharedCache<T, E> {
    loader: Arc<dyn Loader<T, Error = E>>,
    state: Mutex<State<T, E>>,
}

impl<T, E> SharedCache<T, E>
where
    T: Send + Sync + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    pub fn new(loader: impl Loader<T, Error = E> + 'static) -> Self {
        Self::from_arc(Arc::new(loader))
    }

    pub fn from_arc(loader: Arc<dyn Loader<T, Error = E>>) -> Self {
        Self {
            loader,
            state: Mutex::new(State {
                data: None,
                in_flight: None,
                request_seq: 0,
                disposed: false,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.loader.name()
    }

    /// Return the current snapshot, joining or starting a load when there is
    /// none. With `refresh` a new load is always started and any load it
    /// supersedes is cancelled.
    ///
    /// # Errors
    /// Returns [`CacheError::Disposed`] after [`dispose`](Self::dispose),
    /// [`CacheError::Cancelled`] when the awaited load was superseded, and
    /// [`CacheError::Load`] when the loader failed.
    pub async fn get_or_load(&self, refresh: bool) -> Result<Arc<T>, CacheError<E>> {
        let mut superseded = None;
        let (seq, future) = {
            let mut state = self.lock();
            if state.disposed {
                return Err(CacheError::Disposed);
            }

            let joinable = if refresh {
                None
            } else if let Some(data) = &state.data {
                return Ok(Arc::clone(data));
            } else {
                state
                    .in_flight
                    .as_ref()
                    .map(|in_flight| (in_flight.seq, in_flight.future.clone()))
            };

            if let Some(joined) = joinable {
                debug!("Joining in-flight {} load #{}", self.name(), joined.0);
                joined
            } else {
                state.request_seq += 1;
                let seq = state.request_seq;
                let cancel = CancellationToken::new();
                let future = self.start_load(cancel.clone(), state.data.clone());
                superseded = state
                    .in_flight
                    .replace(InFlight {
                        seq,
                        cancel,
                        future: future.clone(),
                    })
                    .map(|old| old.cancel);
                debug!("Started {} load #{seq}", self.name());
                (seq, future)
            }
        };

        if let Some(cancel) = superseded {
            cancel.cancel();
        }

        let result = future.await;

        let mut state = self.lock();
        if state.disposed {
            return result;
        }

        // Every waiter of the latest load lands here with the same result, so
        // installing it more than once is harmless.
        if seq != state.request_seq {
            debug!(
                "Discarding stale {} load: request_seq={seq} current_seq={}",
                self.name(),
                state.request_seq
            );
            return result;
        }

        state.in_flight = None;
        if let Ok(data) = &result {
            state.data = Some(Arc::clone(data));
        }
        result
    }

    /// Start a new load unconditionally and return its result.
    ///
    /// # Errors
    /// See [`get_or_load`](Self::get_or_load).
    pub async fn refresh(&self) -> Result<Arc<T>, CacheError<E>> {
        self.get_or_load(true).await
    }

    /// Current snapshot without triggering a load.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<T>> {
        self.lock().data.clone()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Tear the cache down: cancel any in-flight load, drop the snapshot and
    /// fail every later call. Calling it again does nothing.
    pub fn dispose(&self) {
        let cancel = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.data = None;
            state.in_flight.take().map(|in_flight| in_flight.cancel)
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        debug!("Disposed {} cache", self.name());
    }

    fn start_load(&self, cancel: CancellationToken, previous: Option<Arc<T>>) -> SharedLoad<T, E> {
        let loader = Arc::clone(&self.loader);
        async move {
            let name = loader.name();
            tokio::select! {
                () = cancel.cancelled() => Err(CacheError::Cancelled { name }),
                result = loader.load(cancel.clone(), previous) => {
                    result.map(Arc::new).map_err(CacheError::Load)
                }
            }
        }
        .boxed()
        .shared()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> SharedCache<T, E>
where
    T: Send + Sync + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    /// Kick off a background load so the first reader does not wait for the
    /// network. Failures are only logged.
    pub fn init(self: &Arc<Self>) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            match cache.refresh().await {
                Ok(_) => info!("Initial {} load finished", cache.name()),
                Err(CacheError::Cancelled { .. } | CacheError::Disposed) => {}
                Err(error) => error!("Initial load failed for {}: {error}", cache.name()),
            }
        });
    }
}
