//! TTL Cell Module
//!
//! A single-slot async cache: one value, an expiry, a validator and a fetch
//! closure. Concurrent readers are coalesced onto one in-flight fetch.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::freshness::{evaluate, Expiry, Freshness};
use crate::cache::Truthy;
use crate::config::CellConfig;
use crate::error::{CacheError, Result};

/// Boxed future returned by a fetch closure.
pub type FetchFuture<T> = BoxFuture<'static, Result<T>>;

type FetchFn<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;
type Validator<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type InFlight<T> = Shared<BoxFuture<'static, FetchOutcome<T>>>;

/// What a completed fetch did to the cell.
#[derive(Debug, Clone)]
enum FetchOutcome<T> {
    /// The value passed validation and is now cached
    Updated(T),
    /// The value failed validation; carries the value still cached, if any
    Rejected(Option<T>),
    /// The fetch itself failed
    Failed(CacheError),
}

struct CellState<T> {
    data: Option<T>,
    expiry: Expiry,
    in_flight: Option<InFlight<T>>,
}

impl<T> CellState<T> {
    fn store(&mut self, value: T, config: &CellConfig) {
        self.data = Some(value);
        self.expiry = Expiry::after(Instant::now(), config.max_age);
    }
}

struct CellInner<T> {
    config: CellConfig,
    fetch: FetchFn<T>,
    validator: Validator<T>,
    state: Mutex<CellState<T>>,
}

impl<T> CellInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, CellState<T>> {
        // The lock is never held across user code, so a poisoned guard still
        // holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs the validator, turning a panic into a fetch failure.
    fn validate(&self, value: &T) -> Result<bool> {
        catch_unwind(AssertUnwindSafe(|| (self.validator)(value))).map_err(|panic| {
            CacheError::fetch(anyhow::anyhow!(
                "validator panicked: {}",
                panic_message(panic.as_ref())
            ))
        })
    }

    /// Returns the pending fetch, starting one if none is running.
    fn start_fetch(self: &Arc<Self>, state: &mut CellState<T>) -> InFlight<T> {
        if let Some(pending) = &state.in_flight {
            debug!("Joining in-flight fetch");
            return pending.clone();
        }

        debug!("Starting fetch");
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(async { (inner.fetch)().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(CacheError::fetch(anyhow::anyhow!(
                        "fetch panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });
            inner.complete_fetch(result)
        });

        let pending = async move {
            handle.await.unwrap_or_else(|err| {
                FetchOutcome::Failed(CacheError::Internal(format!("fetch task aborted: {}", err)))
            })
        }
        .boxed()
        .shared();

        state.in_flight = Some(pending.clone());
        pending
    }

    fn complete_fetch(&self, result: Result<T>) -> FetchOutcome<T> {
        let verdict = result.and_then(|value| self.validate(&value).map(|valid| (value, valid)));

        let mut state = self.lock();
        state.in_flight = None;

        match verdict {
            Ok((value, true)) => {
                state.store(value.clone(), &self.config);
                debug!("Fetch completed, value cached");
                FetchOutcome::Updated(value)
            }
            Ok((_, false)) => {
                warn!(
                    retained = state.data.is_some(),
                    "Fetched value failed validation, keeping previous value"
                );
                FetchOutcome::Rejected(state.data.clone())
            }
            Err(err) => {
                warn!(error = %err, "Fetch failed, keeping previous value");
                FetchOutcome::Failed(err)
            }
        }
    }
}

// == TTL Cell ==
/// A time-bounded, single-flight async cache slot.
///
/// Cloning a cell clones the handle; all clones share one slot. Fetches run
/// on spawned tokio tasks, so a cell must be created inside a tokio runtime.
pub struct TtlCell<T> {
    inner: Arc<CellInner<T>>,
}

impl<T> Clone for TtlCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> TtlCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a cell using the default `Truthy` validator and no preload.
    pub fn new<F, Fut>(config: CellConfig, fetch: F) -> Self
    where
        T: Truthy,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        TtlCellBuilder::new(config, fetch).build()
    }

    // == Get Data ==
    /// Returns the cached value, fetching when the freshness rule demands.
    ///
    /// A servable value is returned immediately even when a background
    /// refresh is started. Otherwise the call waits for the (possibly shared)
    /// fetch. A fetch whose value fails validation yields the previously
    /// cached value, or `CacheError::InvalidFetchResult` when there is none.
    pub async fn get_data(&self) -> Result<T> {
        self.read(None).await
    }

    /// Like [`get_data`](Self::get_data), calling `on_refreshed` with the new
    /// value once a background refresh started by this call succeeds.
    pub async fn get_data_with<F>(&self, on_refreshed: F) -> Result<T>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.read(Some(Box::new(on_refreshed))).await
    }

    async fn read(&self, on_refreshed: Option<Box<dyn FnOnce(T) + Send>>) -> Result<T> {
        let pending = {
            let mut state = self.inner.lock();
            let freshness = evaluate(
                &self.inner.config,
                state.expiry,
                state.data.is_some(),
                Instant::now(),
            );

            match state.data.clone() {
                Some(data) if freshness.is_servable() => {
                    if freshness.needs_fetch() {
                        debug!(?freshness, "Serving cached value while refreshing");
                        let pending = self.inner.start_fetch(&mut state);
                        if let Some(callback) = on_refreshed {
                            tokio::spawn(async move {
                                if let FetchOutcome::Updated(value) = pending.await {
                                    callback(value);
                                }
                            });
                        }
                    }
                    return Ok(data);
                }
                _ => self.inner.start_fetch(&mut state),
            }
        };

        match pending.await {
            FetchOutcome::Updated(value) | FetchOutcome::Rejected(Some(value)) => Ok(value),
            FetchOutcome::Rejected(None) => Err(CacheError::InvalidFetchResult),
            FetchOutcome::Failed(err) => Err(err),
        }
    }

    // == Update ==
    /// Stores `value` and restarts the expiry if it passes validation.
    ///
    /// Returns false and leaves the cell untouched otherwise.
    pub fn update(&self, value: T) -> bool {
        match self.inner.validate(&value) {
            Ok(true) => {
                self.inner.lock().store(value, &self.inner.config);
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!(error = %err, "Rejecting update");
                false
            }
        }
    }

    /// Restarts the expiry without touching the value.
    ///
    /// Does nothing while the cell holds no value.
    pub fn refresh_expiry(&self) {
        let mut state = self.inner.lock();
        if state.data.is_some() {
            state.expiry = Expiry::after(Instant::now(), self.inner.config.max_age);
        }
    }

    /// Forces the next read to wait for a fresh fetch. The value is kept.
    pub fn invalidate(&self) {
        let mut state = self.inner.lock();
        if state.expiry.is_set() {
            state.expiry = Expiry::Lapsed;
        }
    }

    /// True once any value has been accepted.
    pub fn loaded(&self) -> bool {
        self.inner.lock().expiry.is_set()
    }

    /// Returns the cached value without consulting freshness or fetching.
    pub fn peek(&self) -> Option<T> {
        self.inner.lock().data.clone()
    }

    /// Current freshness decision, for inspection.
    pub fn freshness(&self) -> Freshness {
        let state = self.inner.lock();
        evaluate(
            &self.inner.config,
            state.expiry,
            state.data.is_some(),
            Instant::now(),
        )
    }

    // == Inspection ==
    /// True while a fetch is outstanding for this cell.
    pub fn is_fetching(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    /// Freshness settings the cell was built with.
    pub fn config(&self) -> &CellConfig {
        &self.inner.config
    }
}

impl<T> fmt::Debug for TtlCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("TtlCell")
            .field("config", &self.inner.config)
            .field("has_data", &state.data.is_some())
            .field("expiry", &state.expiry)
            .field("fetching", &state.in_flight.is_some())
            .finish()
    }
}

// == Builder ==
/// Builds a [`TtlCell`] with an optional validator and preloaded value.
pub struct TtlCellBuilder<T> {
    config: CellConfig,
    fetch: FetchFn<T>,
    validator: Validator<T>,
    preload: Option<T>,
}

impl<T> TtlCellBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts a builder validating with [`Truthy`].
    pub fn new<F, Fut>(config: CellConfig, fetch: F) -> Self
    where
        T: Truthy,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::with_validator(config, fetch, T::is_truthy)
    }

    /// Starts a builder for values without a default notion of validity.
    pub fn with_validator<F, Fut, V>(config: CellConfig, fetch: F, validator: V) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        V: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            config,
            fetch: Arc::new(move || fetch().boxed()),
            validator: Arc::new(validator),
            preload: None,
        }
    }

    pub fn validator<V>(mut self, validator: V) -> Self
    where
        V: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.validator = Arc::new(validator);
        self
    }

    /// Seeds the cell. An invalid seed is dropped and a fetch starts instead.
    pub fn preload(mut self, value: T) -> Self {
        self.preload = Some(value);
        self
    }

    /// Creates the cell, starting a fetch right away unless a valid value
    /// was preloaded.
    pub fn build(self) -> TtlCell<T> {
        let inner = Arc::new(CellInner {
            config: self.config,
            fetch: self.fetch,
            validator: self.validator,
            state: Mutex::new(CellState {
                data: None,
                expiry: Expiry::Unset,
                in_flight: None,
            }),
        });

        if let Some(value) = self.preload {
            if matches!(inner.validate(&value), Ok(true)) {
                inner.lock().store(value, &inner.config);
            } else {
                debug!("Discarding invalid preloaded value");
            }
        }

        {
            let mut state = inner.lock();
            if !state.expiry.is_set() {
                // Fire and forget: readers join this fetch later.
                let _ = inner.start_fetch(&mut state);
            }
        }

        TtlCell { inner }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}
