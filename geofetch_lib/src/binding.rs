//! Consumer bindings over the TTL cache.
//!
//! A [`DataBinding`] ties one endpoint request to a shared [`MemoryCache`]
//! and a [`Fetcher`]. It serves fresh cached values without I/O, refreshes
//! stale ones in the background on focus, and makes sure only the most
//! recently started fetch is ever applied.
//!
//! Consumers either poll [`DataBinding::snapshot`] or watch
//! [`DataBinding::changes`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::MemoryCache;
use crate::error::FetchError;
use crate::key::{CacheKey, EndpointRequest};
use crate::scope::Scope;

/// Asynchronous data source behind a binding.
///
/// Implementations only report success or failure; cancellation is handled
/// by the binding dropping the returned future.
pub trait Fetcher: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn fetch(
        &self,
        request: &EndpointRequest,
    ) -> impl Future<Output = Result<Self::Output, FetchError>> + Send;
}

impl Fetcher for geofetch_api::JsonClient {
    type Output = serde_json::Value;

    fn fetch(
        &self,
        request: &EndpointRequest,
    ) -> impl Future<Output = Result<Self::Output, FetchError>> + Send {
        async move {
            self.get_json(&request.endpoint, &request.params)
                .await
                .map_err(FetchError::from)
        }
    }
}

/// Revalidation policy for one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingOptions {
    /// Lifetime of values this binding writes into the cache.
    pub ttl: Duration,
    /// Age after which a focus signal triggers a background refresh.
    /// Never larger than `ttl`.
    pub stale_time: Duration,
    pub refetch_on_focus: bool,
    pub refetch_on_mount: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            stale_time: Duration::from_secs(60),
            refetch_on_focus: true,
            refetch_on_mount: true,
        }
    }
}

impl BindingOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_refetch_on_focus(mut self, enabled: bool) -> Self {
        self.refetch_on_focus = enabled;
        self
    }

    pub fn with_refetch_on_mount(mut self, enabled: bool) -> Self {
        self.refetch_on_mount = enabled;
        self
    }

    fn normalized(mut self) -> Self {
        self.stale_time = self.stale_time.min(self.ttl);
        self
    }
}

/// What the consumer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingSnapshot<V> {
    pub data: Option<V>,
    pub loading: bool,
    pub error: Option<FetchError>,
    /// `data` came straight from the cache rather than from a fetch made by this binding.
    pub cached: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl<V> Default for BindingSnapshot<V> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            cached: false,
            last_updated: None,
        }
    }
}

/// Result of one binding operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A fetch completed and its value was stored and applied.
    Applied,
    /// A fresh cached value was served; no fetch was made.
    FromCache,
    /// A fetch failed. Previously cached data is untouched.
    Failed(FetchError),
    /// The fetch was superseded or its scope ended. Nothing was written.
    Ignored,
    /// Policy said not to fetch.
    Skipped,
}

/// Shared cache plus data source: the composition-root object consumers bind through.
pub struct DataCache<F: Fetcher> {
    store: Arc<MemoryCache<F::Output>>,
    fetcher: Arc<F>,
}

impl<F: Fetcher> Clone for DataCache<F> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

impl<F: Fetcher> DataCache<F> {
    pub fn new(store: Arc<MemoryCache<F::Output>>, fetcher: F) -> Self {
        Self {
            store,
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn store(&self) -> &Arc<MemoryCache<F::Output>> {
        &self.store
    }

    /// Creates a binding for `request`. Nothing is fetched until [`DataBinding::mount`].
    pub fn bind(
        &self,
        request: EndpointRequest,
        options: BindingOptions,
        scope: Scope,
    ) -> DataBinding<F> {
        DataBinding::new(
            request,
            options,
            Arc::clone(&self.store),
            Arc::clone(&self.fetcher),
            scope,
        )
    }
}

struct InFlight {
    generation: u64,
    token: Scope,
}

struct BindingInner<F: Fetcher> {
    request: EndpointRequest,
    key: CacheKey,
    options: BindingOptions,
    store: Arc<MemoryCache<F::Output>>,
    fetcher: Arc<F>,
    scope: Scope,
    state: watch::Sender<BindingSnapshot<F::Output>>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

/// One consumer's view of one endpoint request. Cheap to clone; clones
/// share state.
pub struct DataBinding<F: Fetcher> {
    inner: Arc<BindingInner<F>>,
}

impl<F: Fetcher> Clone for DataBinding<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Fetcher> DataBinding<F> {
    pub fn new(
        request: EndpointRequest,
        options: BindingOptions,
        store: Arc<MemoryCache<F::Output>>,
        fetcher: Arc<F>,
        scope: Scope,
    ) -> Self {
        let (state, _) = watch::channel(BindingSnapshot::default());
        Self {
            inner: Arc::new(BindingInner {
                key: request.cache_key(),
                request,
                options: options.normalized(),
                store,
                fetcher,
                scope,
                state,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.inner.key
    }

    pub fn options(&self) -> &BindingOptions {
        &self.inner.options
    }

    pub fn snapshot(&self) -> BindingSnapshot<F::Output> {
        self.inner.state.borrow().clone()
    }

    /// Receiver that is notified whenever the snapshot changes.
    pub fn changes(&self) -> watch::Receiver<BindingSnapshot<F::Output>> {
        self.inner.state.subscribe()
    }

    /// First bind: serve a fresh cached value if there is one, otherwise
    /// fetch when `refetch_on_mount` is set.
    pub async fn mount(&self) -> FetchOutcome {
        if self.serve_cached() {
            return FetchOutcome::FromCache;
        }
        if !self.inner.options.refetch_on_mount {
            return FetchOutcome::Skipped;
        }
        self.run_fetch(false).await
    }

    /// Regained-attention signal. Starts a silent background refresh when the
    /// cached entry is older than `stale_time` (or gone); the current data
    /// stays visible until the refresh lands.
    pub fn on_focus(&self) -> Option<JoinHandle<FetchOutcome>> {
        let inner = &self.inner;
        if !inner.options.refetch_on_focus || inner.scope.is_cancelled() {
            return None;
        }
        if let Some(hit) = inner.store.get_entry(inner.key.as_str()) {
            if hit.age <= inner.options.stale_time {
                return None;
            }
        }
        tracing::debug!(key = %inner.key, "stale on focus, refreshing in background");
        let binding = self.clone();
        Some(tokio::spawn(async move { binding.run_fetch(true).await }))
    }

    /// Fetches regardless of what the cache holds.
    pub async fn refetch(&self) -> FetchOutcome {
        self.run_fetch(false).await
    }

    /// Drops the cached entry for this binding's key. Does not fetch, and
    /// leaves the data currently shown in place.
    pub fn invalidate_cache(&self) -> bool {
        let removed = self.inner.store.delete(self.inner.key.as_str());
        self.inner.state.send_modify(|s| s.cached = false);
        removed
    }

    /// Ends the binding: cancels its scope and any fetch in flight. Cancelling
    /// the scope elsewhere, or dropping a [`ScopeGuard`](crate::scope::ScopeGuard)
    /// taken from it, has the same effect on fetches.
    pub fn unmount(&self) {
        self.inner.scope.cancel();
        let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = in_flight.take() {
            previous.token.cancel();
        }
    }

    fn serve_cached(&self) -> bool {
        let inner = &self.inner;
        let Some(hit) = inner.store.get_entry(inner.key.as_str()) else {
            tracing::debug!(key = %inner.key, "cache miss");
            return false;
        };
        tracing::debug!(key = %inner.key, age_ms = hit.age.as_millis() as u64, "cache hit");
        let stored_at = Utc::now()
            - chrono::Duration::from_std(hit.age).unwrap_or_else(|_| chrono::Duration::zero());
        inner.state.send_modify(|s| {
            s.data = Some(hit.value);
            s.loading = false;
            s.error = None;
            s.cached = true;
            s.last_updated = Some(stored_at);
        });
        true
    }

    async fn run_fetch(&self, silent: bool) -> FetchOutcome {
        let inner = &self.inner;
        if inner.scope.is_cancelled() {
            return FetchOutcome::Ignored;
        }

        // Supersede whatever is in flight for this binding.
        let token = Scope::new();
        let generation = {
            let mut in_flight = inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = in_flight.take() {
                previous.token.cancel();
            }
            let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *in_flight = Some(InFlight {
                generation,
                token: token.clone(),
            });
            generation
        };

        if !silent {
            inner.state.send_modify(|s| s.loading = true);
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            _ = inner.scope.cancelled() => None,
            result = inner.fetcher.fetch(&inner.request) => Some(result),
        };

        let still_current = {
            let mut in_flight = inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            let mine = in_flight
                .as_ref()
                .is_some_and(|current| current.generation == generation);
            if mine {
                in_flight.take();
            }
            mine
        };

        let Some(result) = result else {
            tracing::debug!(key = %inner.key, generation, "fetch cancelled");
            return FetchOutcome::Ignored;
        };
        if !still_current || inner.scope.is_cancelled() {
            tracing::debug!(key = %inner.key, generation, "discarding superseded fetch");
            return FetchOutcome::Ignored;
        }

        match result {
            Ok(value) => {
                inner
                    .store
                    .set(inner.key.as_str(), value.clone(), inner.options.ttl);
                inner.state.send_modify(|s| {
                    s.data = Some(value);
                    s.loading = false;
                    s.error = None;
                    s.cached = false;
                    s.last_updated = Some(Utc::now());
                });
                FetchOutcome::Applied
            }
            Err(err) => {
                tracing::warn!(key = %inner.key, "fetch failed: {}", err);
                inner.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(err.clone());
                });
                FetchOutcome::Failed(err)
            }
        }
    }
}
