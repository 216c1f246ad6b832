//! Rate-limited, single-flight reverse-geocoding cache.
//!
//! [`AddressResolver`] wraps one upstream lookup function with:
//!
//! - a result cache keyed by rounded coordinate, with no expiry, that also
//!   remembers failures (as a fallback value) for the life of the process;
//! - single-flight coalescing: concurrent lookups for the same key share one
//!   upstream call;
//! - a process-wide [`RateLimiter`] spacing dispatches across all keys.
//!
//! Lookups never fail. An unresolvable coordinate degrades to the fallback
//! chosen by [`ResolveOptions`].

mod address;
mod stats;

pub use address::{format_coordinates, select_address};
pub use stats::{ResolverStats, StatsSummary};

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use geofetch_api::types::ReverseResponse;
use geofetch_api::ReverseQuery;
use tokio::sync::watch;

use crate::error::FetchError;
use crate::key::{CacheKey, DEFAULT_COORD_PRECISION, MAX_COORD_PRECISION};
use crate::rate_limiter::{RateLimiter, DEFAULT_MIN_INTERVAL};
use crate::scope::Scope;

/// Default time budget for one upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// The upstream lookup the resolver protects.
pub trait ReverseGeocoder: Send + Sync + 'static {
    fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
    ) -> impl Future<Output = Result<ReverseResponse, FetchError>> + Send;
}

/// Nominatim `/reverse` lookups through a [`geofetch_api::Client`], with an
/// optional detail level and response language applied to every query.
pub struct Nominatim {
    client: geofetch_api::Client,
    zoom: Option<u8>,
    language: Option<String>,
}

impl Nominatim {
    pub fn new(client: geofetch_api::Client) -> Self {
        Self {
            client,
            zoom: None,
            language: None,
        }
    }

    pub fn with_zoom(mut self, zoom: Option<u8>) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.language = language.map(str::to_string);
        self
    }

    fn query(&self, lat: f64, lon: f64) -> ReverseQuery {
        let mut query = ReverseQuery::new(lat, lon);
        if let Some(zoom) = self.zoom {
            query = query.with_zoom(zoom);
        }
        if let Some(language) = &self.language {
            query = query.with_language(language);
        }
        query
    }
}

impl ReverseGeocoder for Nominatim {
    fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
    ) -> impl Future<Output = Result<ReverseResponse, FetchError>> + Send {
        let query = self.query(lat, lon);
        async move { self.client.reverse(&query).await.map_err(FetchError::from) }
    }
}

/// Tuning for an [`AddressResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Minimum spacing between any two upstream calls.
    pub min_interval: Duration,
    /// Per-call budget; exceeding it counts as a failure.
    pub timeout: Duration,
    /// Decimal places kept when keying coordinates.
    pub key_precision: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            key_precision: DEFAULT_COORD_PRECISION,
        }
    }
}

impl ResolverConfig {
    /// Caps `key_precision` at [`MAX_COORD_PRECISION`].
    pub fn normalized(mut self) -> Self {
        self.key_precision = self.key_precision.min(MAX_COORD_PRECISION);
        self
    }
}

/// Per-lookup behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Store the formatted coordinate pair when nothing better resolves.
    pub fallback_to_coords: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fallback_to_coords: true,
        }
    }
}

/// Settled result for one coordinate key.
///
/// `fallback` marks best-effort values: the formatted coordinates, or no text
/// at all, stored after a failed or empty resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub text: Option<String>,
    pub fallback: bool,
}

impl ResolvedAddress {
    fn found(text: String) -> Self {
        Self {
            text: Some(text),
            fallback: false,
        }
    }

    fn fallback(lat: f64, lon: f64, options: ResolveOptions) -> Self {
        Self {
            text: options
                .fallback_to_coords
                .then(|| format_coordinates(lat, lon)),
            fallback: true,
        }
    }
}

/// Handle on an in-flight resolution. Dropping it detaches the subscriber;
/// the request itself carries on for anyone else waiting.
#[derive(Debug)]
pub struct Subscription {
    key: CacheKey,
    rx: watch::Receiver<Option<ResolvedAddress>>,
}

impl Subscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Waits for the request to settle. `None` only if it was dropped unsettled.
    pub async fn wait(mut self) -> Option<ResolvedAddress> {
        let settled = self
            .rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| (*value).clone());
        settled
    }

    /// Like [`Subscription::wait`], but gives up when `scope` ends and never
    /// hands a result to a scope that has already ended.
    pub async fn wait_in(self, scope: &Scope) -> Option<ResolvedAddress> {
        if scope.is_cancelled() {
            return None;
        }
        let settled = tokio::select! {
            biased;
            _ = scope.cancelled() => None,
            settled = self.wait() => settled,
        };
        if scope.is_cancelled() {
            return None;
        }
        settled
    }
}

/// Immediate answer to a lookup.
#[derive(Debug)]
pub enum Lookup {
    /// Already resolved (or already failed) for this process.
    Ready(ResolvedAddress),
    /// Resolution in flight; subscribe through the handle.
    Pending(Subscription),
    /// Coordinates were missing or invalid, or the caller's scope had
    /// already ended. Nothing was attempted.
    Skipped,
}

impl Lookup {
    pub fn is_loading(&self) -> bool {
        matches!(self, Lookup::Pending(_))
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            Lookup::Ready(resolved) => resolved.text.as_deref(),
            _ => None,
        }
    }

    /// Waits for a final value within `scope`.
    pub async fn settle(self, scope: &Scope) -> Option<ResolvedAddress> {
        match self {
            Lookup::Ready(resolved) => Some(resolved),
            Lookup::Pending(subscription) => subscription.wait_in(scope).await,
            Lookup::Skipped => None,
        }
    }
}

type Slot = watch::Sender<Option<ResolvedAddress>>;

struct ResolverInner<G> {
    geocoder: G,
    config: ResolverConfig,
    limiter: RateLimiter,
    resolved: DashMap<CacheKey, ResolvedAddress>,
    /// At most one slot per key. Subscribers are the slot's receivers.
    pending: Mutex<HashMap<CacheKey, Slot>>,
    stats: ResolverStats,
}

/// Reverse-geocoding cache shared by every consumer in the process.
/// Cheap to clone; clones share all state.
pub struct AddressResolver<G> {
    inner: Arc<ResolverInner<G>>,
}

impl<G> Clone for AddressResolver<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: ReverseGeocoder> AddressResolver<G> {
    pub fn new(geocoder: G, config: ResolverConfig) -> Self {
        let config = config.normalized();
        Self {
            inner: Arc::new(ResolverInner {
                geocoder,
                limiter: RateLimiter::new(config.min_interval),
                config,
                resolved: DashMap::new(),
                pending: Mutex::new(HashMap::new()),
                stats: ResolverStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn stats(&self) -> StatsSummary {
        self.inner.stats.summary()
    }

    /// Starts or joins a resolution for `(lat, lon)` on behalf of `scope`
    /// and returns at once.
    ///
    /// Must be called from within a tokio runtime: a miss spawns the
    /// dispatch task.
    pub fn lookup(
        &self,
        lat: Option<f64>,
        lon: Option<f64>,
        options: ResolveOptions,
        scope: &Scope,
    ) -> Lookup {
        if scope.is_cancelled() {
            tracing::debug!("scope already ended, skipping lookup");
            return Lookup::Skipped;
        }
        let Some((lat, lon)) = valid_coordinates(lat, lon) else {
            tracing::debug!(?lat, ?lon, "skipping lookup for invalid coordinates");
            return Lookup::Skipped;
        };
        let inner = &self.inner;
        let key = CacheKey::for_coordinate(lat, lon, inner.config.key_precision);

        if let Some(resolved) = inner.cached(&key) {
            return Lookup::Ready(resolved);
        }

        let mut pending = inner.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = pending.get(&key) {
            tracing::debug!(key = %key, "joining in-flight lookup");
            inner.stats.record_coalesced();
            return Lookup::Pending(Subscription {
                rx: slot.subscribe(),
                key,
            });
        }
        // A dispatch may have settled between the cache check and the lock.
        if let Some(resolved) = inner.cached(&key) {
            return Lookup::Ready(resolved);
        }

        let (slot, rx) = watch::channel(None);
        pending.insert(key.clone(), slot);
        drop(pending);

        tracing::debug!(key = %key, "address cache miss, scheduling lookup");
        tokio::spawn(Arc::clone(inner).dispatch(key.clone(), lat, lon, options));
        Lookup::Pending(Subscription { key, rx })
    }

    /// Resolves `(lat, lon)` to display text, waiting within `scope`.
    ///
    /// `None` means no text: invalid coordinates, a fallback without
    /// coordinates, or `scope` ending first.
    pub async fn resolve(
        &self,
        lat: Option<f64>,
        lon: Option<f64>,
        options: ResolveOptions,
        scope: &Scope,
    ) -> Option<String> {
        self.lookup(lat, lon, options, scope)
            .settle(scope)
            .await
            .and_then(|resolved| resolved.text)
    }

    /// Stored result for a coordinate, without starting anything.
    pub fn cached(&self, lat: f64, lon: f64) -> Option<ResolvedAddress> {
        let key = CacheKey::for_coordinate(lat, lon, self.inner.config.key_precision);
        self.inner.resolved.get(&key).map(|r| r.value().clone())
    }

    pub fn cached_len(&self) -> usize {
        self.inner.resolved.len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Forgets every stored result, including cached failures. In-flight
    /// lookups are unaffected and will store their results when they settle.
    pub fn clear_cache(&self) {
        self.inner.resolved.clear();
    }
}

impl<G: ReverseGeocoder> ResolverInner<G> {
    fn cached(&self, key: &CacheKey) -> Option<ResolvedAddress> {
        let resolved = self.resolved.get(key)?.value().clone();
        tracing::debug!(key = %key, "address cache hit");
        self.stats.record_cache_hit();
        Some(resolved)
    }

    /// Whether anyone still waits on `key`. When nobody does, the pending
    /// slot is removed under the same lock so no late joiner can attach to it.
    fn keep_or_abandon(&self, key: &CacheKey) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let wanted = pending
            .get(key)
            .is_some_and(|slot| slot.receiver_count() > 0);
        if !wanted {
            pending.remove(key);
        }
        wanted
    }

    async fn dispatch(self: Arc<Self>, key: CacheKey, lat: f64, lon: f64, options: ResolveOptions) {
        let delay = self.limiter.delay();
        if !delay.is_zero() {
            tracing::debug!(key = %key, delay_ms = delay.as_millis() as u64, "waiting for dispatch slot");
        }
        if !self.limiter.acquire_while(|| self.keep_or_abandon(&key)).await {
            tracing::debug!(key = %key, "no subscribers left, dropping lookup");
            self.stats.record_abandoned();
            return;
        }

        self.stats.record_dispatch();
        let call = self.geocoder.reverse_geocode(lat, lon);
        let resolved = match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(response)) => {
                self.stats.record_success();
                match select_address(&response) {
                    Some(text) => ResolvedAddress::found(text),
                    None => {
                        tracing::debug!(key = %key, "upstream returned no usable address");
                        ResolvedAddress::fallback(lat, lon, options)
                    }
                }
            }
            Ok(Err(err)) => {
                self.stats.record_failure();
                tracing::warn!(key = %key, "reverse geocoding failed: {}", err);
                ResolvedAddress::fallback(lat, lon, options)
            }
            Err(_) => {
                self.stats.record_failure();
                tracing::warn!(
                    key = %key,
                    "reverse geocoding timed out after {}ms",
                    self.config.timeout.as_millis()
                );
                ResolvedAddress::fallback(lat, lon, options)
            }
        };

        // Store before releasing the slot so a lookup that misses the slot finds the result.
        self.resolved.insert(key.clone(), resolved.clone());
        let slot = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
        if let Some(slot) = slot {
            slot.send_replace(Some(resolved));
        }
    }
}

fn valid_coordinates(lat: Option<f64>, lon: Option<f64>) -> Option<(f64, f64)> {
    let (lat, lon) = (lat?, lon?);
    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return None;
    }
    Some((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geofetch_api::types::AddressParts;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    struct MockGeocoder {
        calls: AtomicUsize,
        dispatched_at: Mutex<Vec<Instant>>,
        latency: Duration,
        response: Result<ReverseResponse, FetchError>,
    }

    impl MockGeocoder {
        fn new(latency: Duration, response: Result<ReverseResponse, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                dispatched_at: Mutex::new(Vec::new()),
                latency,
                response,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ReverseGeocoder for Arc<MockGeocoder> {
        fn reverse_geocode(
            &self,
            _lat: f64,
            _lon: f64,
        ) -> impl Future<Output = Result<ReverseResponse, FetchError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.dispatched_at.lock().unwrap().push(Instant::now());
            let latency = self.latency;
            let response = self.response.clone();
            async move {
                tokio::time::sleep(latency).await;
                response
            }
        }
    }

    fn calle_mayor() -> ReverseResponse {
        ReverseResponse {
            address: Some(AddressParts {
                road: Some("Calle Mayor".into()),
                city: Some("Madrid".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn resolver(geocoder: &Arc<MockGeocoder>) -> AddressResolver<Arc<MockGeocoder>> {
        AddressResolver::new(Arc::clone(geocoder), ResolverConfig::default())
    }

    #[tokio::test]
    async fn simultaneous_lookups_share_one_call() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::from_millis(50), Ok(calle_mayor()));
        let resolver = resolver(&geocoder);
        let scope = Scope::new();
        let opts = ResolveOptions::default();

        let start = Instant::now();
        let (a, b) = tokio::join!(
            resolver.resolve(Some(40.4168), Some(-3.7038), opts, &scope),
            resolver.resolve(Some(40.4168), Some(-3.7038), opts, &scope),
        );
        let elapsed = start.elapsed();

        assert_eq!(geocoder.calls(), 1);
        assert_eq!(a.as_deref(), Some("Calle Mayor, Madrid"));
        assert_eq!(a, b);
        assert!(elapsed < Duration::from_millis(900));
        assert_eq!(resolver.stats().coalesced, 1);
        assert_eq!(resolver.pending_len(), 0);
    }

    #[tokio::test]
    async fn many_nearby_lookups_coalesce() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::from_millis(50), Ok(calle_mayor()));
        let resolver = resolver(&geocoder);

        let mut handles = Vec::new();
        for i in 0..10 {
            let resolver = resolver.clone();
            // All within the same 5-place grid cell.
            let lat = 40.4168 + (i as f64) * 0.0000001;
            handles.push(tokio::spawn(async move {
                resolver
                    .resolve(Some(lat), Some(-3.7038), ResolveOptions::default(), &Scope::new())
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some("Calle Mayor, Madrid"));
        }
        assert_eq!(geocoder.calls(), 1);

        // Settled results are served without another call.
        let lookup = resolver.lookup(
            Some(40.4168),
            Some(-3.7038),
            ResolveOptions::default(),
            &Scope::new(),
        );
        assert!(!lookup.is_loading());
        assert_eq!(lookup.address(), Some("Calle Mayor, Madrid"));
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn dispatches_across_keys_are_spaced() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::from_millis(50), Ok(calle_mayor()));
        let resolver = resolver(&geocoder);

        let mut handles = Vec::new();
        for i in 0..4 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver
                    .resolve(
                        Some(40.0 + i as f64),
                        Some(-3.0),
                        ResolveOptions::default(),
                        &Scope::new(),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut stamps = geocoder.dispatched_at.lock().unwrap().clone();
        stamps.sort();
        assert_eq!(stamps.len(), 4);
        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= DEFAULT_MIN_INTERVAL);
        }
    }

    #[tokio::test]
    async fn timeout_caches_coordinate_fallback() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::from_secs(10), Ok(calle_mayor()));
        let resolver = resolver(&geocoder);
        let scope = Scope::new();
        let opts = ResolveOptions {
            fallback_to_coords: true,
        };

        let first = resolver
            .resolve(Some(40.4168), Some(-3.7038), opts, &scope)
            .await;
        assert_eq!(first.as_deref(), Some("40.4168, -3.7038"));

        let second = resolver.lookup(Some(40.4168), Some(-3.7038), opts, &scope);
        assert_eq!(second.address(), Some("40.4168, -3.7038"));
        assert_eq!(geocoder.calls(), 1);

        let stats = resolver.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cache_hits, 1);
        assert!(resolver.cached(40.4168, -3.7038).unwrap().fallback);
    }

    #[tokio::test]
    async fn failure_without_coordinate_fallback_caches_absent_text() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(
            Duration::from_millis(10),
            Err(FetchError::HttpStatus {
                status: 503,
                body: String::new(),
            }),
        );
        let resolver = resolver(&geocoder);
        let opts = ResolveOptions {
            fallback_to_coords: false,
        };

        let first = resolver
            .resolve(Some(1.5), Some(2.5), opts, &Scope::new())
            .await;
        assert_eq!(first, None);

        match resolver.lookup(Some(1.5), Some(2.5), opts, &Scope::new()) {
            Lookup::Ready(resolved) => {
                assert_eq!(resolved.text, None);
                assert!(resolved.fallback);
            }
            other => panic!("expected cached fallback, got {:?}", other),
        }
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_coordinates_are_skipped() {
        let geocoder = MockGeocoder::new(Duration::ZERO, Ok(calle_mayor()));
        let resolver = resolver(&geocoder);
        let opts = ResolveOptions::default();
        let scope = Scope::new();

        assert!(matches!(resolver.lookup(None, Some(1.0), opts, &scope), Lookup::Skipped));
        assert!(matches!(resolver.lookup(Some(1.0), None, opts, &scope), Lookup::Skipped));
        assert!(matches!(
            resolver.lookup(Some(f64::NAN), Some(1.0), opts, &scope),
            Lookup::Skipped
        ));
        assert!(matches!(
            resolver.lookup(Some(91.0), Some(1.0), opts, &scope),
            Lookup::Skipped
        ));

        assert_eq!(geocoder.calls(), 0);
        assert_eq!(resolver.limiter().last_dispatch(), None);
        assert_eq!(resolver.pending_len(), 0);
    }

    #[tokio::test]
    async fn lookup_abandoned_before_dispatch_costs_nothing() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::from_millis(50), Ok(calle_mayor()));
        let resolver = resolver(&geocoder);
        let opts = ResolveOptions::default();

        // Occupy the rate limiter so the next key has to wait.
        resolver
            .resolve(Some(10.0), Some(10.0), opts, &Scope::new())
            .await;

        let lookup = resolver.lookup(Some(20.0), Some(20.0), opts, &Scope::new());
        assert!(lookup.is_loading());
        drop(lookup);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(geocoder.calls(), 1);
        assert_eq!(resolver.stats().abandoned, 1);
        assert_eq!(resolver.pending_len(), 0);
        assert!(resolver.cached(20.0, 20.0).is_none());

        // A later request for the same key starts afresh.
        let text = resolver
            .resolve(Some(20.0), Some(20.0), opts, &Scope::new())
            .await;
        assert_eq!(text.as_deref(), Some("Calle Mayor, Madrid"));
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn ended_scope_detaches_only_its_subscriber() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::from_millis(50), Ok(calle_mayor()));
        let resolver = resolver(&geocoder);
        let opts = ResolveOptions::default();

        let gone = Scope::new();
        let staying = Scope::new();
        let first = resolver.lookup(Some(40.4168), Some(-3.7038), opts, &gone);
        let second = resolver.lookup(Some(40.4168), Some(-3.7038), opts, &staying);

        gone.cancel();
        assert_eq!(first.settle(&gone).await, None);

        let settled = second.settle(&staying).await.unwrap();
        assert_eq!(settled.text.as_deref(), Some("Calle Mayor, Madrid"));
        assert!(!settled.fallback);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn clear_cache_forgets_fallbacks() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::ZERO, Err(FetchError::Timeout));
        let resolver = resolver(&geocoder);
        let opts = ResolveOptions::default();

        resolver.resolve(Some(1.0), Some(1.0), opts, &Scope::new()).await;
        assert_eq!(resolver.cached_len(), 1);

        resolver.clear_cache();
        assert_eq!(resolver.cached_len(), 0);
        resolver.resolve(Some(1.0), Some(1.0), opts, &Scope::new()).await;
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn ended_scope_starts_nothing() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::from_millis(50), Ok(calle_mayor()));
        let resolver = resolver(&geocoder);
        let scope = Scope::new();
        scope.cancel();

        let text = resolver
            .resolve(Some(40.4168), Some(-3.7038), ResolveOptions::default(), &scope)
            .await;
        assert_eq!(text, None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(geocoder.calls(), 0);
        assert_eq!(resolver.pending_len(), 0);
        assert_eq!(resolver.stats().abandoned, 0);
        assert_eq!(resolver.cached_len(), 0);
    }

    #[tokio::test]
    async fn oversized_key_precision_is_capped() {
        tokio::time::pause();

        let geocoder = MockGeocoder::new(Duration::ZERO, Ok(calle_mayor()));
        let config = ResolverConfig {
            key_precision: 400,
            ..ResolverConfig::default()
        };
        let resolver = AddressResolver::new(Arc::clone(&geocoder), config);
        assert_eq!(resolver.config().key_precision, MAX_COORD_PRECISION);

        let text = resolver
            .resolve(Some(40.4168), Some(-3.7038), ResolveOptions::default(), &Scope::new())
            .await;
        assert_eq!(text.as_deref(), Some("Calle Mayor, Madrid"));
        assert!(resolver.cached(40.4168, -3.7038).is_some());
    }

    #[test]
    fn nominatim_applies_zoom_and_language() {
        let client = geofetch_api::Client::with_base_url("https://example.com", "geofetch-tests")
            .unwrap();
        let geocoder = Nominatim::new(client)
            .with_zoom(Some(16))
            .with_language(Some("es"));
        let query = geocoder.query(40.4168, -3.7038);
        assert_eq!(query.zoom, Some(16));
        assert_eq!(query.language.as_deref(), Some("es"));

        let plain = Nominatim::new(
            geofetch_api::Client::with_base_url("https://example.com", "geofetch-tests").unwrap(),
        );
        let query = plain.query(1.0, 2.0);
        assert_eq!(query.zoom, None);
        assert_eq!(query.language, None);
    }
}
