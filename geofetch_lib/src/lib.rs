//! Library layer for geofetch: TTL caching, cache-aware data bindings, and a
//! rate-limited single-flight reverse-geocoding resolver.
//!
//! Wraps the `geofetch_api` HTTP clients with an in-memory TTL cache, request
//! coalescing, dispatch spacing, and explicit cancellation scopes.

pub mod binding;
pub mod cache;
pub mod error;
pub mod key;
pub mod rate_limiter;
pub mod resolver;
pub mod scope;
pub mod settings;

pub use geofetch_api;
pub use geofetch_api::types;

pub use binding::{BindingOptions, BindingSnapshot, DataBinding, DataCache, FetchOutcome, Fetcher};
pub use cache::{CacheHit, CacheStats, MemoryCache};
pub use error::{FetchError, SettingsError};
pub use key::{CacheKey, EndpointRequest};
pub use rate_limiter::RateLimiter;
pub use resolver::{
    AddressResolver, Lookup, Nominatim, ResolveOptions, ResolvedAddress, ResolverConfig,
    ReverseGeocoder, StatsSummary, Subscription,
};
pub use scope::{Scope, ScopeGuard};
pub use settings::Settings;
