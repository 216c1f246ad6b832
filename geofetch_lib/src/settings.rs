//! Layered configuration: defaults, then an optional TOML file, then
//! `GEOFETCH_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binding::BindingOptions;
use crate::error::SettingsError;
use crate::key::{DEFAULT_COORD_PRECISION, MAX_COORD_PRECISION};
use crate::resolver::{ResolveOptions, ResolverConfig};

/// Top-level settings, as read from `geofetch.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub resolver: ResolverSettings,
}

/// TTL cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub stale_secs: u64,
    /// Run a background sweep of expired entries this often. Off when unset.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            stale_secs: 60,
            sweep_interval_secs: None,
        }
    }
}

/// Reverse-geocoding resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub base_url: String,
    /// Client identifier sent as `User-Agent`. Public Nominatim rejects generic ones.
    pub user_agent: String,
    pub min_interval_ms: u64,
    pub timeout_ms: u64,
    pub fallback_to_coords: bool,
    pub key_precision: u32,
    /// Nominatim detail level, 0 (country) to 18 (building). Server default when unset.
    pub zoom: Option<u8>,
    /// Preferred response language, sent as `accept-language`.
    pub language: Option<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            base_url: geofetch_api::DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("geofetch/", env!("CARGO_PKG_VERSION")).to_string(),
            min_interval_ms: 800,
            timeout_ms: 5_000,
            fallback_to_coords: true,
            key_precision: DEFAULT_COORD_PRECISION,
            zoom: None,
            language: None,
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads `path` if given, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Overrides fields from `GEOFETCH_*` variables looked up through `var`.
    /// Unparseable numbers are ignored.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| var(key).and_then(|val| val.parse::<u64>().ok());

        if let Some(v) = number("GEOFETCH_CACHE_TTL_SECS") {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = number("GEOFETCH_STALE_SECS") {
            self.cache.stale_secs = v;
        }
        if let Some(v) = number("GEOFETCH_MIN_INTERVAL_MS") {
            self.resolver.min_interval_ms = v;
        }
        if let Some(v) = number("GEOFETCH_TIMEOUT_MS") {
            self.resolver.timeout_ms = v;
        }
        if let Some(v) = var("GEOFETCH_BASE_URL").filter(|v| !v.is_empty()) {
            self.resolver.base_url = v;
        }
        if let Some(v) = var("GEOFETCH_USER_AGENT").filter(|v| !v.is_empty()) {
            self.resolver.user_agent = v;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.cache.ttl_secs == 0 {
            return Err(SettingsError::Invalid("cache.ttl_secs must be positive".into()));
        }
        if self.cache.stale_secs > self.cache.ttl_secs {
            return Err(SettingsError::Invalid(format!(
                "cache.stale_secs ({}) must not exceed cache.ttl_secs ({})",
                self.cache.stale_secs, self.cache.ttl_secs
            )));
        }
        if self.cache.sweep_interval_secs == Some(0) {
            return Err(SettingsError::Invalid(
                "cache.sweep_interval_secs must be positive".into(),
            ));
        }
        if self.resolver.min_interval_ms == 0 {
            return Err(SettingsError::Invalid(
                "resolver.min_interval_ms must be positive".into(),
            ));
        }
        if self.resolver.timeout_ms == 0 {
            return Err(SettingsError::Invalid("resolver.timeout_ms must be positive".into()));
        }
        if self.resolver.key_precision > MAX_COORD_PRECISION {
            return Err(SettingsError::Invalid(format!(
                "resolver.key_precision must be at most {}",
                MAX_COORD_PRECISION
            )));
        }
        if self.resolver.zoom.is_some_and(|zoom| zoom > 18) {
            return Err(SettingsError::Invalid("resolver.zoom must be 0 to 18".into()));
        }
        if self.resolver.user_agent.trim().is_empty() {
            return Err(SettingsError::Invalid("resolver.user_agent must be set".into()));
        }
        Ok(())
    }

    pub fn binding_options(&self) -> BindingOptions {
        BindingOptions::default()
            .with_ttl(Duration::from_secs(self.cache.ttl_secs))
            .with_stale_time(Duration::from_secs(self.cache.stale_secs))
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            min_interval: Duration::from_millis(self.resolver.min_interval_ms),
            timeout: Duration::from_millis(self.resolver.timeout_ms),
            key_precision: self.resolver.key_precision,
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            fallback_to_coords: self.resolver.fallback_to_coords,
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.cache.sweep_interval_secs.map(Duration::from_secs)
    }
}
