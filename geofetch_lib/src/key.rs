//! Deterministic cache keys.
//!
//! Two logically equal requests must always map to the same key, otherwise
//! neither reuse nor coalescing can happen.

use std::fmt;

/// Default number of decimal places kept when keying coordinates.
pub const DEFAULT_COORD_PRECISION: u32 = 5;

/// Finest precision a coordinate key can use. Beyond this the scale factor
/// stops being exact and keys degrade.
pub const MAX_COORD_PRECISION: u32 = 10;

/// Opaque key into a cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key for a coordinate, rounded to `precision` decimal places.
    ///
    /// Nearby points that round to the same grid cell share a key. Negative
    /// zero is folded into zero so `-0.000001` and `0.000001` agree.
    /// `precision` is capped at [`MAX_COORD_PRECISION`].
    pub fn for_coordinate(lat: f64, lon: f64, precision: u32) -> Self {
        let precision = precision.min(MAX_COORD_PRECISION);
        let places = precision as usize;
        CacheKey(format!(
            "{:.*},{:.*}",
            places,
            round_to(lat, precision),
            places,
            round_to(lon, precision)
        ))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Rounds half away from zero to `precision` decimal places, at most
/// [`MAX_COORD_PRECISION`].
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(MAX_COORD_PRECISION) as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Identity of a request against the generic data API: an endpoint plus
/// its query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointRequest {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

impl EndpointRequest {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    /// Key independent of parameter order: pairs are sorted by name, then value.
    pub fn cache_key(&self) -> CacheKey {
        let mut params: Vec<&(String, String)> = self.params.iter().collect();
        params.sort();
        let query = params
            .iter()
            .map(|(name, value)| format!("{}={}", escape(name), escape(value)))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            CacheKey(self.endpoint.clone())
        } else {
            CacheKey(format!("{}?{}", self.endpoint, query))
        }
    }
}

/// Escapes the separators used in keys so `a=b&c` cannot collide with `a=b`, `c`.
fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}
