use url::Url;

use super::Query;

/// Parameters for a `/reverse` lookup.
///
/// Coordinates are sent as given; rounding for cache identity happens in the
/// caching layer, not here.
#[derive(Clone, Debug)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lon: f64,
    /// Detail level, 0 (country) to 18 (building). `None` uses the server default.
    pub zoom: Option<u8>,
    /// Preferred response language, e.g. `"es"`.
    pub language: Option<String>,
}

impl ReverseQuery {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            zoom: None,
            language: None,
        }
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = Some(zoom.min(18));
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }
}

impl Query for ReverseQuery {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("format", "jsonv2")
            .append_pair("lat", &self.lat.to_string())
            .append_pair("lon", &self.lon.to_string())
            .append_pair("addressdetails", "1");
        if let Some(zoom) = self.zoom {
            url.query_pairs_mut().append_pair("zoom", &zoom.to_string());
        }
        if let Some(language) = &self.language {
            url.query_pairs_mut()
                .append_pair("accept-language", language.as_str());
        }
        url
    }
}
