//! Turning a reverse-geocoding response into display text.

use geofetch_api::types::ReverseResponse;

/// Picks the most specific description upstream offered.
///
/// A way name (road, street, highway, residential, pedestrian, in that
/// order) wins, suffixed with the city or town when one is known. Without a
/// way name the full `display_name` is used. Returns `None` when neither is
/// present, including upstream's "Unable to geocode" error bodies.
pub fn select_address(response: &ReverseResponse) -> Option<String> {
    if let Some(parts) = &response.address {
        if let Some(way) = parts.thoroughfare() {
            return Some(match parts.locality() {
                Some(locality) => format!("{}, {}", way, locality),
                None => way.to_string(),
            });
        }
    }
    response.description().map(str::to_string)
}

/// Coordinate pair as shown when nothing better is known.
pub fn format_coordinates(lat: f64, lon: f64) -> String {
    format!("{:.4}, {:.4}", lat, lon)
}
