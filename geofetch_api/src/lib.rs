//! HTTP clients for the two upstreams behind the geofetch cache layer: a
//! Nominatim-compatible reverse geocoder and an arbitrary JSON data API.

mod client;
mod errors;
mod json_client;
mod query;
pub mod types;
pub use self::client::{Client, DEFAULT_BASE_URL};
pub use self::errors::Error;
pub use self::json_client::JsonClient;
pub use self::query::{Query, ReverseQuery};
