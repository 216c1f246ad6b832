//! Query builders that serialize themselves onto a request URL.

use url::Url;

mod reverse;
pub use self::reverse::ReverseQuery;

/// Trait implemented by all query builders.
pub trait Query {
    /// Appends this query's parameters to the given URL, returning the modified URL.
    fn add_to_url(&self, url: &Url) -> Url;
}
