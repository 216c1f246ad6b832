//! Wire types for the reverse-geocoding response.
//!
//! Every field is optional: upstream omits whatever it does not know, and
//! answers unresolvable coordinates with HTTP 200 and an `error` string.

use serde::{Deserialize, Serialize};

/// Top-level `/reverse` response body.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ReverseResponse {
    #[serde(default)]
    pub address: Option<AddressParts>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The `address` sub-object. Only the fields the resolver inspects are modelled.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AddressParts {
    #[serde(default)]
    pub road: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub highway: Option<String>,
    #[serde(default)]
    pub residential: Option<String>,
    #[serde(default)]
    pub pedestrian: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
}

impl AddressParts {
    /// Most specific way name, in preference order road > street > highway >
    /// residential > pedestrian. Blank values count as missing.
    pub fn thoroughfare(&self) -> Option<&str> {
        [
            &self.road,
            &self.street,
            &self.highway,
            &self.residential,
            &self.pedestrian,
        ]
        .into_iter()
        .find_map(|field| non_blank(field))
    }

    /// Locality used to disambiguate a way name: city, else town.
    pub fn locality(&self) -> Option<&str> {
        non_blank(&self.city).or_else(|| non_blank(&self.town))
    }
}

impl ReverseResponse {
    /// The full formatted description, if upstream sent a non-blank one.
    pub fn description(&self) -> Option<&str> {
        non_blank(&self.display_name)
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
