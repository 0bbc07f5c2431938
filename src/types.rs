//! Core data types: location records, derived ids, queries and results.

use crate::compute::ids::make_id;
use crate::compute::validation;
use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Default search radius in meters.
pub const DEFAULT_DISTANCE_METERS: f64 = 500_000.0;

/// Default maximum number of results.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// One city and its canonical attributes.
///
/// The JSON shape matches the world-cities dataset used for seeding:
///
/// ```rust
/// use geonear::LocationRecord;
///
/// let json = r#"{
///     "city": "Tokyo", "city_ascii": "Tokyo", "lat": 35.6897, "lng": 139.6922,
///     "country": "Japan", "iso2": "JP", "iso3": "JPN", "admin_name": "Tōkyō",
///     "capital": "primary", "population": 37732000
/// }"#;
/// let record: LocationRecord = serde_json::from_str(json)?;
/// assert_eq!(record.id().as_str(), "jp_tky_tky");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city_ascii: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub country: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub iso2: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub iso3: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub admin_name: String,
    /// `primary`, `admin`, `minor` or empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub capital: String,
    #[serde(default, deserialize_with = "lenient_population")]
    pub population: u64,
}

impl LocationRecord {
    /// Trim every text field and upper-case the country codes.
    ///
    /// Numeric fields are left untouched. Applying it twice is a no-op.
    pub fn sanitize(&self) -> LocationRecord {
        LocationRecord {
            city: self.city.trim().to_string(),
            city_ascii: self.city_ascii.trim().to_string(),
            lat: self.lat,
            lng: self.lng,
            country: self.country.trim().to_string(),
            iso2: self.iso2.trim().to_uppercase(),
            iso3: self.iso3.trim().to_uppercase(),
            admin_name: self.admin_name.trim().to_string(),
            capital: self.capital.trim().to_string(),
            population: self.population,
        }
    }

    /// Derived id of the record. Callers writing to a backend should
    /// compute it on the sanitized record.
    pub fn id(&self) -> LocationId {
        make_id(&self.city, &self.admin_name, &self.iso2)
    }

    /// Validate latitude/longitude ranges.
    pub fn validate(&self) -> Result<()> {
        validation::validate_coordinates(self.lat, self.lng)
    }
}

/// Deterministic, abbreviation-based primary key of a location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    pub(crate) fn from_parts(country: &str, region: &str, city: &str) -> Self {
        LocationId(format!("{country}_{region}_{city}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LocationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A location plus its distance from the query point, in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyResult {
    #[serde(flatten)]
    pub location: LocationRecord,
    pub distance: f64,
}

/// Parameters of a nearby search.
///
/// Field names on the wire follow the query-string names (`distance`,
/// `count`, `min_population`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "distance", default = "NearbyQuery::default_distance")]
    pub distance_meters: f64,
    #[serde(rename = "count", default = "NearbyQuery::default_count")]
    pub max_results: usize,
    #[serde(default)]
    pub min_population: u64,
}

impl NearbyQuery {
    const fn default_distance() -> f64 {
        DEFAULT_DISTANCE_METERS
    }

    const fn default_count() -> usize {
        DEFAULT_MAX_RESULTS
    }

    /// Query centered at `(latitude, longitude)` with default radius, count
    /// and population filter.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            distance_meters: DEFAULT_DISTANCE_METERS,
            max_results: DEFAULT_MAX_RESULTS,
            min_population: 0,
        }
    }

    pub fn with_distance(mut self, meters: f64) -> Self {
        self.distance_meters = meters;
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.max_results = count;
        self
    }

    pub fn with_min_population(mut self, population: u64) -> Self {
        self.min_population = population;
        self
    }

    /// Reject non-finite or out-of-range values before they reach a backend.
    pub fn validate(&self) -> Result<()> {
        validation::validate_query(self)
    }
}

/// Which storage engine a backend instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    MemoryGeo,
    SpatialIndex,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::MemoryGeo => f.write_str("memory-geo"),
            BackendKind::SpatialIndex => f.write_str("spatial-index"),
        }
    }
}

/// What a backend currently holds, used by the seeding check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inventory {
    /// Whether the structural objects the backend needs (tables, indexes) exist.
    pub structures_present: bool,
    /// Number of stored record values.
    pub records: usize,
    /// Number of entries in the spatial index.
    pub indexed: usize,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Some dataset rows carry the population as a float or null.
fn lenient_population<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    match value {
        None => Ok(0),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v.round() as u64),
        Some(v) => Err(serde::de::Error::custom(format!(
            "population must be a non-negative number, got {}",
            v
        ))),
    }
}
