//! In-memory geospatial backend.
//!
//! Records live in two structures of a [`GeoStore`]: a geo-indexed set named
//! [`GEO_SET_KEY`] whose members are location ids, and plain keys
//! `loc:{id}` holding the JSON of the sanitized record. The two writes are
//! separate commands, so an index entry may briefly point at a missing value;
//! reads skip such entries.

use super::StorageBackend;
use super::geo::{EmbeddedGeoStore, GeoStore};
use crate::error::Result;
use crate::types::{BackendKind, Inventory, LocationRecord, NearbyQuery, NearbyResult};

#[cfg(feature = "redis")]
use super::geo::RedisGeoStore;
#[cfg(feature = "redis")]
use crate::config::MemoryGeoConfig;

/// Name of the geo set indexing every location id.
pub const GEO_SET_KEY: &str = "locations";

/// Prefix of the keys holding serialized records.
pub const LOCATION_PREFIX: &str = "loc:";

fn location_key(id: &str) -> String {
    format!("{}{}", LOCATION_PREFIX, id)
}

/// Location store over any [`GeoStore`].
///
/// ```rust
/// use geonear::prelude::*;
///
/// let backend = MemoryGeoBackend::embedded();
/// let tokyo: LocationRecord = serde_json::from_str(
///     r#"{"city":"Tokyo","lat":35.6897,"lng":139.6922,"iso2":"JP","population":37732000}"#,
/// )?;
/// assert!(backend.add_location(&tokyo));
///
/// let hits = backend.find_nearby(&NearbyQuery::new(35.6897, 139.6922))?;
/// assert_eq!(hits[0].location.city, "Tokyo");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct MemoryGeoBackend<S: GeoStore> {
    store: S,
}

impl<S: GeoStore> MemoryGeoBackend<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying command store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn try_add(&self, location: &LocationRecord) -> Result<String> {
        let clean = location.sanitize();
        clean.validate()?;

        let id = clean.id().into_string();
        let payload = serde_json::to_vec(&clean)?;

        self.store.set(&location_key(&id), &payload)?;
        self.store.geo_add(GEO_SET_KEY, clean.lng, clean.lat, &id)?;
        Ok(id)
    }
}

impl MemoryGeoBackend<EmbeddedGeoStore> {
    /// Backend over a fresh in-process store.
    pub fn embedded() -> Self {
        Self::new(EmbeddedGeoStore::new())
    }
}

#[cfg(feature = "redis")]
impl MemoryGeoBackend<RedisGeoStore> {
    /// Backend over a Redis server. The connection is opened lazily; call
    /// [`StorageBackend::health_check`] to check it.
    pub fn connect(config: &MemoryGeoConfig) -> Result<Self> {
        Ok(Self::new(RedisGeoStore::new(config)?))
    }
}

impl<S: GeoStore> StorageBackend for MemoryGeoBackend<S> {
    fn add_location(&self, location: &LocationRecord) -> bool {
        match self.try_add(location) {
            Ok(id) => {
                log::trace!("Stored location {}", id);
                true
            }
            Err(e) => {
                log::error!("Failed to add location {:?}: {}", location.city, e);
                false
            }
        }
    }

    fn find_nearby(&self, query: &NearbyQuery) -> Result<Vec<NearbyResult>> {
        query.validate()?;

        // Capping at the store would drop qualifying records that sit behind
        // filtered-out ones, so the cap moves after the filter.
        let store_cap = if query.min_population > 0 {
            None
        } else {
            Some(query.max_results)
        };

        let hits = self.store.geo_radius(
            GEO_SET_KEY,
            query.longitude,
            query.latitude,
            query.distance_meters,
            store_cap,
        )?;

        let mut results = Vec::with_capacity(hits.len().min(query.max_results));
        for hit in hits {
            let Some(payload) = self.store.get(&location_key(&hit.member))? else {
                log::debug!("Skipping stale index entry {}", hit.member);
                continue;
            };

            let location: LocationRecord = serde_json::from_slice(&payload)?;
            if location.population < query.min_population {
                continue;
            }

            results.push(NearbyResult {
                location,
                distance: hit.distance_m,
            });
            if results.len() == query.max_results {
                break;
            }
        }

        Ok(results)
    }

    fn health_check(&self) -> bool {
        match self.store.ping() {
            Ok(()) => true,
            Err(e) => {
                log::error!("Memory-geo health check failed: {}", e);
                false
            }
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::MemoryGeo
    }

    fn inventory(&self) -> Result<Inventory> {
        let records = self.store.count_keys(LOCATION_PREFIX)?;
        let indexed = self.store.geo_card(GEO_SET_KEY)?;

        Ok(Inventory {
            structures_present: indexed > 0,
            records,
            indexed,
        })
    }
}
