//! Nearest-city lookup over a dual-backend geospatial location store.
//!
//! Records are kept either in an in-memory geo server (Redis, or an embedded
//! equivalent) or in a SQLite database with an R*Tree index. Both backends
//! answer the same radius query: nearest first, capped, filtered by
//! population.
//!
//! ```rust
//! use geonear::prelude::*;
//!
//! let backend = SpatialIndexBackend::in_memory()?;
//! for (city, lat, lng, population) in [
//!     ("Tokyo", 35.6897, 139.6922, 37_732_000),
//!     ("Seoul", 37.56, 126.99, 21_794_000),
//!     ("Singapore", 1.3, 103.8, 5_983_000),
//! ] {
//!     let record: LocationRecord = serde_json::from_value(serde_json::json!({
//!         "city": city, "lat": lat, "lng": lng, "population": population,
//!     }))?;
//!     assert!(backend.add_location(&record));
//! }
//!
//! let query = NearbyQuery::new(35.6897, 139.6922).with_distance(2_000_000.0);
//! let cities: Vec<_> = backend
//!     .find_nearby(&query)?
//!     .into_iter()
//!     .map(|hit| hit.location.city)
//!     .collect();
//! assert_eq!(cities, ["Tokyo", "Seoul"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compute;
pub mod config;
pub mod error;
pub mod seeding;
pub mod selector;
pub mod storage;
pub mod types;

pub use config::{Config, MemoryGeoConfig, SpatialIndexConfig, StorageConfig};
pub use error::{GeoNearError, Result};
pub use selector::{BackendSelector, SelectedBackend, StorageMode};
pub use storage::{
    EmbeddedGeoStore, GeoHit, GeoStore, MemoryGeoBackend, SpatialIndexBackend, StorageBackend,
};
#[cfg(feature = "redis")]
pub use storage::RedisGeoStore;
pub use types::{
    BackendKind, DEFAULT_DISTANCE_METERS, DEFAULT_MAX_RESULTS, Inventory, LocationId,
    LocationRecord, NearbyQuery, NearbyResult,
};

pub use compute::ids::make_id;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeoNearError, Result};

    pub use crate::{LocationId, LocationRecord, NearbyQuery, NearbyResult};

    pub use crate::{MemoryGeoBackend, SpatialIndexBackend, StorageBackend};

    pub use crate::{BackendSelector, Config, StorageMode};
}
