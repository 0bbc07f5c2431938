//! Command surface of an in-memory geospatial key/value server.
//!
//! [`GeoStore`] mirrors the handful of commands the memory-geo backend needs:
//! plain `SET`/`GET` on string keys, and a geo-indexed sorted set with
//! `GEOADD`, a radius query and a cardinality count. Each call is a single
//! atomic command; nothing spans two calls.

use crate::error::Result;
use bytes::Bytes;

mod embedded;
#[cfg(feature = "redis")]
mod redis_store;

pub use embedded::EmbeddedGeoStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisGeoStore;

/// One member returned by a radius query.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoHit {
    pub member: String,
    /// Distance from the query center in meters, as computed by the store.
    pub distance_m: f64,
}

/// Primitive operations of a geo-capable key/value store.
pub trait GeoStore: Send + Sync {
    /// Liveness check.
    fn ping(&self) -> Result<()>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Add or move `member` of geo set `set` to `(lng, lat)`.
    fn geo_add(&self, set: &str, lng: f64, lat: f64, member: &str) -> Result<()>;

    /// Members of `set` within `radius_m` meters (inclusive) of `(lng, lat)`,
    /// nearest first, at most `count` when given.
    fn geo_radius(
        &self,
        set: &str,
        lng: f64,
        lat: f64,
        radius_m: f64,
        count: Option<usize>,
    ) -> Result<Vec<GeoHit>>;

    /// Number of members in `set`; zero when it does not exist.
    fn geo_card(&self, set: &str) -> Result<usize>;

    /// Number of plain keys starting with `prefix`.
    fn count_keys(&self, prefix: &str) -> Result<usize>;
}

impl<T: GeoStore + ?Sized> GeoStore for std::sync::Arc<T> {
    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn geo_add(&self, set: &str, lng: f64, lat: f64, member: &str) -> Result<()> {
        (**self).geo_add(set, lng, lat, member)
    }

    fn geo_radius(
        &self,
        set: &str,
        lng: f64,
        lat: f64,
        radius_m: f64,
        count: Option<usize>,
    ) -> Result<Vec<GeoHit>> {
        (**self).geo_radius(set, lng, lat, radius_m, count)
    }

    fn geo_card(&self, set: &str) -> Result<usize> {
        (**self).geo_card(set)
    }

    fn count_keys(&self, prefix: &str) -> Result<usize> {
        (**self).count_keys(prefix)
    }
}
