//! In-process geo store.
//!
//! Keeps every geo set as a sorted set ordered by a 12-character geohash
//! score, so members that are close on the map are close in the ordering and
//! a geohash prefix selects one cell. Radius queries scan the cell holding
//! the center plus its eight neighbours at a precision coarse enough to cover
//! the radius, then filter by Haversine distance.

use super::{GeoHit, GeoStore};
use crate::compute::validation::{validate_coordinates, validate_geographic_point};
use crate::error::{GeoNearError, Result};
use bytes::Bytes;
use geo::{Distance, Haversine, Point};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Precision of the stored geohash score.
const SCORE_PRECISION: usize = 12;

/// Finest precision considered for a radius search.
const MAX_SEARCH_PRECISION: usize = 8;

/// Radius used by `geo::Haversine`.
const HAVERSINE_RADIUS_M: f64 = 6_371_008.8;

const NEIGHBOR_DIRECTIONS: [geohash::Direction; 8] = [
    geohash::Direction::N,
    geohash::Direction::S,
    geohash::Direction::E,
    geohash::Direction::W,
    geohash::Direction::NE,
    geohash::Direction::NW,
    geohash::Direction::SE,
    geohash::Direction::SW,
];

/// Embedded, thread-safe implementation of [`GeoStore`].
///
/// ```rust
/// use geonear::storage::{EmbeddedGeoStore, GeoStore};
///
/// let store = EmbeddedGeoStore::new();
/// store.geo_add("cities", 139.6922, 35.6897, "tokyo")?;
/// store.geo_add("cities", 126.99, 37.56, "seoul")?;
///
/// let hits = store.geo_radius("cities", 139.6922, 35.6897, 10_000.0, None)?;
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].member, "tokyo");
/// # Ok::<(), geonear::GeoNearError>(())
/// ```
#[derive(Default)]
pub struct EmbeddedGeoStore {
    inner: RwLock<EmbeddedInner>,
}

#[derive(Default)]
struct EmbeddedInner {
    values: FxHashMap<String, Bytes>,
    sets: FxHashMap<String, GeoSet>,
}

#[derive(Default)]
struct GeoSet {
    /// (score, member), the sorted-set view.
    by_score: BTreeSet<(String, String)>,
    members: FxHashMap<String, GeoMember>,
}

struct GeoMember {
    score: String,
    point: Point,
}

impl EmbeddedGeoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of plain keys.
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().values.is_empty()
    }
}

impl GeoStore for EmbeddedGeoStore {
    fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.inner
            .write()
            .values
            .insert(key.to_string(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.inner.read().values.get(key).cloned())
    }

    fn geo_add(&self, set: &str, lng: f64, lat: f64, member: &str) -> Result<()> {
        let point = Point::new(lng, lat);
        validate_geographic_point(&point)?;
        let score = geohash::encode(point.into(), SCORE_PRECISION)
            .map_err(|e| GeoNearError::InvalidInput(format!("Cannot encode geohash: {}", e)))?;

        let mut inner = self.inner.write();
        inner
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member, score, point);
        Ok(())
    }

    fn geo_radius(
        &self,
        set: &str,
        lng: f64,
        lat: f64,
        radius_m: f64,
        count: Option<usize>,
    ) -> Result<Vec<GeoHit>> {
        validate_coordinates(lat, lng)?;
        if !radius_m.is_finite() || radius_m < 0.0 {
            return Err(GeoNearError::InvalidInput(format!(
                "Radius must be a non-negative number of meters, got: {}",
                radius_m
            )));
        }

        let inner = self.inner.read();
        let geo_set = match inner.sets.get(set) {
            Some(geo_set) => geo_set,
            None => return Ok(Vec::new()),
        };

        let center = Point::new(lng, lat);
        let mut hits = match search_precision(&center, radius_m)
            .and_then(|precision| collect_candidate_cells(&center, precision))
        {
            Some(cells) => geo_set.collect_cells(&cells, &center, radius_m),
            None => geo_set.collect_full_scan(&center, radius_m),
        };

        hits.sort_by(|a, b| {
            a.distance_m
                .partial_cmp(&b.distance_m)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.member.cmp(&b.member))
        });
        if let Some(count) = count {
            hits.truncate(count);
        }
        Ok(hits)
    }

    fn geo_card(&self, set: &str) -> Result<usize> {
        Ok(self
            .inner
            .read()
            .sets
            .get(set)
            .map_or(0, |geo_set| geo_set.members.len()))
    }

    fn count_keys(&self, prefix: &str) -> Result<usize> {
        Ok(self
            .inner
            .read()
            .values
            .keys()
            .filter(|key| key.starts_with(prefix))
            .count())
    }
}

impl GeoSet {
    fn insert(&mut self, member: &str, score: String, point: Point) {
        if let Some(previous) = self.members.remove(member) {
            self.by_score.remove(&(previous.score, member.to_string()));
        }
        self.by_score.insert((score.clone(), member.to_string()));
        self.members
            .insert(member.to_string(), GeoMember { score, point });
    }

    fn hit_if_within(&self, member: &str, center: &Point, radius_m: f64) -> Option<GeoHit> {
        let entry = self.members.get(member)?;
        let distance = Haversine.distance(*center, entry.point);
        (distance <= radius_m).then(|| GeoHit {
            member: member.to_string(),
            distance_m: distance,
        })
    }

    fn collect_cells(
        &self,
        cells: &FxHashSet<String>,
        center: &Point,
        radius_m: f64,
    ) -> Vec<GeoHit> {
        let mut hits = Vec::new();
        for cell in cells {
            let start = (cell.clone(), String::new());
            for (score, member) in self.by_score.range(start..) {
                if !score.starts_with(cell.as_str()) {
                    break;
                }
                if let Some(hit) = self.hit_if_within(member, center, radius_m) {
                    hits.push(hit);
                }
            }
        }
        hits
    }

    fn collect_full_scan(&self, center: &Point, radius_m: f64) -> Vec<GeoHit> {
        self.members
            .keys()
            .filter_map(|member| self.hit_if_within(member, center, radius_m))
            .collect()
    }
}

/// Finest geohash precision whose cells are at least as large as the search
/// circle, so the center cell and its neighbours cover it. `None` when the
/// circle reaches a pole or the anti-meridian, or is too large for any cell.
fn search_precision(center: &Point, radius_m: f64) -> Option<usize> {
    let angular = radius_m / HAVERSINE_RADIUS_M;
    if angular >= std::f64::consts::FRAC_PI_2 {
        return None;
    }

    let lat_delta = angular.to_degrees();
    if center.y().abs() + lat_delta >= 90.0 {
        return None;
    }

    // Widest longitude offset reached by the circle.
    let ratio = angular.sin() / center.y().to_radians().cos();
    if ratio >= 1.0 {
        return None;
    }
    let lng_delta = ratio.asin().to_degrees();
    if center.x().abs() + lng_delta >= 180.0 {
        return None;
    }

    (1..=MAX_SEARCH_PRECISION).rev().find(|&precision| {
        let (cell_width, cell_height) = cell_size_degrees(precision);
        cell_width >= lng_delta && cell_height >= lat_delta
    })
}

/// Width and height in degrees of a geohash cell.
fn cell_size_degrees(precision: usize) -> (f64, f64) {
    let bits = precision as i32 * 5;
    let lng_bits = (bits + 1) / 2;
    let lat_bits = bits / 2;
    (360.0 / 2f64.powi(lng_bits), 180.0 / 2f64.powi(lat_bits))
}

/// Center cell plus its eight neighbours. `None` if a neighbour cannot be
/// computed (for example across the anti-meridian).
fn collect_candidate_cells(center: &Point, precision: usize) -> Option<FxHashSet<String>> {
    let center_cell = geohash::encode((*center).into(), precision).ok()?;

    let mut cells = FxHashSet::default();
    cells.reserve(9);
    for direction in NEIGHBOR_DIRECTIONS {
        cells.insert(geohash::neighbor(&center_cell, direction).ok()?);
    }
    cells.insert(center_cell);
    Some(cells)
}
