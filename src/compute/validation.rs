//! Validation for geographic coordinates and nearby queries.

use crate::error::{GeoNearError, Result};
use crate::types::NearbyQuery;
use geo::Point;

/// Validates latitude/longitude.
///
/// Longitude: [-180.0, 180.0], Latitude: [-90.0, 90.0]
///
/// # Examples
///
/// ```
/// use geonear::compute::validation::validate_coordinates;
///
/// assert!(validate_coordinates(35.6897, 139.6922).is_ok());
/// assert!(validate_coordinates(95.0, 0.0).is_err());
/// assert!(validate_coordinates(0.0, f64::NAN).is_err());
/// ```
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<()> {
    if !lng.is_finite() {
        return Err(GeoNearError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            lng
        )));
    }

    if !lat.is_finite() {
        return Err(GeoNearError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            lat
        )));
    }

    if !(-180.0..=180.0).contains(&lng) {
        return Err(GeoNearError::InvalidInput(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            lng
        )));
    }

    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeoNearError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            lat
        )));
    }

    Ok(())
}

/// Validates a `geo::Point` (x = longitude, y = latitude).
pub fn validate_geographic_point(point: &Point) -> Result<()> {
    validate_coordinates(point.y(), point.x())
}

/// Validates a nearby query: finite in-range center, non-negative finite
/// radius and a result count of at least one.
///
/// # Examples
///
/// ```
/// use geonear::NearbyQuery;
/// use geonear::compute::validation::validate_query;
///
/// let ok = NearbyQuery::new(37.56, 126.99).with_distance(1_000.0);
/// assert!(validate_query(&ok).is_ok());
///
/// let zero_count = NearbyQuery::new(37.56, 126.99).with_count(0);
/// assert!(validate_query(&zero_count).is_err());
/// ```
pub fn validate_query(query: &NearbyQuery) -> Result<()> {
    validate_coordinates(query.latitude, query.longitude)?;

    if !query.distance_meters.is_finite() || query.distance_meters < 0.0 {
        return Err(GeoNearError::InvalidInput(format!(
            "Distance must be a non-negative number of meters, got: {}",
            query.distance_meters
        )));
    }

    if query.max_results < 1 {
        return Err(GeoNearError::InvalidInput(
            "Count must be at least 1".to_string(),
        ));
    }

    Ok(())
}
