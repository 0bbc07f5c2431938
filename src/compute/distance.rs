//! Great-circle distance and bounding-box approximation on a spherical Earth.
//!
//! Both stages use [`EARTH_RADIUS_KM`] so the pre-filter box and the exact
//! distance agree geometrically.

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Axis-aligned latitude/longitude rectangle, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GeoBounds {
    /// True if the point lies inside the rectangle (edges included).
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

/// Approximate box around `(lat, lng)` that contains every point within
/// `radius_km`.
///
/// The raw deltas are `(r / R) * 180/π` for latitude and
/// `(r / (R * cos(lat))) * 180/π` for longitude. When the box reaches past a
/// pole the latitude range is clamped and all longitudes are included; when
/// it crosses the anti-meridian all longitudes are included. The box is a
/// pre-filter; the exact distance decides membership.
///
/// ```rust
/// use geonear::compute::distance::bounding_box;
///
/// let bounds = bounding_box(35.6897, 139.6922, 100.0);
/// assert!(bounds.contains(35.6897, 139.6922));
/// assert!(bounds.max_lat - bounds.min_lat < 2.0);
/// ```
pub fn bounding_box(lat: f64, lng: f64, radius_km: f64) -> GeoBounds {
    let lat_delta = (radius_km / EARTH_RADIUS_KM).to_degrees();
    let lng_delta = (radius_km / (EARTH_RADIUS_KM * lat.to_radians().cos())).to_degrees();

    let mut min_lat = lat - lat_delta;
    let mut max_lat = lat + lat_delta;
    let mut min_lng = lng - lng_delta;
    let mut max_lng = lng + lng_delta;

    let crosses_pole = min_lat < -90.0 || max_lat > 90.0;
    if crosses_pole {
        min_lat = min_lat.max(-90.0);
        max_lat = max_lat.min(90.0);
    }

    let crosses_meridian = !lng_delta.is_finite() || min_lng < -180.0 || max_lng > 180.0;
    if crosses_pole || crosses_meridian {
        min_lng = -180.0;
        max_lng = 180.0;
    }

    GeoBounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    }
}

/// Great-circle distance in kilometers via the spherical law of cosines.
///
/// The `acos` argument is clamped to `[-1, 1]` so floating-point overshoot
/// at near-zero distances cannot produce `NaN`.
///
/// ```rust
/// use geonear::compute::distance::great_circle_km;
///
/// assert_eq!(great_circle_km(35.6897, 139.6922, 35.6897, 139.6922), 0.0);
/// let tokyo_seoul = great_circle_km(35.6897, 139.6922, 37.56, 126.99);
/// assert!((tokyo_seoul - 1155.0).abs() < 10.0);
/// ```
pub fn great_circle_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    // acos loses precision near 1; an exact match must read as zero.
    if lat1 == lat2 && lng1 == lng2 {
        return 0.0;
    }

    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let delta_lambda = (lng2 - lng1).to_radians();

    let cos_angle = phi1.sin() * phi2.sin() + phi1.cos() * phi2.cos() * delta_lambda.cos();

    EARTH_RADIUS_KM * cos_angle.clamp(-1.0, 1.0).acos()
}

/// Great-circle distance in meters.
pub fn great_circle_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    great_circle_km(lat1, lng1, lat2, lng2) * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_longitudes(bounds: &GeoBounds) -> bool {
        bounds.min_lng == -180.0 && bounds.max_lng == 180.0
    }

    #[test]
    fn test_zero_distance_is_exact() {
        for (lat, lng) in [(0.0, 0.0), (35.6897, 139.6922), (1.3, 103.8), (-89.9, 179.9)] {
            assert_eq!(great_circle_km(lat, lng, lat, lng), 0.0);
        }
    }

    #[test]
    fn test_near_zero_distance_is_finite() {
        let d = great_circle_km(35.6897, 139.6922, 35.6897, 139.692_200_1);
        assert!(!d.is_nan());
        assert!(d < 1e-3);
    }

    #[test]
    fn test_known_distances() {
        // One degree of latitude is R * π / 180.
        let one_degree = great_circle_km(0.0, 0.0, 1.0, 0.0);
        assert!((one_degree - EARTH_RADIUS_KM.to_radians()).abs() < 1e-6);

        let tokyo_shanghai = great_circle_km(35.6897, 139.6922, 31.2286, 121.4747);
        assert!((1700.0..1800.0).contains(&tokyo_shanghai));

        let antipodal = great_circle_km(0.0, 0.0, 0.0, 180.0);
        assert!((antipodal - EARTH_RADIUS_KM * std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_symmetric() {
        let a = great_circle_km(37.56, 126.99, 39.9067, 116.3975);
        let b = great_circle_km(39.9067, 116.3975, 37.56, 126.99);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_deltas() {
        let bounds = bounding_box(0.0, 0.0, 111.19492664455873);
        // At the equator the deltas are one degree each way.
        assert!((bounds.max_lat - 1.0).abs() < 1e-9);
        assert!((bounds.min_lng + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_contains_points_on_circle() {
        let (lat, lng, r) = (48.8566, 2.3522, 300.0);
        let bounds = bounding_box(lat, lng, r);
        let lat_delta = (r / EARTH_RADIUS_KM).to_degrees();
        assert!(bounds.contains(lat + lat_delta * 0.999, lng));
        assert!(bounds.contains(lat - lat_delta * 0.999, lng));
        assert!(!bounds.contains(lat + lat_delta * 1.5, lng));
    }

    #[test]
    fn test_bounding_box_across_pole() {
        let bounds = bounding_box(89.5, 10.0, 200.0);
        assert_eq!(bounds.max_lat, 90.0);
        assert!(all_longitudes(&bounds));
        // A point just over the pole on the other side of the globe is inside.
        assert!(bounds.contains(89.5, -170.0));
    }

    #[test]
    fn test_bounding_box_across_antimeridian() {
        let bounds = bounding_box(-17.7, 179.5, 200.0);
        assert!(all_longitudes(&bounds));
        assert!(bounds.contains(-17.7, -179.5));
    }

    #[test]
    fn test_bounding_box_at_pole_is_finite() {
        let bounds = bounding_box(90.0, 0.0, 10.0);
        assert!(bounds.min_lat.is_finite());
        assert!(all_longitudes(&bounds));
    }
}
