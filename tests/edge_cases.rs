use bytes::Bytes;
use geonear::prelude::*;
use geonear::storage::memory_geo::{GEO_SET_KEY, LOCATION_PREFIX};
use geonear::{EmbeddedGeoStore, GeoHit, GeoStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn city(name: &str, lat: f64, lng: f64, population: u64) -> LocationRecord {
    LocationRecord {
        city: name.to_string(),
        city_ascii: name.to_string(),
        lat,
        lng,
        country: String::new(),
        iso2: "ZZ".to_string(),
        iso3: String::new(),
        admin_name: String::new(),
        capital: String::new(),
        population,
    }
}

/// One of each backend; the temp dir keeps the SQLite file alive.
fn backends() -> Vec<(Option<tempfile::TempDir>, Box<dyn StorageBackend>)> {
    let dir = tempfile::tempdir().unwrap();
    let memory: Box<dyn StorageBackend> = Box::new(MemoryGeoBackend::embedded());
    let spatial: Box<dyn StorageBackend> =
        Box::new(SpatialIndexBackend::open(dir.path().join("edge.db")).unwrap());
    vec![(None, memory), (Some(dir), spatial)]
}

/// Geo store whose reads or writes can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: EmbeddedGeoStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn check(&self, flag: &AtomicBool) -> geonear::Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(GeoNearError::BackendUnavailable("connection reset".into()));
        }
        Ok(())
    }
}

impl GeoStore for FlakyStore {
    fn ping(&self) -> geonear::Result<()> {
        self.check(&self.fail_reads)
    }

    fn set(&self, key: &str, value: &[u8]) -> geonear::Result<()> {
        self.check(&self.fail_writes)?;
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> geonear::Result<Option<Bytes>> {
        self.check(&self.fail_reads)?;
        self.inner.get(key)
    }

    fn geo_add(&self, set: &str, lng: f64, lat: f64, member: &str) -> geonear::Result<()> {
        self.check(&self.fail_writes)?;
        self.inner.geo_add(set, lng, lat, member)
    }

    fn geo_radius(
        &self,
        set: &str,
        lng: f64,
        lat: f64,
        radius_m: f64,
        count: Option<usize>,
    ) -> geonear::Result<Vec<GeoHit>> {
        self.check(&self.fail_reads)?;
        self.inner.geo_radius(set, lng, lat, radius_m, count)
    }

    fn geo_card(&self, set: &str) -> geonear::Result<usize> {
        self.check(&self.fail_reads)?;
        self.inner.geo_card(set)
    }

    fn count_keys(&self, prefix: &str) -> geonear::Result<usize> {
        self.check(&self.fail_reads)?;
        self.inner.count_keys(prefix)
    }
}

#[test]
fn test_extreme_coordinates() {
    for (_dir, backend) in backends() {
        assert!(backend.add_location(&city("North", 90.0, 0.0, 1)));
        assert!(backend.add_location(&city("South", -90.0, 0.0, 1)));
        assert!(backend.add_location(&city("East", 0.0, 180.0, 1)));
        assert!(backend.add_location(&city("West", 0.0, -180.0, 1)));

        assert!(!backend.add_location(&city("Bad", 90.0001, 0.0, 1)));
        assert!(!backend.add_location(&city("Bad", 0.0, -180.5, 1)));
        assert_eq!(backend.inventory().unwrap().records, 4, "{}", backend.kind());
    }
}

#[test]
fn test_query_near_pole_finds_points_across_it() {
    for (_dir, backend) in backends() {
        assert!(backend.add_location(&city("Alert", 89.5, 10.0, 60)));
        assert!(backend.add_location(&city("Across", 89.5, -170.0, 10)));
        assert!(backend.add_location(&city("Oslo", 59.9111, 10.7528, 1_000_000)));

        // The two polar points are ~111 km apart over the pole.
        let query = NearbyQuery::new(89.5, 10.0).with_distance(200_000.0);
        let results = backend.find_nearby(&query).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.location.city.as_str()).collect();
        assert_eq!(names, ["Alert", "Across"], "{}", backend.kind());
    }
}

#[test]
fn test_query_across_antimeridian() {
    for (_dir, backend) in backends() {
        assert!(backend.add_location(&city("Suva", -18.1416, 178.4419, 93_970)));
        assert!(backend.add_location(&city("Niuatoputapu", -15.96, -173.79, 1_000)));
        assert!(backend.add_location(&city("Apia", -13.8333, -171.7667, 37_708)));

        // Just east of the date line; Suva is ~190 km west of it.
        let query = NearbyQuery::new(-17.5, -179.9).with_distance(300_000.0);
        let results = backend.find_nearby(&query).unwrap();
        assert_eq!(results.len(), 1, "{}", backend.kind());
        assert_eq!(results[0].location.city, "Suva");
    }
}

#[test]
fn test_zero_population_records() {
    for (_dir, backend) in backends() {
        assert!(backend.add_location(&city("Hamlet", 10.0, 10.0, 0)));

        let any = NearbyQuery::new(10.0, 10.0).with_distance(1_000.0);
        assert_eq!(backend.find_nearby(&any).unwrap().len(), 1);

        let populated = any.clone().with_min_population(1);
        assert!(backend.find_nearby(&populated).unwrap().is_empty());
    }
}

#[test]
fn test_empty_backend_returns_empty() {
    for (_dir, backend) in backends() {
        let results = backend.find_nearby(&NearbyQuery::new(0.0, 0.0)).unwrap();
        assert!(results.is_empty());
    }
}

#[test]
fn test_stale_index_entries_are_skipped() {
    init_logging();
    let store = Arc::new(EmbeddedGeoStore::new());
    let backend = MemoryGeoBackend::new(Arc::clone(&store));
    assert!(backend.add_location(&city("Kept", 0.0, 0.0, 5)));

    // An index entry whose value write never landed.
    store.geo_add(GEO_SET_KEY, 0.001, 0.0, "zz__ghst").unwrap();
    assert!(store.get(&format!("{}zz__ghst", LOCATION_PREFIX)).unwrap().is_none());

    let results = backend.find_nearby(&NearbyQuery::new(0.0, 0.0)).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].location.city, "Kept");

    let inventory = backend.inventory().unwrap();
    assert_eq!(inventory.records, 1);
    assert_eq!(inventory.indexed, 2);
}

#[test]
fn test_write_failure_returns_false() {
    init_logging();
    let store = Arc::new(FlakyStore::default());
    let backend = MemoryGeoBackend::new(Arc::clone(&store));

    store.fail_writes.store(true, Ordering::SeqCst);
    assert!(!backend.add_location(&city("Lost", 1.0, 1.0, 1)));

    store.fail_writes.store(false, Ordering::SeqCst);
    assert!(backend.add_location(&city("Saved", 1.0, 1.0, 1)));
}

#[test]
fn test_read_failure_propagates() {
    init_logging();
    let store = Arc::new(FlakyStore::default());
    let backend = MemoryGeoBackend::new(Arc::clone(&store));
    assert!(backend.add_location(&city("Here", 1.0, 1.0, 1)));

    store.fail_reads.store(true, Ordering::SeqCst);
    let err = backend.find_nearby(&NearbyQuery::new(1.0, 1.0)).unwrap_err();
    assert!(err.is_storage_failure());
    assert!(!backend.health_check());
    assert!(backend.inventory().is_err());
}

#[test]
fn test_concurrent_adds_and_queries() {
    for (_dir, backend) in backends() {
        let backend: Arc<dyn StorageBackend> = Arc::from(backend);
        let mut handles = Vec::new();

        for t in 0..4 {
            let backend = Arc::clone(&backend);
            handles.push(thread::spawn(move || {
                for i in 0..25 {
                    let name = format!("t{}x{}", t, i);
                    let lat = t as f64 + i as f64 * 0.01;
                    assert!(backend.add_location(&city(&name, lat, 20.0, i)));
                    let query = NearbyQuery::new(lat, 20.0).with_distance(5_000.0);
                    assert!(!backend.find_nearby(&query).unwrap().is_empty());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let inventory = backend.inventory().unwrap();
        assert_eq!(inventory.records, 100, "{}", backend.kind());
        assert_eq!(inventory.indexed, 100);
    }
}
