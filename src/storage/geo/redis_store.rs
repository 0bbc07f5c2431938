//! Redis implementation of [`GeoStore`].

use super::{GeoHit, GeoStore};
use crate::config::MemoryGeoConfig;
use crate::error::{GeoNearError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use redis::{Client, Connection, IntoConnectionInfo, RedisResult};
use std::time::Duration;

const SCAN_BATCH: usize = 100;

/// Upper bound on the pause between connect attempts.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Redis-backed geo store.
///
/// The connection is opened lazily on the first command and kept behind a
/// mutex. Every command runs under the configured read/write timeout, so a
/// server that accepts but never answers fails the command instead of
/// blocking it. A connection that drops or times out is discarded; the next
/// command reconnects.
pub struct RedisGeoStore {
    client: Client,
    connection: Mutex<Option<Connection>>,
    connect_timeout: Duration,
    command_timeout: Duration,
    connect_attempts: u32,
}

impl RedisGeoStore {
    /// Build a store for the configured server. No network I/O happens until
    /// the first command.
    pub fn new(config: &MemoryGeoConfig) -> Result<Self> {
        let mut info = (config.host.clone(), config.port).into_connection_info()?;
        if !config.password.is_empty() {
            info.redis.password = Some(config.password.clone());
        }

        Ok(Self {
            client: Client::open(info)?,
            connection: Mutex::new(None),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            command_timeout: Duration::from_millis(config.command_timeout_ms.max(1)),
            connect_attempts: config.connect_attempts.max(1),
        })
    }

    fn connect(&self) -> Result<Connection> {
        let mut attempt = 1;
        loop {
            match self.client.get_connection_with_timeout(self.connect_timeout) {
                Ok(connection) => {
                    // The client clears its handshake timeout once connected.
                    connection.set_read_timeout(Some(self.command_timeout))?;
                    connection.set_write_timeout(Some(self.command_timeout))?;
                    return Ok(connection);
                }
                Err(e) if attempt < self.connect_attempts => {
                    let backoff = (Duration::from_millis(200) * attempt).min(MAX_RETRY_BACKOFF);
                    log::debug!(
                        "Redis connect attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        self.connect_attempts,
                        e,
                        backoff
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(GeoNearError::BackendUnavailable(format!(
                        "Redis unreachable after {} attempt(s): {}",
                        attempt, e
                    )));
                }
            }
        }
    }

    fn with_connection<T, F>(&self, command: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> RedisResult<T>,
    {
        let mut guard = self.connection.lock();
        let connection = match guard.take() {
            Some(connection) => connection,
            None => self.connect()?,
        };
        let connection = guard.insert(connection);

        match command(connection) {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() || e.is_timeout() {
                    *guard = None;
                }
                Err(e.into())
            }
        }
    }
}

impl GeoStore for RedisGeoStore {
    fn ping(&self) -> Result<()> {
        self.with_connection(|conn| redis::cmd("PING").query::<String>(conn))?;
        Ok(())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_connection(|conn| redis::cmd("SET").arg(key).arg(value).query::<()>(conn))
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let value = self.with_connection(|conn| {
            redis::cmd("GET").arg(key).query::<Option<Vec<u8>>>(conn)
        })?;
        Ok(value.map(Bytes::from))
    }

    fn geo_add(&self, set: &str, lng: f64, lat: f64, member: &str) -> Result<()> {
        self.with_connection(|conn| {
            redis::cmd("GEOADD")
                .arg(set)
                .arg(lng)
                .arg(lat)
                .arg(member)
                .query::<i64>(conn)
        })?;
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
        let mut cmd = redis::cmd("GEORADIUS");
        cmd.arg(set)
            .arg(lng)
            .arg(lat)
            .arg(radius_m)
            .arg("m")
            .arg("WITHDIST");
        if let Some(count) = count {
            cmd.arg("COUNT").arg(count);
        }
        cmd.arg("ASC");

        let rows = self.with_connection(|conn| cmd.query::<Vec<(String, f64)>>(conn))?;
        Ok(rows
            .into_iter()
            .map(|(member, distance_m)| GeoHit { member, distance_m })
            .collect())
    }

    fn geo_card(&self, set: &str) -> Result<usize> {
        self.with_connection(|conn| redis::cmd("ZCARD").arg(set).query::<usize>(conn))
    }

    fn count_keys(&self, prefix: &str) -> Result<usize> {
        let pattern = format!("{}*", prefix);
        self.with_connection(|conn| {
            let mut total = 0;
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query(conn)?;
                total += keys.len();
                if next == 0 {
                    return Ok(total);
                }
                cursor = next;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Instant;

    fn unreachable_config() -> MemoryGeoConfig {
        MemoryGeoConfig {
            host: "127.0.0.1".to_string(),
            // Port 1 is reserved (tcpmux) and closed on test machines.
            port: 1,
            password: "secret".to_string(),
            connect_timeout_ms: 200,
            command_timeout_ms: 200,
            connect_attempts: 2,
        }
    }

    #[test]
    fn test_construction_does_not_connect() {
        assert!(RedisGeoStore::new(&unreachable_config()).is_ok());
    }

    #[test]
    fn test_unreachable_server_reports_unavailable() {
        let store = RedisGeoStore::new(&unreachable_config()).unwrap();
        let err = store.ping().unwrap_err();
        assert!(matches!(err, GeoNearError::BackendUnavailable(_)));
        // Reads surface the failure too.
        assert!(store.get("loc:any").is_err());
    }

    #[test]
    fn test_silent_server_times_out() {
        // Accepts connections and holds them open without ever replying.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => held.push(stream),
                    Err(_) => break,
                }
            }
        });

        let config = MemoryGeoConfig {
            host: "127.0.0.1".to_string(),
            port,
            password: String::new(),
            connect_timeout_ms: 500,
            command_timeout_ms: 500,
            connect_attempts: 2,
        };
        let store = RedisGeoStore::new(&config).unwrap();

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let started = Instant::now();
            let result = store.ping();
            let _ = tx.send((result, started.elapsed()));
        });

        let (result, elapsed) = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("ping against a silent server must not block");
        let err = result.unwrap_err();
        assert!(err.is_storage_failure());
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }
}
