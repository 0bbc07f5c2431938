//! Configuration for geonear
//!
//! Settings come from a JSON or TOML document, with every field optional,
//! and can be overlaid with environment variables afterwards.
use crate::error::{GeoNearError, Result};
use crate::selector::StorageMode;
use serde::de::Error;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend selection and per-backend settings
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub mode: StorageMode,

    #[serde(default)]
    pub memory_geo: MemoryGeoConfig,

    #[serde(default)]
    pub spatial_index: SpatialIndexConfig,
}

/// Connection settings for the in-memory geo server
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryGeoConfig {
    #[serde(default = "MemoryGeoConfig::default_host")]
    pub host: String,

    #[serde(default = "MemoryGeoConfig::default_port")]
    pub port: u16,

    /// Empty means no authentication
    #[serde(default)]
    pub password: String,

    #[serde(default = "MemoryGeoConfig::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read/write timeout applied to every command, health checks included
    #[serde(default = "MemoryGeoConfig::default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Connection attempts before the server is reported unavailable
    #[serde(default = "MemoryGeoConfig::default_connect_attempts")]
    pub connect_attempts: u32,
}

impl MemoryGeoConfig {
    fn default_host() -> String {
        "localhost".to_string()
    }

    const fn default_port() -> u16 {
        6379
    }

    const fn default_connect_timeout_ms() -> u64 {
        1000
    }

    const fn default_command_timeout_ms() -> u64 {
        2000
    }

    const fn default_connect_attempts() -> u32 {
        3
    }
}

impl Default for MemoryGeoConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            password: String::new(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            command_timeout_ms: Self::default_command_timeout_ms(),
            connect_attempts: Self::default_connect_attempts(),
        }
    }
}

/// Location of the SQLite database
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpatialIndexConfig {
    #[serde(default = "SpatialIndexConfig::default_path")]
    pub path: PathBuf,
}

impl SpatialIndexConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("data/locations.db")
    }
}

impl Default for SpatialIndexConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

impl Config {
    pub fn with_mode(mut self, mode: StorageMode) -> Self {
        self.storage.mode = mode;
        self
    }

    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.spatial_index.path = path.into();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let memory_geo = &self.storage.memory_geo;
        if memory_geo.host.trim().is_empty() {
            return Err("Redis host must not be empty".to_string());
        }

        if memory_geo.port == 0 {
            return Err("Redis port must be greater than zero".to_string());
        }

        if memory_geo.connect_timeout_ms == 0 || memory_geo.command_timeout_ms == 0 {
            return Err("Redis timeouts must be greater than zero".to_string());
        }

        if memory_geo.connect_attempts == 0 {
            return Err("Connect attempts must be greater than zero".to_string());
        }

        if self.storage.spatial_index.path.as_os_str().is_empty() {
            return Err("SQLite path must not be empty".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Read a config file; `.toml` files are parsed as TOML, anything else
    /// as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "toml")]
            Some("toml") => Self::from_toml(&text).map_err(|e| GeoNearError::Config(e.to_string())),
            #[cfg(not(feature = "toml"))]
            Some("toml") => Err(GeoNearError::Config(
                "TOML configuration requires the `toml` feature".to_string(),
            )),
            _ => Self::from_json(&text).map_err(|e| GeoNearError::Config(e.to_string())),
        }
    }

    /// Overlay settings from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay settings from `lookup`, which maps a variable name to its
    /// value. Recognized: `STORAGE_MODE`, `REDIS_HOST`, `REDIS_PORT`,
    /// `REDIS_PASSWORD`, `SQLITE_PATH`.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("STORAGE_MODE") {
            self.storage.mode = mode.parse()?;
        }
        if let Some(host) = lookup("REDIS_HOST") {
            self.storage.memory_geo.host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            self.storage.memory_geo.port = port.trim().parse().map_err(|_| {
                GeoNearError::Config(format!("REDIS_PORT is not a valid port: {:?}", port))
            })?;
        }
        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.storage.memory_geo.password = password;
        }
        if let Some(path) = lookup("SQLITE_PATH") {
            self.storage.spatial_index.path = PathBuf::from(path);
        }

        self.validate().map_err(GeoNearError::Config)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.storage.mode, StorageMode::Auto);
        assert_eq!(config.storage.memory_geo.host, "localhost");
        assert_eq!(config.storage.memory_geo.port, 6379);
        assert!(config.storage.memory_geo.password.is_empty());
        assert_eq!(
            config.storage.spatial_index.path,
            PathBuf::from("data/locations.db")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default()
            .with_mode(StorageMode::SpatialIndex)
            .with_sqlite_path("/tmp/cities.db");

        let json = config.to_json().unwrap();
        let deserialized = Config::from_json(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            Config::from_json(r#"{"storage": {"mode": "redis", "memory_geo": {"port": 6380}}}"#)
                .unwrap();
        assert_eq!(config.storage.mode, StorageMode::MemoryGeo);
        assert_eq!(config.storage.memory_geo.port, 6380);
        assert_eq!(config.storage.memory_geo.host, "localhost");
        assert_eq!(config.storage.memory_geo.connect_attempts, 3);
        assert_eq!(config.storage.memory_geo.command_timeout_ms, 2000);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Config::from_json(r#"{"storage": {"engine": "sqlite"}}"#).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_json(r#"{"storage": {"memory_geo": {"port": 0}}}"#).is_err());
        assert!(
            Config::from_json(r#"{"storage": {"memory_geo": {"connect_attempts": 0}}}"#).is_err()
        );
        assert!(Config::from_json(r#"{"storage": {"spatial_index": {"path": ""}}}"#).is_err());
        assert!(
            Config::from_json(r#"{"storage": {"memory_geo": {"command_timeout_ms": 0}}}"#).is_err()
        );
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_config_toml() {
        let toml_str = r#"
            [storage]
            mode = "spatial-index"

            [storage.spatial_index]
            path = "cities.db"
        "#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.storage.mode, StorageMode::SpatialIndex);
        assert_eq!(config.storage.spatial_index.path, PathBuf::from("cities.db"));

        let round_trip = Config::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(round_trip, config);
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("STORAGE_MODE", "sqlite"),
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6390"),
            ("REDIS_PASSWORD", "hunter2"),
            ("SQLITE_PATH", "/var/lib/geonear/locations.db"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .apply_env_from(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage.mode, StorageMode::SpatialIndex);
        assert_eq!(config.storage.memory_geo.host, "cache.internal");
        assert_eq!(config.storage.memory_geo.port, 6390);
        assert_eq!(config.storage.memory_geo.password, "hunter2");
        assert_eq!(
            config.storage.spatial_index.path,
            PathBuf::from("/var/lib/geonear/locations.db")
        );
    }

    #[test]
    fn test_env_overlay_rejects_bad_values() {
        let bad_port = Config::default().apply_env_from(|name| {
            (name == "REDIS_PORT").then(|| "not-a-port".to_string())
        });
        assert!(matches!(bad_port, Err(GeoNearError::Config(_))));

        let bad_mode = Config::default()
            .apply_env_from(|name| (name == "STORAGE_MODE").then(|| "postgres".to_string()));
        assert!(matches!(bad_mode, Err(GeoNearError::InvalidMode(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geonear.json");
        std::fs::write(&path, r#"{"storage": {"mode": "memory-geo"}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.mode, StorageMode::MemoryGeo);

        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(GeoNearError::Io(_))
        ));
    }
}
