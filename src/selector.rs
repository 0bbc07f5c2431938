//! Startup-time choice between the two storage engines.
//!
//! The selector runs once. In `auto` mode it prefers the memory-geo backend
//! and falls back to the spatial index when the geo server cannot be
//! reached; the fallback is reported through [`SelectedBackend::degraded`].

use crate::config::{MemoryGeoConfig, StorageConfig};
use crate::error::{GeoNearError, Result};
use crate::storage::{SpatialIndexBackend, StorageBackend};
use crate::types::BackendKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// In-memory geo server only; fail if unreachable.
    #[serde(alias = "redis")]
    MemoryGeo,
    /// SQLite spatial index only.
    #[serde(alias = "sqlite")]
    SpatialIndex,
    /// Memory-geo when reachable, spatial index otherwise.
    #[default]
    Auto,
}

impl FromStr for StorageMode {
    type Err = GeoNearError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory-geo" | "redis" => Ok(StorageMode::MemoryGeo),
            "spatial-index" | "sqlite" => Ok(StorageMode::SpatialIndex),
            "auto" => Ok(StorageMode::Auto),
            other => Err(GeoNearError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::MemoryGeo => f.write_str("memory-geo"),
            StorageMode::SpatialIndex => f.write_str("spatial-index"),
            StorageMode::Auto => f.write_str("auto"),
        }
    }
}

/// The backend chosen at startup.
#[derive(Clone)]
pub struct SelectedBackend {
    pub backend: Arc<dyn StorageBackend>,
    /// True when `auto` mode fell back to the spatial index.
    pub degraded: bool,
}

impl SelectedBackend {
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }
}

impl fmt::Debug for SelectedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedBackend")
            .field("kind", &self.kind())
            .field("degraded", &self.degraded)
            .finish()
    }
}

/// Chooses a backend per [`StorageConfig::mode`].
pub struct BackendSelector {
    config: StorageConfig,
}

impl BackendSelector {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Select using the Redis-backed memory-geo backend.
    pub fn select(&self) -> Result<SelectedBackend> {
        self.select_with(connect_memory_geo)
    }

    /// Select using `connect` to build the memory-geo backend.
    ///
    /// A backend returned by `connect` is used only if its health check
    /// passes.
    pub fn select_with<F>(&self, connect: F) -> Result<SelectedBackend>
    where
        F: FnOnce(&MemoryGeoConfig) -> Result<Arc<dyn StorageBackend>>,
    {
        let selected = match self.config.mode {
            StorageMode::SpatialIndex => SelectedBackend {
                backend: self.open_spatial_index()?,
                degraded: false,
            },
            StorageMode::MemoryGeo => SelectedBackend {
                backend: self.connect_healthy(connect)?,
                degraded: false,
            },
            StorageMode::Auto => match self.connect_healthy(connect) {
                Ok(backend) => SelectedBackend {
                    backend,
                    degraded: false,
                },
                Err(e) => {
                    log::warn!(
                        "Memory-geo backend unavailable ({}); falling back to spatial index",
                        e
                    );
                    SelectedBackend {
                        backend: self.open_spatial_index()?,
                        degraded: true,
                    }
                }
            },
        };

        log::info!(
            "Using {} backend (mode: {}{})",
            selected.kind(),
            self.config.mode,
            if selected.degraded { ", degraded" } else { "" }
        );
        Ok(selected)
    }

    fn connect_healthy<F>(&self, connect: F) -> Result<Arc<dyn StorageBackend>>
    where
        F: FnOnce(&MemoryGeoConfig) -> Result<Arc<dyn StorageBackend>>,
    {
        let backend = connect(&self.config.memory_geo).map_err(|e| match e {
            unavailable @ GeoNearError::BackendUnavailable(_) => unavailable,
            other => GeoNearError::BackendUnavailable(other.to_string()),
        })?;

        if !backend.health_check() {
            return Err(GeoNearError::BackendUnavailable(format!(
                "{}:{} failed its health check",
                self.config.memory_geo.host, self.config.memory_geo.port
            )));
        }
        Ok(backend)
    }

    fn open_spatial_index(&self) -> Result<Arc<dyn StorageBackend>> {
        let backend = SpatialIndexBackend::open(&self.config.spatial_index.path)?;
        Ok(Arc::new(backend))
    }
}

#[cfg(feature = "redis")]
fn connect_memory_geo(config: &MemoryGeoConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend = crate::storage::MemoryGeoBackend::connect(config)?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "redis"))]
fn connect_memory_geo(_config: &MemoryGeoConfig) -> Result<Arc<dyn StorageBackend>> {
    Err(GeoNearError::BackendUnavailable(
        "built without the `redis` feature".to_string(),
    ))
}
