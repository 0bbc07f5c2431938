//! Pure computations shared by the backends.
//!
//! - [`ids`]: deterministic location ids
//! - [`distance`]: spherical distance and bounding boxes
//! - [`validation`]: coordinate and query checks
//!
//! Nothing here touches storage.

pub mod distance;
pub mod ids;
pub mod validation;
