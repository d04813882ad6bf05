//! Domain models - core types shared by the sensor, remote and loop
//!
//! - `DistanceCm` - one validated lidar reading
//! - `OccupancyStatus` - tri-state parking availability
//! - `Thresholds` - classification boundaries

pub mod types;

pub use types::{DistanceCm, OccupancyStatus, Thresholds};
