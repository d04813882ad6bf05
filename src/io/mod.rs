//! IO modules - external system interfaces
//!
//! - `lidar` - Serial distance sensor (frame decoding, bounded reads)
//! - `particle` - Cloud API for the in-zone flag and the status publish

pub mod lidar;
pub mod particle;

// Re-export commonly used types
pub use lidar::{DistanceSensor, SensorError, SensorReader, SerialLink, TokioSerialLink};
pub use particle::{ParticleClient, RemoteError, ZoneRemote};
