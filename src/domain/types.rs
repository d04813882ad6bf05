//! Shared types for the parking spotter

use serde::{Deserialize, Serialize};

/// Distance reported by the lidar, in centimeters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DistanceCm(pub u16);

impl std::fmt::Display for DistanceCm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parking availability in front of the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupancyStatus {
    /// Space free, nothing between the sensor and the far side of the road
    FarClear,
    /// Space free, but a car is stopped in traffic on our side
    NearClearWithObstruction,
    /// Something is parked in the space
    Occupied,
}

impl OccupancyStatus {
    /// Tag sent to the remote status function
    pub fn as_tag(&self) -> &'static str {
        match self {
            OccupancyStatus::FarClear => "NOTHING",
            OccupancyStatus::NearClearWithObstruction => "TRAFFIC",
            OccupancyStatus::Occupied => "NO_PARK",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OccupancyStatus::FarClear => "far_clear",
            OccupancyStatus::NearClearWithObstruction => "near_clear_with_obstruction",
            OccupancyStatus::Occupied => "occupied",
        }
    }
}

/// Classification boundaries, in centimeters
///
/// `traffic_cm` is the distance to a car stopped in traffic on our side of the road,
/// `nothing_cm` the distance to traffic on the far side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub traffic_cm: u16,
    pub nothing_cm: u16,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { traffic_cm: 600, nothing_cm: 800 }
    }
}
