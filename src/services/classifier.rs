//! Distance to parking status classification

use crate::domain::types::{DistanceCm, OccupancyStatus, Thresholds};

/// Map one reading to a parking status
///
/// - beyond `nothing_cm`: nothing between us and the far side of the road
/// - beyond `traffic_cm`: a car stopped in traffic, but the space itself is free
/// - otherwise: the space is taken
pub fn classify(distance: DistanceCm, thresholds: &Thresholds) -> OccupancyStatus {
    if distance.0 > thresholds.nothing_cm {
        OccupancyStatus::FarClear
    } else if distance.0 > thresholds.traffic_cm {
        OccupancyStatus::NearClearWithObstruction
    } else {
        OccupancyStatus::Occupied
    }
}
