//! Positions and PF2e distance rounding.

use serde::{Deserialize, Serialize};

/// A point in scene space, in feet, with elevation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub elevation: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, elevation: f64) -> Self {
        Self { x, y, elevation }
    }

    /// Euclidean distance in feet, elevation included.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.elevation - other.elevation;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Round a raw distance down to the PF2e 5-foot increment.
///
/// Sense ranges are compared against this rounded value, so a target at
/// 32 ft is "30 ft away" for a 30-ft sense.
pub fn round_down_to_increment(distance_feet: f64) -> u32 {
    if distance_feet <= 0.0 {
        return 0;
    }
    let increments = (distance_feet / 5.0).floor();
    (increments * 5.0) as u32
}
