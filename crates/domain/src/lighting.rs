//! Lighting levels and darkness interference along sight lines.

use serde::{Deserialize, Serialize};

/// Ambient light level at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LightLevel {
    Bright,
    Dim,
    Darkness,
}

impl LightLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bright => "bright",
            Self::Dim => "dim",
            Self::Darkness => "darkness",
        }
    }
}

/// Light sample at a target's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightingSample {
    pub level: LightLevel,
    /// Spell rank of a darkness effect covering the point (0 = mundane)
    pub darkness_rank: u8,
    /// Point lies inside an explicit darkness source region
    pub is_darkness_source: bool,
}

impl Default for LightingSample {
    fn default() -> Self {
        Self::bright()
    }
}

impl LightingSample {
    pub fn bright() -> Self {
        Self {
            level: LightLevel::Bright,
            darkness_rank: 0,
            is_darkness_source: false,
        }
    }

    pub fn dim() -> Self {
        Self {
            level: LightLevel::Dim,
            darkness_rank: 0,
            is_darkness_source: false,
        }
    }

    pub fn darkness(rank: u8) -> Self {
        Self {
            level: LightLevel::Darkness,
            darkness_rank: rank,
            is_darkness_source: rank > 0,
        }
    }

    /// Magical darkness (rank 1+), which plain darkvision cannot pierce
    /// at rank 4 and above.
    pub fn is_magical_darkness(&self) -> bool {
        self.level == LightLevel::Darkness && self.darkness_rank > 0
    }
}

/// Darkness crossing the ray between observer and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DarknessRay {
    pub crosses_darkness: bool,
    /// Highest darkness rank crossed (0 when mundane or none)
    pub rank: u8,
}

impl DarknessRay {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn crossing(rank: u8) -> Self {
        Self {
            crosses_darkness: true,
            rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magical_darkness_requires_rank() {
        assert!(LightingSample::darkness(4).is_magical_darkness());
        assert!(!LightingSample::darkness(0).is_magical_darkness());
        assert!(!LightingSample::dim().is_magical_darkness());
    }

    #[test]
    fn test_clear_ray() {
        let ray = DarknessRay::clear();
        assert!(!ray.crosses_darkness);
        assert_eq!(ray.rank, 0);
    }
}
