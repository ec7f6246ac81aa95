//! Sense descriptors and per-token vision capability aggregation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Precision class of a sense.
///
/// Precise senses can yield `observed` or `concealed`; imprecise senses cap
/// at `hidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Precision {
    Precise,
    Imprecise,
}

/// Kind of sense a creature perceives with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SenseKind {
    Vision,
    Darkvision,
    GreaterDarkvision,
    LowLightVision,
    Hearing,
    Echolocation,
    Scent,
    Tremorsense,
    Lifesense,
    /// Generic precise/imprecise families from homebrew or unusual creatures
    Other(String),
}

impl SenseKind {
    /// Visual senses require line of sight and are suppressed by blinded.
    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            Self::Vision | Self::Darkvision | Self::GreaterDarkvision | Self::LowLightVision
        )
    }

    /// Hearing-family senses are suppressed by deafened.
    pub fn is_hearing_family(&self) -> bool {
        matches!(self, Self::Hearing | Self::Echolocation)
    }

    /// Darkvision of either grade.
    pub fn is_darkvision(&self) -> bool {
        matches!(self, Self::Darkvision | Self::GreaterDarkvision)
    }

    /// Default precision when the stat block does not say.
    pub fn default_precision(&self) -> Precision {
        match self {
            Self::Vision
            | Self::Darkvision
            | Self::GreaterDarkvision
            | Self::LowLightVision
            | Self::Echolocation => Precision::Precise,
            Self::Hearing | Self::Scent | Self::Tremorsense | Self::Lifesense | Self::Other(_) => {
                Precision::Imprecise
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Vision => "vision",
            Self::Darkvision => "darkvision",
            Self::GreaterDarkvision => "greater-darkvision",
            Self::LowLightVision => "low-light-vision",
            Self::Hearing => "hearing",
            Self::Echolocation => "echolocation",
            Self::Scent => "scent",
            Self::Tremorsense => "tremorsense",
            Self::Lifesense => "lifesense",
            Self::Other(name) => name,
        }
    }

    /// Parse a sense slug; unknown slugs become `Other`.
    pub fn parse(slug: &str) -> Self {
        match slug {
            "vision" | "sight" => Self::Vision,
            "darkvision" => Self::Darkvision,
            "greater-darkvision" => Self::GreaterDarkvision,
            "low-light-vision" => Self::LowLightVision,
            "hearing" => Self::Hearing,
            "echolocation" => Self::Echolocation,
            "scent" => Self::Scent,
            "tremorsense" => Self::Tremorsense,
            "lifesense" => Self::Lifesense,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SenseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Range of a sense in feet, or unlimited (hearing, ordinary vision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SenseRange {
    Feet(u32),
    Unlimited,
}

impl SenseRange {
    /// Whether a (pre-rounded) distance in feet is within this range.
    ///
    /// Distance exactly equal to the range is included.
    pub fn contains(&self, distance_feet: u32) -> bool {
        match self {
            Self::Feet(range) => distance_feet <= *range,
            Self::Unlimited => true,
        }
    }

    pub fn feet(&self) -> Option<u32> {
        match self {
            Self::Feet(range) => Some(*range),
            Self::Unlimited => None,
        }
    }
}

/// One sense on a creature's stat block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenseDescriptor {
    pub kind: SenseKind,
    pub precision: Precision,
    pub range: SenseRange,
}

impl SenseDescriptor {
    pub fn new(kind: SenseKind, precision: Precision, range: SenseRange) -> Self {
        Self {
            kind,
            precision,
            range,
        }
    }

    /// A sense with its stat-block-default precision.
    pub fn with_default_precision(kind: SenseKind, range: SenseRange) -> Self {
        let precision = kind.default_precision();
        Self {
            kind,
            precision,
            range,
        }
    }
}

/// Aggregated, condition-adjusted senses of one observer.
///
/// Derived on demand from the host scene; blinded/deafened suppression is
/// already applied, so consumers only range-filter and rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionCapabilities {
    /// Precise senses by kind, post-suppression
    pub precise: HashMap<SenseKind, SenseRange>,
    /// Imprecise senses by kind, post-suppression
    pub imprecise: HashMap<SenseKind, SenseRange>,
    /// Observer has any visual sense at all (pre-suppression)
    pub has_vision: bool,
    pub is_blinded: bool,
    pub is_deafened: bool,
    /// Best darkvision range, if any (None = no darkvision)
    pub darkvision_range: Option<SenseRange>,
    /// Greater darkvision sees through magical darkness
    pub has_greater_darkvision: bool,
}

impl VisionCapabilities {
    /// Empty capability set (the `MissingCapability` fallback).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every usable sense as descriptors, precise first.
    pub fn all_senses(&self) -> Vec<SenseDescriptor> {
        let mut senses: Vec<SenseDescriptor> = self
            .precise
            .iter()
            .map(|(kind, range)| SenseDescriptor::new(kind.clone(), Precision::Precise, *range))
            .collect();
        senses.extend(
            self.imprecise
                .iter()
                .map(|(kind, range)| SenseDescriptor::new(kind.clone(), Precision::Imprecise, *range)),
        );
        senses
    }

    /// Senses whose range reaches `distance_feet` (post-rounding).
    pub fn senses_in_range(&self, distance_feet: u32) -> Vec<SenseDescriptor> {
        self.all_senses()
            .into_iter()
            .filter(|sense| sense.range.contains(distance_feet))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_boundary_is_inclusive() {
        assert!(SenseRange::Feet(30).contains(30));
        assert!(!SenseRange::Feet(30).contains(35));
        assert!(SenseRange::Unlimited.contains(10_000));
    }

    #[test]
    fn test_default_precisions() {
        assert_eq!(SenseKind::Vision.default_precision(), Precision::Precise);
        assert_eq!(SenseKind::Echolocation.default_precision(), Precision::Precise);
        assert_eq!(SenseKind::Scent.default_precision(), Precision::Imprecise);
        assert_eq!(SenseKind::Lifesense.default_precision(), Precision::Imprecise);
    }

    #[test]
    fn test_visual_and_hearing_families() {
        assert!(SenseKind::GreaterDarkvision.is_visual());
        assert!(!SenseKind::Tremorsense.is_visual());
        assert!(SenseKind::Echolocation.is_hearing_family());
        assert!(!SenseKind::Scent.is_hearing_family());
    }

    #[test]
    fn test_parse_unknown_becomes_other() {
        assert_eq!(
            SenseKind::parse("wavesense"),
            SenseKind::Other("wavesense".to_string())
        );
        assert_eq!(SenseKind::parse("vision"), SenseKind::Vision);
    }

    #[test]
    fn test_senses_in_range_filters() {
        let mut caps = VisionCapabilities::empty();
        caps.precise
            .insert(SenseKind::Vision, SenseRange::Unlimited);
        caps.imprecise
            .insert(SenseKind::Scent, SenseRange::Feet(30));

        let reachable = caps.senses_in_range(40);
        assert_eq!(reachable.len(), 1);
        assert_eq!(reachable[0].kind, SenseKind::Vision);
    }
}
