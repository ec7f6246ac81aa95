//! d20 check resolution: rolls, margins, and the four degrees of success.
//!
//! PF2e resolves checks as d20 + modifier vs DC with four degrees:
//! beat the DC by 10+ for a critical success, miss by 10+ for a critical
//! failure, and natural 20/1 moves the degree one step (clamped).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Four degrees of success for a resolved check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DegreeOfSuccess {
    CriticalFailure,
    Failure,
    Success,
    CriticalSuccess,
}

impl DegreeOfSuccess {
    /// Upgrade the degree by one step (e.g., nat 20).
    pub fn upgrade(self) -> Self {
        match self {
            Self::CriticalFailure => Self::Failure,
            Self::Failure => Self::Success,
            Self::Success | Self::CriticalSuccess => Self::CriticalSuccess,
        }
    }

    /// Downgrade the degree by one step (e.g., nat 1).
    pub fn downgrade(self) -> Self {
        match self {
            Self::CriticalSuccess => Self::Success,
            Self::Success => Self::Failure,
            Self::Failure | Self::CriticalFailure => Self::CriticalFailure,
        }
    }

    /// Shift by `steps` (positive = toward critical success), clamped.
    ///
    /// Feat outcome shifts arrive pre-clamped to [-2, +2]; this clamps the
    /// walk at the ladder ends regardless.
    pub fn shifted(self, steps: i32) -> Self {
        let mut degree = self;
        if steps >= 0 {
            for _ in 0..steps.min(3) {
                degree = degree.upgrade();
            }
        } else {
            for _ in 0..(-steps).min(3) {
                degree = degree.downgrade();
            }
        }
        degree
    }

    /// At least a plain success.
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Success | Self::CriticalSuccess)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CriticalFailure => "criticalFailure",
            Self::Failure => "failure",
            Self::Success => "success",
            Self::CriticalSuccess => "criticalSuccess",
        }
    }
}

/// Determine the degree of success for a resolved total against a DC.
pub fn determine_degree(total: i32, dc: i32, is_nat_20: bool, is_nat_1: bool) -> DegreeOfSuccess {
    let diff = total - dc;

    let base = if diff >= 0 {
        DegreeOfSuccess::Success
    } else {
        DegreeOfSuccess::Failure
    };

    // Apply the +/- 10 rule
    let adjusted = if diff >= 10 {
        base.upgrade()
    } else if diff <= -10 {
        base.downgrade()
    } else {
        base
    };

    // Natural 20/1 adjustments
    if is_nat_20 {
        adjusted.upgrade()
    } else if is_nat_1 {
        adjusted.downgrade()
    } else {
        adjusted
    }
}

/// A resolved d20 check: the die face, everything added on top, and the total.
///
/// The engine never rolls inside a resolution path; callers hand it a
/// `CheckRoll` (from the host's dice, or from `engine`'s roll helper) so
/// outcomes stay reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRoll {
    /// Natural d20 face
    pub die: i32,
    /// Sum of all modifiers applied to the die
    pub modifier: i32,
    /// Final total (die + modifier)
    pub total: i32,
}

impl CheckRoll {
    /// Build from a die face and modifier.
    pub fn new(die: i32, modifier: i32) -> Result<Self, DomainError> {
        if !(1..=20).contains(&die) {
            return Err(DomainError::validation(format!(
                "d20 face must be 1-20, got {die}"
            )));
        }
        Ok(Self {
            die,
            modifier,
            total: die + modifier,
        })
    }

    /// Build from a known total and die face (host-originated rolls).
    pub fn from_total(total: i32, die: i32) -> Result<Self, DomainError> {
        if !(1..=20).contains(&die) {
            return Err(DomainError::validation(format!(
                "d20 face must be 1-20, got {die}"
            )));
        }
        Ok(Self {
            die,
            modifier: total - die,
            total,
        })
    }

    pub fn is_natural_20(&self) -> bool {
        self.die == 20
    }

    pub fn is_natural_1(&self) -> bool {
        self.die == 1
    }

    /// Margin over a DC.
    pub fn margin(&self, dc: i32) -> i32 {
        self.total - dc
    }

    /// Degree of success against a DC, nat-20/nat-1 steps included.
    pub fn degree_against(&self, dc: i32) -> DegreeOfSuccess {
        determine_degree(self.total, dc, self.is_natural_20(), self.is_natural_1())
    }

    /// Same die, different modifier sum (cover-bonus swaps re-band this way).
    pub fn with_modifier(&self, modifier: i32) -> Self {
        Self {
            die: self.die,
            modifier,
            total: self.die + modifier,
        }
    }
}
