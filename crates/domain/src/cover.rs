//! Cover states and their stealth bonuses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Degree of cover between an observer and a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoverState {
    None,
    Lesser,
    Standard,
    Greater,
}

impl CoverState {
    /// Circumstance bonus to Stealth granted by this cover.
    pub fn stealth_bonus(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Lesser => 1,
            Self::Standard => 2,
            Self::Greater => 4,
        }
    }

    /// One step more cover, saturating at greater.
    pub fn stepped_up(self) -> Self {
        match self {
            Self::None => Self::Lesser,
            Self::Lesser => Self::Standard,
            Self::Standard | Self::Greater => Self::Greater,
        }
    }

    /// Standard or greater cover (the Sneak/Hide positional threshold).
    pub fn is_standard_or_better(&self) -> bool {
        matches!(self, Self::Standard | Self::Greater)
    }

    /// Any cover at all.
    pub fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lesser => "lesser",
            Self::Standard => "standard",
            Self::Greater => "greater",
        }
    }

    pub fn parse(input: &str) -> Result<Self, DomainError> {
        match input {
            "none" => Ok(Self::None),
            "lesser" => Ok(Self::Lesser),
            "standard" => Ok(Self::Standard),
            "greater" => Ok(Self::Greater),
            other => Err(DomainError::parse(format!("Unknown cover state: '{other}'"))),
        }
    }
}

impl fmt::Display for CoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stealth_bonuses() {
        assert_eq!(CoverState::None.stealth_bonus(), 0);
        assert_eq!(CoverState::Lesser.stealth_bonus(), 1);
        assert_eq!(CoverState::Standard.stealth_bonus(), 2);
        assert_eq!(CoverState::Greater.stealth_bonus(), 4);
    }

    #[test]
    fn test_step_up_saturates() {
        assert_eq!(CoverState::None.stepped_up(), CoverState::Lesser);
        assert_eq!(CoverState::Standard.stepped_up(), CoverState::Greater);
        assert_eq!(CoverState::Greater.stepped_up(), CoverState::Greater);
    }

    #[test]
    fn test_ordering() {
        assert!(CoverState::Greater > CoverState::Standard);
        assert!(CoverState::Lesser < CoverState::Standard);
    }

    #[test]
    fn test_threshold() {
        assert!(!CoverState::Lesser.is_standard_or_better());
        assert!(CoverState::Standard.is_standard_or_better());
    }
}
