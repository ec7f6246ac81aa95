//! Visibility states for observer/target pairs.
//!
//! The four concrete states form a ladder from fully seen to fully unseen.
//! `Avs` is a sentinel, not a state: it means "no override pins this pair,
//! let the auto-visibility calculator decide". It is accepted from user
//! selections as a *clear* signal and must never be persisted as a result.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Detection state of a target from one observer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityState {
    /// Fully perceived by a precise sense
    Observed,
    /// Perceived, but with a miss chance (precise sense through interference)
    Concealed,
    /// Location known, target not directly perceived (imprecise cap)
    Hidden,
    /// Neither perceived nor located
    Undetected,
    /// Sentinel: yield the pair to the auto-visibility calculator
    Avs,
}

impl VisibilityState {
    /// Detection quality rank, higher is better for the observer.
    ///
    /// `None` for the `Avs` sentinel, which has no quality of its own.
    pub fn quality(&self) -> Option<u8> {
        match self {
            Self::Observed => Some(3),
            Self::Concealed => Some(2),
            Self::Hidden => Some(1),
            Self::Undetected => Some(0),
            Self::Avs => None,
        }
    }

    /// True for the four concrete detection states.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::Avs)
    }

    /// True when the observer knows at least the target's location.
    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Observed | Self::Concealed | Self::Hidden)
    }

    /// Pick the better detection state for the observer.
    ///
    /// `Avs` never wins a comparison; comparing two sentinels yields `Avs`.
    pub fn better_of(self, other: Self) -> Self {
        match (self.quality(), other.quality()) {
            (Some(a), Some(b)) => {
                if a >= b {
                    self
                } else {
                    other
                }
            }
            (Some(_), None) => self,
            (None, Some(_)) => other,
            (None, None) => Self::Avs,
        }
    }

    /// Cap this state at `ceiling` (worse of the two, observer's perspective).
    pub fn capped_at(self, ceiling: Self) -> Self {
        match (self.quality(), ceiling.quality()) {
            (Some(a), Some(b)) if a > b => ceiling,
            _ => self,
        }
    }

    /// One step toward greater concealment (Observed -> ... -> Undetected).
    pub fn step_toward_concealment(self) -> Self {
        match self {
            Self::Observed => Self::Concealed,
            Self::Concealed => Self::Hidden,
            Self::Hidden | Self::Undetected => Self::Undetected,
            Self::Avs => Self::Avs,
        }
    }

    /// Stable string form used in flags and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observed => "observed",
            Self::Concealed => "concealed",
            Self::Hidden => "hidden",
            Self::Undetected => "undetected",
            Self::Avs => "avs",
        }
    }

    /// Parse the stable string form.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        match input {
            "observed" => Ok(Self::Observed),
            "concealed" => Ok(Self::Concealed),
            "hidden" => Ok(Self::Hidden),
            "undetected" => Ok(Self::Undetected),
            "avs" => Ok(Self::Avs),
            other => Err(DomainError::parse(format!(
                "Unknown visibility state: '{other}'"
            ))),
        }
    }
}

impl fmt::Display for VisibilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visibility of an inanimate wall for one observer.
///
/// Hidden walls are Seek-discoverable; everything else is simply observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WallVisibility {
    Observed,
    Hidden,
}

impl WallVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observed => "observed",
            Self::Hidden => "hidden",
        }
    }
}
