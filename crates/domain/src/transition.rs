//! Position snapshots and start/end transitions for movement actions.

use serde::{Deserialize, Serialize};

use crate::cover::CoverState;
use crate::lighting::LightLevel;
use crate::visibility::VisibilityState;

/// Snapshot of one token's stealth-relevant situation at a point in time,
/// from a single observer's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionState {
    pub effective_visibility: VisibilityState,
    pub cover_state: CoverState,
    pub distance_feet: f64,
    pub lighting_conditions: LightLevel,
    pub stealth_bonus: i32,
}

impl PositionState {
    /// Stealth favorability score; higher is better for the one sneaking.
    fn stealth_score(&self) -> i32 {
        let visibility_weight = match self.effective_visibility {
            VisibilityState::Observed => 0,
            VisibilityState::Concealed => 1,
            VisibilityState::Hidden => 2,
            VisibilityState::Undetected => 3,
            VisibilityState::Avs => 0,
        };
        visibility_weight * 10 + self.cover_state.stealth_bonus()
    }
}

/// How a transition changed the sneaker's situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
    Improved,
    Worsened,
    Unchanged,
}

/// A start-to-end movement transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionTransition {
    pub start: PositionState,
    pub end: PositionState,
    pub has_changed: bool,
    pub transition_kind: TransitionKind,
}

impl PositionTransition {
    pub fn between(start: PositionState, end: PositionState) -> Self {
        let has_changed = start != end;
        let transition_kind = match end.stealth_score().cmp(&start.stealth_score()) {
            std::cmp::Ordering::Greater => TransitionKind::Improved,
            std::cmp::Ordering::Less => TransitionKind::Worsened,
            std::cmp::Ordering::Equal => TransitionKind::Unchanged,
        };
        Self {
            start,
            end,
            has_changed,
            transition_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(visibility: VisibilityState, cover: CoverState) -> PositionState {
        PositionState {
            effective_visibility: visibility,
            cover_state: cover,
            distance_feet: 20.0,
            lighting_conditions: LightLevel::Bright,
            stealth_bonus: cover.stealth_bonus(),
        }
    }

    #[test]
    fn test_gaining_cover_improves() {
        let transition = PositionTransition::between(
            state(VisibilityState::Hidden, CoverState::None),
            state(VisibilityState::Hidden, CoverState::Standard),
        );
        assert_eq!(transition.transition_kind, TransitionKind::Improved);
        assert!(transition.has_changed);
    }

    #[test]
    fn test_becoming_observed_worsens() {
        let transition = PositionTransition::between(
            state(VisibilityState::Hidden, CoverState::Standard),
            state(VisibilityState::Observed, CoverState::Greater),
        );
        assert_eq!(transition.transition_kind, TransitionKind::Worsened);
    }

    #[test]
    fn test_identical_states_unchanged() {
        let snapshot = state(VisibilityState::Undetected, CoverState::Greater);
        let transition = PositionTransition::between(snapshot, snapshot);
        assert_eq!(transition.transition_kind, TransitionKind::Unchanged);
        assert!(!transition.has_changed);
    }
}
