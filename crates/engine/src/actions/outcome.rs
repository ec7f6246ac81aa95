//! Action outcome rows.
//!
//! Every resolver produces one row per (actor, counterpart) pair. Rows are
//! plain values: dialogs may veto or override them, the applier turns them
//! into override writes, and revert restores exactly what a row displaced.

use serde::{Deserialize, Serialize};

use visioner_domain::{
    CheckRoll, CoverState, DegreeOfSuccess, OverrideFlag, OverrideSource, PositionTransition,
    SenseKind, TokenId, VisibilityState, WallId, WallVisibility,
};

/// Typed non-error gates a subject can hit during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeGate {
    /// No sense reaches the subject at this distance
    OutOfRange { sense: Option<SenseKind> },
    /// The best sense cannot detect this kind of target
    UnmetConditions { sense: SenseKind, reason: String },
    /// Hazard/loot requires a higher Perception proficiency rank
    NoProficiency { required_rank: u8 },
}

/// One observer/target resolution row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRow {
    /// Direction the override write will use
    pub observer_id: TokenId,
    pub target_id: TokenId,
    /// Display name of the row's counterpart token
    pub counterpart_name: String,
    pub source: OverrideSource,
    pub dc: i32,
    /// Absent for rollless resolutions (free Sneak, Point Out)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<CheckRoll>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degree: Option<DegreeOfSuccess>,
    pub old_visibility: VisibilityState,
    pub new_visibility: VisibilityState,
    /// Dialog-chosen replacement for `new_visibility`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_state: Option<VisibilityState>,
    pub has_actionable_change: bool,
    pub feat_notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_transition: Option<PositionTransition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_cover: Option<CoverState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_sense: Option<SenseKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<OutcomeGate>,
    /// Override displaced by this row, for exact revert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_override: Option<OverrideFlag>,
    /// Sneaky-family deferral: excluded from Apply All
    pub deferred: bool,
    /// Diversion critical success: host applies off-guard
    pub off_guard: bool,
    /// Positional prerequisites were satisfied (re-banding keeps forced
    /// results forced)
    pub prerequisites_met: bool,
}

impl OutcomeRow {
    /// The state Apply will persist: the dialog override when present,
    /// otherwise the computed result.
    pub fn effective_new_state(&self) -> VisibilityState {
        self.override_state.unwrap_or(self.new_visibility)
    }

    /// Whether applying this row would change anything.
    pub fn recompute_actionable(&mut self) {
        let effective = self.effective_new_state();
        self.has_actionable_change = effective.is_concrete() && effective != self.old_visibility
            || effective == VisibilityState::Avs && self.previous_override.is_some();
    }
}

/// A hidden-wall Seek row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallOutcomeRow {
    pub seeker_id: TokenId,
    pub wall_id: WallId,
    pub dc: i32,
    pub roll: CheckRoll,
    pub degree: DegreeOfSuccess,
    pub old_state: WallVisibility,
    pub new_state: WallVisibility,
    /// Linked walls that share the discovery
    pub connected_walls: Vec<WallId>,
}

impl WallOutcomeRow {
    pub fn discovered(&self) -> bool {
        self.old_state == WallVisibility::Hidden && self.new_state == WallVisibility::Observed
    }
}

/// Result of a bulk apply/revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkOutcome {
    Applied { count: usize },
    Reverted { count: usize },
    /// Nothing actionable; the host tells the user
    NoChanges,
    /// Cancelled between batches; earlier batches stay applied
    Cancelled { completed: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(old: VisibilityState, new: VisibilityState) -> OutcomeRow {
        OutcomeRow {
            observer_id: TokenId::new(),
            target_id: TokenId::new(),
            counterpart_name: "guard".to_string(),
            source: OverrideSource::SneakAction,
            dc: 18,
            roll: Some(CheckRoll::new(15, 6).expect("valid roll")),
            margin: Some(3),
            degree: Some(DegreeOfSuccess::Success),
            old_visibility: old,
            new_visibility: new,
            override_state: None,
            has_actionable_change: false,
            feat_notes: Vec::new(),
            position_transition: None,
            auto_cover: None,
            detection_sense: None,
            gate: None,
            previous_override: None,
            deferred: false,
            off_guard: false,
            prerequisites_met: true,
        }
    }

    #[test]
    fn test_actionable_when_state_changes() {
        let mut outcome = row(VisibilityState::Hidden, VisibilityState::Undetected);
        outcome.recompute_actionable();
        assert!(outcome.has_actionable_change);

        let mut outcome = row(VisibilityState::Hidden, VisibilityState::Hidden);
        outcome.recompute_actionable();
        assert!(!outcome.has_actionable_change);
    }

    #[test]
    fn test_dialog_override_wins() {
        let mut outcome = row(VisibilityState::Hidden, VisibilityState::Undetected);
        outcome.override_state = Some(VisibilityState::Hidden);
        outcome.recompute_actionable();
        assert_eq!(outcome.effective_new_state(), VisibilityState::Hidden);
        assert!(!outcome.has_actionable_change);
    }
}
