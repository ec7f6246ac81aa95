//! Turn tracking for the Sneaky feat family.
//!
//! A successful Sneak with a failing end prerequisite is not resolved on
//! the spot: the check is deferred to the sneaker's end of turn and
//! revalidated against the then-current position. A recorded roll failure
//! against an observer yields that pair back to the calculator for the
//! rest of the turn.

use std::collections::HashMap;

use visioner_domain::{
    CheckRoll, CombatantId, DegreeOfSuccess, PositionState, TokenId, VisibilityState,
};

/// Round/turn coordinates of a combat moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnStamp {
    pub round: u32,
    pub turn_index: u32,
}

/// The original outcome a deferred check must be able to restore exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct SneakOutcomeRecord {
    pub observer_id: TokenId,
    pub roll: CheckRoll,
    pub dc: i32,
    pub degree: DegreeOfSuccess,
    pub old_visibility: VisibilityState,
    pub new_visibility: VisibilityState,
    /// Start-state snapshot captured when the Sneak began
    pub start_visibility: VisibilityState,
}

/// A deferred end-position check against one observer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredCheck {
    pub sneaker_id: TokenId,
    pub observer_id: TokenId,
    pub stamp: TurnStamp,
    pub end_position: PositionState,
    pub original_outcome: SneakOutcomeRecord,
}

/// One Sneak action inside a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct SneakActionRecord {
    pub stamp: TurnStamp,
    pub observer_count: usize,
}

/// Per-combatant sneak state for the current turn.
#[derive(Debug, Clone, Default)]
pub struct TurnSneakState {
    pub sneak_actions: Vec<SneakActionRecord>,
    deferred_checks: HashMap<TokenId, DeferredCheck>,
    roll_failures: HashMap<TokenId, TurnStamp>,
}

/// Resolution of one deferred check at end of turn.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredResolution {
    pub check: DeferredCheck,
    /// End position qualifies now: the original result stands
    pub kept: bool,
    pub final_visibility: VisibilityState,
}

/// Tracker over all combatants.
#[derive(Debug, Default)]
pub struct TurnSneakTracker {
    states: HashMap<CombatantId, TurnSneakState>,
}

impl TurnSneakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or extend the combatant's turn state with a new Sneak.
    pub fn start_turn_sneak(
        &mut self,
        combatant_id: CombatantId,
        stamp: TurnStamp,
        observer_count: usize,
    ) {
        let state = self.states.entry(combatant_id).or_default();
        // A new round/turn resets the ledger; consecutive sneaks extend it
        if state
            .sneak_actions
            .last()
            .is_some_and(|last| last.stamp != stamp)
        {
            *state = TurnSneakState::default();
        }
        state.sneak_actions.push(SneakActionRecord {
            stamp,
            observer_count,
        });
    }

    /// Record the banded outcome against one observer. Failures poison the
    /// pair for the rest of the turn.
    pub fn record_roll_outcome(
        &mut self,
        combatant_id: CombatantId,
        observer_id: TokenId,
        degree: DegreeOfSuccess,
        stamp: TurnStamp,
    ) {
        if !degree.succeeded() {
            self.states
                .entry(combatant_id)
                .or_default()
                .roll_failures
                .insert(observer_id, stamp);
        }
    }

    /// Whether a roll failure already poisoned this observer this turn.
    pub fn has_roll_failure(&self, combatant_id: CombatantId, observer_id: TokenId) -> bool {
        self.states
            .get(&combatant_id)
            .is_some_and(|state| state.roll_failures.contains_key(&observer_id))
    }

    /// Deferral criteria: Sneaky feat, a successful outcome, a qualifying
    /// start, and a failing end.
    pub fn should_defer_end_position_check(
        has_sneaky_feat: bool,
        outcome_succeeded: bool,
        start_qualifies: bool,
        end_qualifies: bool,
    ) -> bool {
        has_sneaky_feat && outcome_succeeded && start_qualifies && !end_qualifies
    }

    pub fn record_deferred_check(&mut self, combatant_id: CombatantId, check: DeferredCheck) {
        self.states
            .entry(combatant_id)
            .or_default()
            .deferred_checks
            .insert(check.observer_id, check);
    }

    pub fn is_observer_deferred(&self, combatant_id: CombatantId, observer_id: TokenId) -> bool {
        self.states
            .get(&combatant_id)
            .is_some_and(|state| state.deferred_checks.contains_key(&observer_id))
    }

    /// Manually undefer: returns the stored check, original outcome intact.
    pub fn remove_deferred_check(
        &mut self,
        combatant_id: CombatantId,
        observer_id: TokenId,
    ) -> Option<DeferredCheck> {
        self.states
            .get_mut(&combatant_id)?
            .deferred_checks
            .remove(&observer_id)
    }

    pub fn deferred_checks(&self, combatant_id: CombatantId) -> Vec<DeferredCheck> {
        self.states
            .get(&combatant_id)
            .map(|state| {
                let mut checks: Vec<DeferredCheck> =
                    state.deferred_checks.values().cloned().collect();
                checks.sort_by_key(|check| check.observer_id);
                checks
            })
            .unwrap_or_default()
    }

    /// End-of-turn revalidation. `end_qualifies_now` answers whether the
    /// sneaker's current position satisfies the end prerequisite against
    /// the given observer. Qualifying checks keep the original result;
    /// failing checks force `observed`. Turn state is consumed.
    pub fn process_end_of_turn<F>(
        &mut self,
        combatant_id: CombatantId,
        mut end_qualifies_now: F,
    ) -> Vec<DeferredResolution>
    where
        F: FnMut(&DeferredCheck) -> bool,
    {
        let Some(mut state) = self.states.remove(&combatant_id) else {
            return Vec::new();
        };

        let mut checks: Vec<DeferredCheck> = state.deferred_checks.drain().map(|(_, v)| v).collect();
        checks.sort_by_key(|check| check.observer_id);

        checks
            .into_iter()
            .map(|check| {
                let kept = end_qualifies_now(&check);
                let final_visibility = if kept {
                    check.original_outcome.new_visibility
                } else {
                    VisibilityState::Observed
                };
                tracing::debug!(
                    sneaker = %check.sneaker_id,
                    observer = %check.observer_id,
                    kept,
                    "deferred sneak check resolved at end of turn"
                );
                DeferredResolution {
                    check,
                    kept,
                    final_visibility,
                }
            })
            .collect()
    }

    /// Drop a combatant's state without resolving (combat removed, etc.).
    pub fn clear(&mut self, combatant_id: CombatantId) {
        self.states.remove(&combatant_id);
    }
}
