//! Sneak resolution.
//!
//! Sneak is a two-point state machine over the sneaker's movement: the
//! start position must already have the sneaker hidden or undetected from
//! an observer, and the end position must grant standard-or-better cover
//! or concealment, with feats relaxing either end. A successful roll with
//! a failing end position can be deferred to end of turn by the Sneaky
//! feat family; a failed roll yields the pair back to the calculator for
//! the rest of the turn.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use visioner_domain::{
    ActionKind, CheckRoll, CombatantId, CoverState, Position, PositionState, PositionTransition,
    RollId, TokenId, VisibilityState, VisioningEvent, SNEAK_ACTIVE_KEY, SNEAK_WALK_SPEED_KEY,
};

use crate::error::EngineError;
use crate::feats::{FeatFacts, Prerequisites};
use crate::infrastructure::ports::TokenSnapshot;
use crate::turns::tracker::{
    DeferredCheck, DeferredResolution, SneakOutcomeRecord, TurnSneakTracker, TurnStamp,
};
use crate::visibility::visibility;

use super::filters::{candidate_subjects, filter_subjects, SubjectFilters};
use super::outcome::OutcomeRow;
use super::ResolverDeps;

/// Cover modifiers by originating roll, for re-banding without re-rolling.
#[derive(Default)]
pub struct CoverModifierStore {
    original_bonus: DashMap<RollId, i32>,
}

impl CoverModifierStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, roll_id: RollId, cover_bonus: i32) {
        self.original_bonus.insert(roll_id, cover_bonus);
    }

    pub fn original(&self, roll_id: RollId) -> Option<i32> {
        self.original_bonus.get(&roll_id).map(|entry| *entry)
    }
}

/// One Sneak action to resolve.
#[derive(Debug, Clone)]
pub struct SneakRequest {
    pub sneaker_id: TokenId,
    /// Present while in combat; enables turn tracking
    pub combatant_id: Option<CombatantId>,
    pub roll_id: RollId,
    pub roll: CheckRoll,
    pub stamp: TurnStamp,
    /// Per-observer visibility captured when the Sneak began
    pub start_states: HashMap<TokenId, VisibilityState>,
    /// Where the sneaker started, for transition rows
    pub start_position: Option<Position>,
    pub movement_feet: f64,
    /// Closest approach of the path to any enemy
    pub min_path_distance_to_enemies: Option<f64>,
    /// Stealth bonus from detected cover already baked into the roll
    pub cover_bonus_in_roll: i32,
    /// Dialog-chosen per-observer results
    pub dialog_overrides: HashMap<TokenId, VisibilityState>,
}

/// Resolution over all observers.
#[derive(Debug, Clone)]
pub struct SneakResolution {
    pub rows: Vec<OutcomeRow>,
    /// Terrain Stalker: resolved without a roll
    pub free_sneak: bool,
    /// Distance cap for this Sneak in feet, feats applied
    pub distance_cap_feet: f64,
}

pub struct SneakResolver {
    deps: ResolverDeps,
    tracker: Arc<Mutex<TurnSneakTracker>>,
    cover_store: Arc<CoverModifierStore>,
}

impl SneakResolver {
    pub fn new(
        deps: ResolverDeps,
        tracker: Arc<Mutex<TurnSneakTracker>>,
        cover_store: Arc<CoverModifierStore>,
    ) -> Self {
        Self {
            deps,
            tracker,
            cover_store,
        }
    }

    /// Resolve a Sneak against every qualifying observer.
    pub async fn resolve(&self, request: &SneakRequest) -> Result<SneakResolution, EngineError> {
        let Some(sneaker) = self.deps.scene.token(request.sneaker_id) else {
            return Err(EngineError::fatal(format!(
                "sneak by unknown token {}",
                request.sneaker_id
            )));
        };
        let actor = self
            .deps
            .analyzer
            .actor_of(&sneaker)
            .ok_or_else(|| EngineError::missing_capability(sneaker.id, "sneaker actor missing"))?;

        self.cover_store
            .record(request.roll_id, request.cover_bonus_in_roll);

        let observers = self.observers_for(&sneaker);

        // Global facts for free-sneak eligibility and the distance cap
        let terrain = self.deps.scene.terrain_at(&sneaker.position);
        let difficult = self.deps.scene.is_difficult_terrain_at(&sneaker.position);
        let effective: Vec<super::EffectiveVisibility> = futures_util::future::join_all(
            observers
                .iter()
                .map(|observer| self.deps.effective_visibility(observer, &sneaker)),
        )
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;
        let all_undetected = observers.iter().zip(&effective).all(|(observer, view)| {
            observer.disposition.is_allied_with(sneaker.disposition)
                || view.state == VisibilityState::Undetected
        });

        let global_facts = FeatFacts {
            terrain: terrain.clone(),
            in_difficult_terrain: difficult,
            terrain_stalker_selections: actor.terrain_stalker_selections.clone(),
            movement_feet: request.movement_feet,
            all_observers_undetected: all_undetected,
            min_path_distance_to_enemies: request.min_path_distance_to_enemies,
            ..FeatFacts::neutral(ActionKind::Sneak)
        };
        let mut global_prereq = Prerequisites::default();
        self.deps
            .registry
            .preprocess_prerequisites(&actor.feats, &global_facts, &mut global_prereq);
        let free_sneak = global_prereq.free_sneak;

        let speed = self
            .deps
            .registry
            .speed_and_distance(&actor.feats, &global_facts);
        let distance_cap_feet =
            (f64::from(actor.walk_speed_feet) / 2.0) * speed.multiplier + speed.bonus_feet;

        if let Some(combatant_id) = request.combatant_id {
            self.tracker
                .lock()
                .expect("tracker lock poisoned")
                .start_turn_sneak(combatant_id, request.stamp, observers.len());
        }

        let mut rows = Vec::with_capacity(observers.len());
        for (observer, view) in observers.iter().zip(effective) {
            let row = self
                .resolve_against(
                    &sneaker,
                    &actor,
                    observer,
                    view,
                    request,
                    free_sneak,
                    all_undetected,
                )
                .await?;
            rows.push(row);
        }

        if free_sneak {
            tracing::info!(sneaker = %sneaker.name, "terrain stalker free sneak resolved");
        }

        Ok(SneakResolution {
            rows,
            free_sneak,
            distance_cap_feet,
        })
    }

    fn observers_for(&self, sneaker: &TokenSnapshot) -> Vec<TokenSnapshot> {
        let candidates = candidate_subjects(
            self.deps.scene.as_ref(),
            sneaker.id,
            !self.deps.config.hide_foundry_hidden_tokens,
        )
        .into_iter()
        .filter(|token| token.actor_kind.is_creature())
        .collect();

        let filters = SubjectFilters {
            ignore_allies: self.deps.config.ignore_allies,
            exclude_defeated: true,
            ..SubjectFilters::default()
        };
        filter_subjects(self.deps.scene.as_ref(), sneaker, candidates, &filters)
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_against(
        &self,
        sneaker: &TokenSnapshot,
        actor: &crate::infrastructure::ports::ActorSnapshot,
        observer: &TokenSnapshot,
        view: super::EffectiveVisibility,
        request: &SneakRequest,
        free_sneak: bool,
        all_undetected: bool,
    ) -> Result<OutcomeRow, EngineError> {
        let observer_actor = self.deps.analyzer.actor_of(observer);
        let dc = observer_actor
            .as_ref()
            .map(|actor| actor.perception_dc)
            .unwrap_or(10);

        let distance = observer.position.distance_to(&sneaker.position);

        // Roll failure earlier this turn: the pair belongs to the
        // calculator for the rest of the turn.
        if let Some(combatant_id) = request.combatant_id {
            let poisoned = self
                .tracker
                .lock()
                .expect("tracker lock poisoned")
                .has_roll_failure(combatant_id, observer.id);
            if poisoned {
                let mut row = self.base_row(sneaker, observer, &view, dc, request);
                row.new_visibility = VisibilityState::Avs;
                row.feat_notes
                    .push("earlier failed Sneak: auto-visibility resumes".to_string());
                row.recompute_actionable();
                return Ok(row);
            }
        }

        // Start qualification, by source priority: override flag, captured
        // start state, live calculation (conservative fallback).
        let mut notes = Vec::new();
        let start_visibility = if let Some(flag) = &view.override_flag {
            flag.state
        } else if let Some(captured) = request.start_states.get(&observer.id) {
            *captured
        } else {
            notes.push("start state derived from live visibility".to_string());
            view.state
        };
        let start_qualifies = matches!(
            start_visibility,
            VisibilityState::Hidden | VisibilityState::Undetected
        );

        // End qualification: standard+ cover (after feat upgrades) or
        // concealment at the end point.
        let cover_report = self.deps.analyzer.cover_report(observer, sneaker);
        let end_input = self.deps.analyzer.analyze(observer, sneaker, None);
        let end_state = visibility(&end_input);
        let end_concealed = end_state.state == VisibilityState::Concealed;

        let mut facts = FeatFacts {
            distance_feet: distance,
            terrain: self.deps.scene.terrain_at(&sneaker.position),
            in_difficult_terrain: self.deps.scene.is_difficult_terrain_at(&sneaker.position),
            terrain_stalker_selections: actor.terrain_stalker_selections.clone(),
            end_concealed,
            cover_from_creature: cover_report.from_creature,
            covering_creature_steps_larger: cover_report
                .creature_size
                .map(|size| size.steps_larger_than(sneaker.size)),
            movement_feet: request.movement_feet,
            all_observers_undetected: all_undetected,
            min_path_distance_to_enemies: request.min_path_distance_to_enemies,
            ..FeatFacts::neutral(ActionKind::Sneak)
        };
        let upgraded_cover =
            self.deps
                .registry
                .upgrade_cover(&actor.feats, &facts, cover_report.state);
        facts.end_cover = upgraded_cover;

        let mut prereq = Prerequisites {
            start_qualifies,
            end_qualifies: upgraded_cover.is_standard_or_better() || end_concealed,
            ..Prerequisites::default()
        };
        self.deps
            .registry
            .preprocess_prerequisites(&actor.feats, &facts, &mut prereq);
        notes.extend(prereq.notes.iter().cloned());

        let mut row = self.base_row(sneaker, observer, &view, dc, request);
        row.auto_cover = Some(upgraded_cover);
        row.feat_notes = notes;
        row.position_transition =
            self.transition_for(request, sneaker, observer, start_visibility, upgraded_cover);

        if free_sneak {
            row.roll = None;
            row.margin = None;
            row.degree = Some(visioner_domain::DegreeOfSuccess::Success);
            row.new_visibility = view.state;
            row.prerequisites_met = true;
            row.recompute_actionable();
            return Ok(row);
        }

        // Band the roll, feats shifting afterwards (Sneak Adept)
        let base_degree = request.roll.degree_against(dc);
        facts.degree = Some(base_degree);
        let shift = self.deps.registry.outcome_shift(&actor.feats, &facts);
        let degree = base_degree.shifted(shift);
        facts.degree = Some(degree);

        row.roll = Some(request.roll);
        row.margin = Some(request.roll.margin(dc));
        row.degree = Some(degree);

        if let Some(combatant_id) = request.combatant_id {
            self.tracker
                .lock()
                .expect("tracker lock poisoned")
                .record_roll_outcome(combatant_id, observer.id, degree, request.stamp);
        }

        let start_met = prereq.start_met();
        let end_met = prereq.end_met();
        row.prerequisites_met = start_met && end_met;

        if row.prerequisites_met {
            let mapped = sneak_transition(degree);
            row.new_visibility = self
                .deps
                .registry
                .adjust_visibility(&actor.feats, &facts, mapped);
        } else if TurnSneakTracker::should_defer_end_position_check(
            prereq.can_defer,
            degree.succeeded(),
            start_met,
            end_met,
        ) {
            row.new_visibility = sneak_transition(degree);
            row.deferred = true;
            if let Some(combatant_id) = request.combatant_id {
                let end_position = PositionState {
                    effective_visibility: end_state.state,
                    cover_state: upgraded_cover,
                    distance_feet: distance,
                    lighting_conditions: end_input.lighting.level,
                    stealth_bonus: upgraded_cover.stealth_bonus(),
                };
                let check = DeferredCheck {
                    sneaker_id: sneaker.id,
                    observer_id: observer.id,
                    stamp: request.stamp,
                    end_position,
                    original_outcome: SneakOutcomeRecord {
                        observer_id: observer.id,
                        roll: request.roll,
                        dc,
                        degree,
                        old_visibility: row.old_visibility,
                        new_visibility: row.new_visibility,
                        start_visibility,
                    },
                };
                self.tracker
                    .lock()
                    .expect("tracker lock poisoned")
                    .record_deferred_check(combatant_id, check);
                self.deps.events.emit(VisioningEvent::DeferredCheckScheduled {
                    sneaker_id: sneaker.id,
                    observer_id: observer.id,
                });
            }
        } else {
            // Prerequisite failure with no relaxation: observed, whatever
            // the dice said.
            row.new_visibility = VisibilityState::Observed;
        }

        row.override_state = request.dialog_overrides.get(&observer.id).copied();
        row.recompute_actionable();
        Ok(row)
    }

    fn base_row(
        &self,
        sneaker: &TokenSnapshot,
        observer: &TokenSnapshot,
        view: &super::EffectiveVisibility,
        dc: i32,
        request: &SneakRequest,
    ) -> OutcomeRow {
        OutcomeRow {
            observer_id: observer.id,
            target_id: sneaker.id,
            counterpart_name: observer.name.clone(),
            source: visioner_domain::OverrideSource::SneakAction,
            dc,
            roll: Some(request.roll),
            margin: Some(request.roll.margin(dc)),
            degree: None,
            old_visibility: view.state,
            new_visibility: view.state,
            override_state: None,
            has_actionable_change: false,
            feat_notes: Vec::new(),
            position_transition: None,
            auto_cover: None,
            detection_sense: view.detection_sense.clone(),
            gate: None,
            previous_override: view.override_flag.clone(),
            deferred: false,
            off_guard: false,
            prerequisites_met: false,
        }
    }

    fn transition_for(
        &self,
        request: &SneakRequest,
        sneaker: &TokenSnapshot,
        observer: &TokenSnapshot,
        start_visibility: VisibilityState,
        end_cover: CoverState,
    ) -> Option<PositionTransition> {
        let start_position = request.start_position?;
        let start_distance = observer.position.distance_to(&start_position);
        let start_lighting = self
            .deps
            .scene
            .light_level_at(&start_position)
            .map(|sample| sample.level)
            .unwrap_or(visioner_domain::LightLevel::Bright);
        let end_input = self.deps.analyzer.analyze(observer, sneaker, None);
        let end_state = visibility(&end_input);

        let start = PositionState {
            effective_visibility: start_visibility,
            cover_state: CoverState::None,
            distance_feet: start_distance,
            lighting_conditions: start_lighting,
            stealth_bonus: 0,
        };
        let end = PositionState {
            effective_visibility: end_state.state,
            cover_state: end_cover,
            distance_feet: observer.position.distance_to(&sneaker.position),
            lighting_conditions: end_input.lighting.level,
            stealth_bonus: end_cover.stealth_bonus(),
        };
        Some(PositionTransition::between(start, end))
    }

    /// Re-band an outcome after the dialog picks a different per-observer
    /// cover, preserving the die.
    pub fn reband_with_cover(
        &self,
        row: &OutcomeRow,
        roll_id: RollId,
        chosen_cover: CoverState,
    ) -> Result<OutcomeRow, EngineError> {
        let original_bonus = self.cover_store.original(roll_id).ok_or_else(|| {
            EngineError::fatal(format!("no cover modifier recorded for roll {roll_id}"))
        })?;
        let Some(roll) = row.roll else {
            return Err(EngineError::fatal(
                "cannot re-band a rollless outcome".to_string(),
            ));
        };

        let swapped = roll
            .with_modifier(roll.modifier - original_bonus + chosen_cover.stealth_bonus());
        let degree = swapped.degree_against(row.dc);

        let mut rebanded = row.clone();
        rebanded.roll = Some(swapped);
        rebanded.margin = Some(swapped.margin(row.dc));
        rebanded.degree = Some(degree);
        rebanded.auto_cover = Some(chosen_cover);
        rebanded.new_visibility = if rebanded.prerequisites_met {
            sneak_transition(degree)
        } else {
            VisibilityState::Observed
        };
        rebanded.recompute_actionable();
        Ok(rebanded)
    }

    /// End-of-turn revalidation of every deferred check for a combatant.
    pub async fn process_end_of_turn(
        &self,
        combatant_id: CombatantId,
        sneaker_id: TokenId,
    ) -> Result<Vec<DeferredResolution>, EngineError> {
        let Some(sneaker) = self.deps.scene.token(sneaker_id) else {
            return Err(EngineError::fatal(format!(
                "end of turn for unknown token {sneaker_id}"
            )));
        };
        let actor = self
            .deps
            .analyzer
            .actor_of(&sneaker)
            .ok_or_else(|| EngineError::missing_capability(sneaker.id, "sneaker actor missing"))?;

        let resolutions = {
            let mut tracker = self.tracker.lock().expect("tracker lock poisoned");
            tracker.process_end_of_turn(combatant_id, |check| {
                let Some(observer) = self.deps.scene.token(check.observer_id) else {
                    return false;
                };
                self.end_qualifies_now(&sneaker, &actor, &observer)
            })
        };

        for resolution in &resolutions {
            let changes = HashMap::from([(sneaker.id, resolution.final_visibility)]);
            self.deps
                .overrides
                .set(
                    resolution.check.observer_id,
                    &changes,
                    visioner_domain::OverrideSource::SneakAction,
                )
                .await?;
            self.deps.events.emit(VisioningEvent::DeferredCheckResolved {
                sneaker_id: sneaker.id,
                observer_id: resolution.check.observer_id,
                result: resolution.final_visibility,
            });
        }
        Ok(resolutions)
    }

    /// Whether the sneaker's current position satisfies the end
    /// prerequisite against one observer.
    pub fn end_qualifies_now(
        &self,
        sneaker: &TokenSnapshot,
        actor: &crate::infrastructure::ports::ActorSnapshot,
        observer: &TokenSnapshot,
    ) -> bool {
        let cover_report = self.deps.analyzer.cover_report(observer, sneaker);
        let end_input = self.deps.analyzer.analyze(observer, sneaker, None);
        let end_state = visibility(&end_input);

        let mut facts = FeatFacts {
            distance_feet: observer.position.distance_to(&sneaker.position),
            terrain: self.deps.scene.terrain_at(&sneaker.position),
            in_difficult_terrain: self.deps.scene.is_difficult_terrain_at(&sneaker.position),
            terrain_stalker_selections: actor.terrain_stalker_selections.clone(),
            end_concealed: end_state.state == VisibilityState::Concealed,
            cover_from_creature: cover_report.from_creature,
            covering_creature_steps_larger: cover_report
                .creature_size
                .map(|size| size.steps_larger_than(sneaker.size)),
            ..FeatFacts::neutral(ActionKind::Sneak)
        };
        let upgraded =
            self.deps
                .registry
                .upgrade_cover(&actor.feats, &facts, cover_report.state);
        facts.end_cover = upgraded;

        let mut prereq = Prerequisites {
            start_qualifies: true,
            end_qualifies: upgraded.is_standard_or_better()
                || end_state.state == VisibilityState::Concealed,
            ..Prerequisites::default()
        };
        self.deps
            .registry
            .preprocess_prerequisites(&actor.feats, &facts, &mut prereq);
        prereq.end_met()
    }

    /// Manually undefer one observer, recovering the original outcome.
    pub fn undefer(
        &self,
        combatant_id: CombatantId,
        observer_id: TokenId,
    ) -> Option<DeferredCheck> {
        self.tracker
            .lock()
            .expect("tracker lock poisoned")
            .remove_deferred_check(combatant_id, observer_id)
    }

    pub fn is_observer_deferred(&self, combatant_id: CombatantId, observer_id: TokenId) -> bool {
        self.tracker
            .lock()
            .expect("tracker lock poisoned")
            .is_observer_deferred(combatant_id, observer_id)
    }

    /// Stash the walk speed and mark the sneak active.
    pub async fn begin_sneak(&self, token_id: TokenId) -> Result<(), EngineError> {
        let Some(token) = self.deps.scene.token(token_id) else {
            return Err(EngineError::fatal(format!("unknown token {token_id}")));
        };
        let walk_speed = self
            .deps
            .analyzer
            .actor_of(&token)
            .map(|actor| actor.walk_speed_feet)
            .unwrap_or(25);
        self.deps
            .flags
            .set_flag(
                token_id,
                SNEAK_WALK_SPEED_KEY,
                serde_json::json!(walk_speed),
            )
            .await
            .map_err(|err| EngineError::flag_store(err.to_string()))?;
        self.deps
            .flags
            .set_flag(token_id, SNEAK_ACTIVE_KEY, serde_json::json!(true))
            .await
            .map_err(|err| EngineError::flag_store(err.to_string()))?;
        Ok(())
    }

    /// Clear the sneak bookkeeping flags.
    pub async fn finish_sneak(&self, token_id: TokenId) -> Result<(), EngineError> {
        self.deps
            .flags
            .unset_flag(token_id, SNEAK_ACTIVE_KEY)
            .await
            .map_err(|err| EngineError::flag_store(err.to_string()))?;
        self.deps
            .flags
            .unset_flag(token_id, SNEAK_WALK_SPEED_KEY)
            .await
            .map_err(|err| EngineError::flag_store(err.to_string()))?;
        Ok(())
    }
}

/// The Sneak transition table (prerequisites already satisfied).
fn sneak_transition(degree: visioner_domain::DegreeOfSuccess) -> VisibilityState {
    if degree.succeeded() {
        VisibilityState::Undetected
    } else {
        VisibilityState::Observed
    }
}
