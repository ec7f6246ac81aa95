//! Seek resolution.
//!
//! Subjects are every token in scene plus hidden walls, optionally
//! narrowed by the encounter/ally/distance/template filters. Each subject
//! row records the detecting sense; subjects no sense can reach surface as
//! typed gates rather than errors.

use std::collections::HashMap;

use visioner_domain::{
    ActionKind, CheckRoll, DegreeOfSuccess, SenseKind, TokenId, VisibilityState, WallId,
    WallVisibility, WALLS_KEY,
};

use crate::error::EngineError;
use crate::feats::FeatFacts;
use crate::infrastructure::ports::{ActorSnapshot, TokenSnapshot, WallSnapshot};
use crate::visibility::{visibility, PairInput};

use super::filters::{candidate_subjects, filter_subjects, SubjectFilters, TemplateShape};
use super::outcome::{OutcomeGate, OutcomeRow, WallOutcomeRow};
use super::ResolverDeps;

/// One Seek action to resolve.
#[derive(Debug, Clone)]
pub struct SeekRequest {
    pub seeker_id: TokenId,
    pub roll: CheckRoll,
    /// Aimed template narrowing the subjects
    pub template: Option<TemplateShape>,
    /// Per-call overrides of the configured filters
    pub encounter_only: Option<bool>,
    pub ignore_allies: Option<bool>,
    pub dialog_overrides: HashMap<TokenId, VisibilityState>,
}

/// Token rows plus wall rows.
#[derive(Debug, Clone)]
pub struct SeekResolution {
    pub rows: Vec<OutcomeRow>,
    pub wall_rows: Vec<WallOutcomeRow>,
}

pub struct SeekResolver {
    deps: ResolverDeps,
}

impl SeekResolver {
    pub fn new(deps: ResolverDeps) -> Self {
        Self { deps }
    }

    pub async fn resolve(&self, request: &SeekRequest) -> Result<SeekResolution, EngineError> {
        let Some(seeker) = self.deps.scene.token(request.seeker_id) else {
            return Err(EngineError::fatal(format!(
                "seek by unknown token {}",
                request.seeker_id
            )));
        };
        let seeker_actor = self
            .deps
            .analyzer
            .actor_of(&seeker)
            .ok_or_else(|| EngineError::missing_capability(seeker.id, "seeker actor missing"))?;

        let filters = SubjectFilters {
            encounter_only: request
                .encounter_only
                .unwrap_or(self.deps.config.default_encounter_filter),
            ignore_allies: request
                .ignore_allies
                .unwrap_or(self.deps.config.ignore_allies),
            exclude_defeated: true,
            range_cap_feet: self
                .deps
                .config
                .seek_range_cap(self.deps.scene.in_combat()),
            viewport: None,
            template: request.template,
        };

        let subjects = filter_subjects(
            self.deps.scene.as_ref(),
            &seeker,
            candidate_subjects(
                self.deps.scene.as_ref(),
                seeker.id,
                !self.deps.config.hide_foundry_hidden_tokens,
            ),
            &filters,
        );

        let mut rows = Vec::with_capacity(subjects.len());
        for subject in &subjects {
            let row = self
                .resolve_subject(&seeker, &seeker_actor, subject, request)
                .await?;
            rows.push(row);
        }

        let wall_rows = self.resolve_walls(&seeker, request).await?;

        Ok(SeekResolution { rows, wall_rows })
    }

    async fn resolve_subject(
        &self,
        seeker: &TokenSnapshot,
        seeker_actor: &ActorSnapshot,
        subject: &TokenSnapshot,
        request: &SeekRequest,
    ) -> Result<OutcomeRow, EngineError> {
        let subject_actor = self.deps.analyzer.actor_of(subject);
        let dc = self.stealth_dc_of(subject, subject_actor.as_ref());
        let view = self.deps.effective_visibility(seeker, subject).await?;
        let distance = seeker.position.distance_to(&subject.position);

        let mut row = OutcomeRow {
            observer_id: seeker.id,
            target_id: subject.id,
            counterpart_name: subject.name.clone(),
            source: visioner_domain::OverrideSource::SeekAction,
            dc,
            roll: Some(request.roll),
            margin: Some(request.roll.margin(dc)),
            degree: Some(request.roll.degree_against(dc)),
            old_visibility: view.state,
            new_visibility: view.state,
            override_state: request.dialog_overrides.get(&subject.id).copied(),
            has_actionable_change: false,
            feat_notes: Vec::new(),
            position_transition: None,
            auto_cover: None,
            detection_sense: None,
            gate: None,
            previous_override: view.override_flag.clone(),
            deferred: false,
            off_guard: false,
            prerequisites_met: true,
        };

        // Proficiency gating for hazards and loot
        let has_thats_odd = seeker_actor
            .feats
            .has(visioner_domain::feats::slugs::THATS_ODD);
        if let Some(required_rank) = subject_actor.as_ref().and_then(|a| a.min_perception_rank) {
            if seeker_actor.perception_rank < required_rank && !has_thats_odd {
                row.gate = Some(OutcomeGate::NoProficiency { required_rank });
                row.recompute_actionable();
                return Ok(row);
            }
        }

        let input = self.deps.analyzer.analyze(seeker, subject, None);
        let sensed = visibility(&input);
        row.detection_sense = sensed.detection_sense.clone();

        if sensed.detection_sense.is_none() {
            row.gate = Some(self.classify_gate(&input));
            row.recompute_actionable();
            return Ok(row);
        }

        let degree = request.roll.degree_against(dc);
        let mut new_state = match degree {
            DegreeOfSuccess::CriticalSuccess | DegreeOfSuccess::Success => VisibilityState::Observed,
            DegreeOfSuccess::Failure => view.state,
            DegreeOfSuccess::CriticalFailure => VisibilityState::Undetected,
        };

        // A success reveals no more than the detecting sense can perceive:
        // dim light behind cover caps vision at concealed, and an imprecise
        // sense never yields observed.
        if degree.succeeded() {
            new_state = new_state.capped_at(sensed.state);
        }
        let imprecise = sensed
            .detection_sense
            .as_ref()
            .is_some_and(|kind| !input.observer.precise.contains_key(kind));
        if imprecise {
            new_state = new_state.capped_at(VisibilityState::Hidden);
            row.feat_notes
                .push("imprecise sense: at best hidden".to_string());
        }

        // Sneaky roll option held by the target against this seeker
        let sneaky_vs = subject_actor
            .as_ref()
            .is_some_and(|actor| actor.sneaky_roll_options.contains(&seeker.id));
        if sneaky_vs {
            new_state = new_state.capped_at(VisibilityState::Hidden);
            row.feat_notes
                .push("target's Sneaky feat: at best hidden".to_string());
        }

        // Feat post-adjustments (Keen Eyes, That's Odd)
        let facts = FeatFacts {
            degree: Some(degree),
            distance_feet: distance,
            target_is_anomaly: subject.actor_kind.is_override_exempt(),
            ..FeatFacts::neutral(ActionKind::Seek)
        };
        new_state = self
            .deps
            .registry
            .adjust_visibility(&seeker_actor.feats, &facts, new_state);

        row.new_visibility = new_state;
        row.recompute_actionable();
        Ok(row)
    }

    /// Why no sense reached the subject: a type gate on a sense that was
    /// otherwise in range, or plain distance.
    fn classify_gate(&self, input: &PairInput) -> OutcomeGate {
        let rounded = visioner_domain::round_down_to_increment(input.distance_feet);
        for sense in input.observer.senses_in_range(rounded) {
            let reason = match sense.kind {
                SenseKind::Lifesense if !input.target_category.lifesense_detectable() => {
                    Some("lifesense cannot detect constructs".to_string())
                }
                SenseKind::Scent if !input.target_category.scent_detectable() => {
                    Some("scent cannot detect this target".to_string())
                }
                SenseKind::Tremorsense if input.target_flying => {
                    Some("tremorsense cannot detect airborne targets".to_string())
                }
                _ => None,
            };
            if let Some(reason) = reason {
                return OutcomeGate::UnmetConditions {
                    sense: sense.kind,
                    reason,
                };
            }
        }

        let shortest = input
            .observer
            .all_senses()
            .into_iter()
            .min_by_key(|sense| sense.range.feet().unwrap_or(u32::MAX))
            .map(|sense| sense.kind);
        OutcomeGate::OutOfRange { sense: shortest }
    }

    fn stealth_dc_of(&self, subject: &TokenSnapshot, actor: Option<&ActorSnapshot>) -> i32 {
        match actor {
            Some(actor) if actor.stealth_dc > 0 => actor.stealth_dc,
            _ if subject.actor_kind == visioner_domain::ActorKind::Loot => {
                self.deps.config.loot_stealth_dc
            }
            Some(actor) => actor.stealth_dc,
            None => self.deps.config.loot_stealth_dc,
        }
    }

    async fn resolve_walls(
        &self,
        seeker: &TokenSnapshot,
        request: &SeekRequest,
    ) -> Result<Vec<WallOutcomeRow>, EngineError> {
        let wall_map = self.wall_map(seeker.id).await?;

        let mut rows = Vec::new();
        for wall in self.deps.scene.walls_in_scene() {
            if !wall.hidden_wall {
                continue;
            }
            if let Some(template) = &request.template {
                if !template.contains(&wall_midpoint(&wall)) {
                    continue;
                }
            }

            let dc = wall.stealth_dc.unwrap_or(self.deps.config.wall_stealth_dc);
            let old_state = wall_map
                .get(&wall.id)
                .copied()
                .unwrap_or(WallVisibility::Hidden);
            let degree = request.roll.degree_against(dc);
            let new_state = if degree.succeeded() {
                WallVisibility::Observed
            } else {
                old_state
            };

            rows.push(WallOutcomeRow {
                seeker_id: seeker.id,
                wall_id: wall.id,
                dc,
                roll: request.roll,
                degree,
                old_state,
                new_state,
                connected_walls: wall.connected_walls.clone(),
            });
        }
        Ok(rows)
    }

    /// Persist discovered walls on the seeker's wall map flag, expanding
    /// across connected walls.
    pub async fn apply_wall_outcomes(
        &self,
        seeker_id: TokenId,
        rows: &[WallOutcomeRow],
    ) -> Result<usize, EngineError> {
        let mut wall_map = self.wall_map(seeker_id).await?;
        let mut changed = 0;

        for row in rows {
            if !row.discovered() {
                continue;
            }
            if wall_map.insert(row.wall_id, WallVisibility::Observed)
                != Some(WallVisibility::Observed)
            {
                changed += 1;
            }
            for connected in &row.connected_walls {
                if wall_map.insert(*connected, WallVisibility::Observed)
                    != Some(WallVisibility::Observed)
                {
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            let serialized: HashMap<String, &'static str> = wall_map
                .iter()
                .map(|(wall_id, state)| (wall_id.to_string(), state.as_str()))
                .collect();
            self.deps
                .flags
                .set_flag(seeker_id, WALLS_KEY, serde_json::json!(serialized))
                .await
                .map_err(|err| EngineError::flag_store(err.to_string()))?;
        }
        Ok(changed)
    }

    async fn wall_map(
        &self,
        seeker_id: TokenId,
    ) -> Result<HashMap<WallId, WallVisibility>, EngineError> {
        let raw = self
            .deps
            .flags
            .get_flag(seeker_id, WALLS_KEY)
            .await
            .map_err(|err| EngineError::flag_store(err.to_string()))?;
        let Some(value) = raw else {
            return Ok(HashMap::new());
        };
        let parsed: HashMap<String, String> =
            serde_json::from_value(value).unwrap_or_default();
        Ok(parsed
            .into_iter()
            .filter_map(|(key, state)| {
                let wall_id = key.parse::<uuid::Uuid>().ok().map(WallId::from_uuid)?;
                let state = match state.as_str() {
                    "observed" => WallVisibility::Observed,
                    _ => WallVisibility::Hidden,
                };
                Some((wall_id, state))
            })
            .collect())
    }
}

fn wall_midpoint(wall: &WallSnapshot) -> visioner_domain::Position {
    let (a, b) = &wall.endpoints;
    visioner_domain::Position::new(
        (a.x + b.x) / 2.0,
        (a.y + b.y) / 2.0,
        (a.elevation + b.elevation) / 2.0,
    )
}
