//! Hide resolution.
//!
//! Stealth against each observer's Perception DC. The hider must already
//! be concealed from the observer or enjoy standard-or-better cover; the
//! same feats that relax Sneak's end prerequisite relax this one.

use std::collections::HashMap;

use visioner_domain::{
    ActionKind, CheckRoll, DegreeOfSuccess, TokenId, VisibilityState,
};

use crate::error::EngineError;
use crate::feats::{FeatFacts, Prerequisites};
use crate::infrastructure::ports::TokenSnapshot;
use crate::visibility::visibility;

use super::filters::{candidate_subjects, filter_subjects, SubjectFilters};
use super::outcome::OutcomeRow;
use super::ResolverDeps;

#[derive(Debug, Clone)]
pub struct HideRequest {
    pub hider_id: TokenId,
    pub roll: CheckRoll,
    pub dialog_overrides: HashMap<TokenId, VisibilityState>,
}

#[derive(Debug, Clone)]
pub struct HideResolution {
    pub rows: Vec<OutcomeRow>,
}

pub struct HideResolver {
    deps: ResolverDeps,
}

impl HideResolver {
    pub fn new(deps: ResolverDeps) -> Self {
        Self { deps }
    }

    pub async fn resolve(&self, request: &HideRequest) -> Result<HideResolution, EngineError> {
        let Some(hider) = self.deps.scene.token(request.hider_id) else {
            return Err(EngineError::fatal(format!(
                "hide by unknown token {}",
                request.hider_id
            )));
        };
        let actor = self
            .deps
            .analyzer
            .actor_of(&hider)
            .ok_or_else(|| EngineError::missing_capability(hider.id, "hider actor missing"))?;

        let observers = {
            let candidates = candidate_subjects(
                self.deps.scene.as_ref(),
                hider.id,
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
            filter_subjects(self.deps.scene.as_ref(), &hider, candidates, &filters)
        };

        let mut rows = Vec::with_capacity(observers.len());
        for observer in &observers {
            rows.push(self.resolve_against(&hider, &actor, observer, request).await?);
        }
        Ok(HideResolution { rows })
    }

    async fn resolve_against(
        &self,
        hider: &TokenSnapshot,
        actor: &crate::infrastructure::ports::ActorSnapshot,
        observer: &TokenSnapshot,
        request: &HideRequest,
    ) -> Result<OutcomeRow, EngineError> {
        let dc = self
            .deps
            .analyzer
            .actor_of(observer)
            .map(|observer_actor| observer_actor.perception_dc)
            .unwrap_or(10);
        let view = self.deps.effective_visibility(observer, hider).await?;

        // Qualification mirrors Sneak's end prerequisite
        let cover_report = self.deps.analyzer.cover_report(observer, hider);
        let live = visibility(&self.deps.analyzer.analyze(observer, hider, None));
        let concealed = live.state == VisibilityState::Concealed
            || view.state == VisibilityState::Concealed;

        let mut facts = FeatFacts {
            distance_feet: observer.position.distance_to(&hider.position),
            terrain: self.deps.scene.terrain_at(&hider.position),
            in_difficult_terrain: self.deps.scene.is_difficult_terrain_at(&hider.position),
            terrain_stalker_selections: actor.terrain_stalker_selections.clone(),
            end_concealed: concealed,
            cover_from_creature: cover_report.from_creature,
            covering_creature_steps_larger: cover_report
                .creature_size
                .map(|size| size.steps_larger_than(hider.size)),
            ..FeatFacts::neutral(ActionKind::Hide)
        };
        let cover = self
            .deps
            .registry
            .upgrade_cover(&actor.feats, &facts, cover_report.state);
        facts.end_cover = cover;

        let mut prereq = Prerequisites {
            start_qualifies: concealed || cover.is_standard_or_better(),
            end_qualifies: concealed || cover.is_standard_or_better(),
            ..Prerequisites::default()
        };
        self.deps
            .registry
            .preprocess_prerequisites(&actor.feats, &facts, &mut prereq);

        let degree = request.roll.degree_against(dc);
        facts.degree = Some(degree);

        let qualified = prereq.end_met();
        let new_visibility = if !qualified {
            view.state
        } else {
            match degree {
                DegreeOfSuccess::CriticalSuccess | DegreeOfSuccess::Success => self
                    .deps
                    .registry
                    .adjust_visibility(&actor.feats, &facts, VisibilityState::Hidden),
                DegreeOfSuccess::Failure => view.state,
                DegreeOfSuccess::CriticalFailure => VisibilityState::Observed,
            }
        };

        let mut feat_notes = prereq.notes.clone();
        if !qualified {
            feat_notes.push("no concealment or standard cover: cannot Hide".to_string());
        }

        let mut row = OutcomeRow {
            observer_id: observer.id,
            target_id: hider.id,
            counterpart_name: observer.name.clone(),
            source: visioner_domain::OverrideSource::HideAction,
            dc,
            roll: Some(request.roll),
            margin: Some(request.roll.margin(dc)),
            degree: Some(degree),
            old_visibility: view.state,
            new_visibility,
            override_state: request.dialog_overrides.get(&observer.id).copied(),
            has_actionable_change: false,
            feat_notes,
            position_transition: None,
            auto_cover: Some(cover),
            detection_sense: view.detection_sense.clone(),
            gate: None,
            previous_override: view.override_flag.clone(),
            deferred: false,
            off_guard: false,
            prerequisites_met: qualified,
        };
        row.recompute_actionable();
        Ok(row)
    }
}
