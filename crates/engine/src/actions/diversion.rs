//! Create a Diversion resolution.
//!
//! Deception against each observer's Perception DC. Observers taken in
//! lose track of the diverter (hidden); a critical success also leaves
//! them off-guard for the host's surge window. The diverting token never
//! appears in its own subject list.

use std::collections::HashMap;

use visioner_domain::{CheckRoll, DegreeOfSuccess, TokenId, VisibilityState};

use crate::error::EngineError;
use crate::infrastructure::ports::TokenSnapshot;

use super::filters::{candidate_subjects, filter_subjects, SubjectFilters};
use super::outcome::OutcomeRow;
use super::ResolverDeps;

#[derive(Debug, Clone)]
pub struct DiversionRequest {
    pub actor_id: TokenId,
    pub roll: CheckRoll,
    pub dialog_overrides: HashMap<TokenId, VisibilityState>,
}

#[derive(Debug, Clone)]
pub struct DiversionResolution {
    pub rows: Vec<OutcomeRow>,
}

pub struct DiversionResolver {
    deps: ResolverDeps,
}

impl DiversionResolver {
    pub fn new(deps: ResolverDeps) -> Self {
        Self { deps }
    }

    pub async fn resolve(
        &self,
        request: &DiversionRequest,
    ) -> Result<DiversionResolution, EngineError> {
        let Some(diverter) = self.deps.scene.token(request.actor_id) else {
            return Err(EngineError::fatal(format!(
                "diversion by unknown token {}",
                request.actor_id
            )));
        };

        let observers = {
            let candidates = candidate_subjects(
                self.deps.scene.as_ref(),
                diverter.id,
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
            filter_subjects(self.deps.scene.as_ref(), &diverter, candidates, &filters)
        };

        let mut rows = Vec::with_capacity(observers.len());
        for observer in &observers {
            rows.push(self.resolve_against(&diverter, observer, request).await?);
        }
        Ok(DiversionResolution { rows })
    }

    async fn resolve_against(
        &self,
        diverter: &TokenSnapshot,
        observer: &TokenSnapshot,
        request: &DiversionRequest,
    ) -> Result<OutcomeRow, EngineError> {
        let dc = self
            .deps
            .analyzer
            .actor_of(observer)
            .map(|actor| actor.perception_dc)
            .unwrap_or(10);
        let view = self.deps.effective_visibility(observer, diverter).await?;
        let degree = request.roll.degree_against(dc);

        // Already undetected observers are not improved back to hidden
        let new_visibility = match degree {
            DegreeOfSuccess::CriticalSuccess | DegreeOfSuccess::Success => {
                if view.state == VisibilityState::Undetected {
                    view.state
                } else {
                    VisibilityState::Hidden
                }
            }
            DegreeOfSuccess::Failure | DegreeOfSuccess::CriticalFailure => view.state,
        };

        let mut row = OutcomeRow {
            observer_id: observer.id,
            target_id: diverter.id,
            counterpart_name: observer.name.clone(),
            source: visioner_domain::OverrideSource::DiversionAction,
            dc,
            roll: Some(request.roll),
            margin: Some(request.roll.margin(dc)),
            degree: Some(degree),
            old_visibility: view.state,
            new_visibility,
            override_state: request.dialog_overrides.get(&observer.id).copied(),
            has_actionable_change: false,
            feat_notes: Vec::new(),
            position_transition: None,
            auto_cover: None,
            detection_sense: view.detection_sense.clone(),
            gate: None,
            previous_override: view.override_flag.clone(),
            deferred: false,
            off_guard: degree == DegreeOfSuccess::CriticalSuccess,
            prerequisites_met: true,
        };
        row.recompute_actionable();
        Ok(row)
    }
}
