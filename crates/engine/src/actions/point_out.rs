//! Point Out resolution.
//!
//! The pointer marks a target for allies: any ally currently unable to
//! locate the target sees it upgraded to at worst hidden, persisted as a
//! `point_out_action` override for the round.

use visioner_domain::{TokenId, VisibilityState};

use crate::error::EngineError;

use super::outcome::OutcomeRow;
use super::ResolverDeps;

#[derive(Debug, Clone)]
pub struct PointOutRequest {
    pub pointer_id: TokenId,
    pub target_id: TokenId,
}

#[derive(Debug, Clone)]
pub struct PointOutResolution {
    pub rows: Vec<OutcomeRow>,
}

pub struct PointOutResolver {
    deps: ResolverDeps,
}

impl PointOutResolver {
    pub fn new(deps: ResolverDeps) -> Self {
        Self { deps }
    }

    pub async fn resolve(
        &self,
        request: &PointOutRequest,
    ) -> Result<PointOutResolution, EngineError> {
        let Some(pointer) = self.deps.scene.token(request.pointer_id) else {
            return Err(EngineError::fatal(format!(
                "point out by unknown token {}",
                request.pointer_id
            )));
        };
        let Some(target) = self.deps.scene.token(request.target_id) else {
            return Err(EngineError::fatal(format!(
                "point out at unknown token {}",
                request.target_id
            )));
        };

        let allies: Vec<_> = self
            .deps
            .scene
            .tokens_in_scene()
            .into_iter()
            .filter(|token| token.id != pointer.id && token.id != target.id)
            .filter(|token| !token.hidden)
            .filter(|token| token.actor_kind.is_creature())
            .filter(|token| token.disposition.is_allied_with(pointer.disposition))
            .collect();

        let mut rows = Vec::new();
        for ally in &allies {
            let view = self.deps.effective_visibility(ally, &target).await?;

            // Only observers who cannot currently locate the target benefit
            let new_visibility = if view.state == VisibilityState::Undetected {
                VisibilityState::Hidden
            } else {
                view.state
            };

            let mut row = OutcomeRow {
                observer_id: ally.id,
                target_id: target.id,
                counterpart_name: ally.name.clone(),
                source: visioner_domain::OverrideSource::PointOutAction,
                dc: 0,
                roll: None,
                margin: None,
                degree: None,
                old_visibility: view.state,
                new_visibility,
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
                prerequisites_met: true,
            };
            row.recompute_actionable();
            rows.push(row);
        }

        Ok(PointOutResolution { rows })
    }
}
