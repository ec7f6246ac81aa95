//! Take Cover resolution.
//!
//! Not a visibility change: the action raises the acting token's cover
//! one bracket (anything below standard becomes standard, standard
//! becomes greater) and emits a cover event the host renders.

use visioner_domain::{CoverState, TokenId, VisioningEvent};

use crate::error::EngineError;

use super::ResolverDeps;

#[derive(Debug, Clone)]
pub struct TakeCoverRequest {
    pub token_id: TokenId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TakeCoverResolution {
    pub token_id: TokenId,
    pub previous_cover: CoverState,
    pub new_cover: CoverState,
}

pub struct TakeCoverResolver {
    deps: ResolverDeps,
}

impl TakeCoverResolver {
    pub fn new(deps: ResolverDeps) -> Self {
        Self { deps }
    }

    pub fn resolve(&self, request: &TakeCoverRequest) -> Result<TakeCoverResolution, EngineError> {
        let Some(token) = self.deps.scene.token(request.token_id) else {
            return Err(EngineError::fatal(format!(
                "take cover by unknown token {}",
                request.token_id
            )));
        };

        // Best auto-detected cover against any observer is the baseline
        let previous_cover = self
            .deps
            .scene
            .tokens_in_scene()
            .iter()
            .filter(|other| other.id != token.id && other.actor_kind.is_creature())
            .map(|observer| self.deps.analyzer.cover_report(observer, &token).state)
            .max()
            .unwrap_or(CoverState::None);

        let new_cover = take_cover_upgrade(previous_cover);
        self.deps.events.emit(VisioningEvent::CoverRaised {
            token_id: token.id,
            new_cover,
        });

        Ok(TakeCoverResolution {
            token_id: token.id,
            previous_cover,
            new_cover,
        })
    }
}

/// Take Cover turns partial cover into standard and standard into greater.
fn take_cover_upgrade(current: CoverState) -> CoverState {
    match current {
        CoverState::None | CoverState::Lesser => CoverState::Standard,
        CoverState::Standard | CoverState::Greater => CoverState::Greater,
    }
}
