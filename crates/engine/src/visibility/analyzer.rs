//! Pair analysis: turns host scene queries into calculator inputs.
//!
//! Every geometry or capability failure degrades to a conservative input
//! for this pair only, with a diagnostic note; the calculator itself never
//! sees an error.

use std::sync::Arc;

use visioner_domain::{
    CoverState, CreatureCategory, DarknessRay, LightingSample, VisionCapabilities,
};

use crate::infrastructure::ports::{ActorSnapshot, CoverReport, ScenePort, TokenSnapshot};
use crate::vision::{extract_capabilities, VisionCache};

use super::calculator::PairInput;

/// Builds `PairInput`s from the scene, caching capability extraction.
pub struct PairAnalyzer {
    scene: Arc<dyn ScenePort>,
    cache: Arc<VisionCache>,
}

impl PairAnalyzer {
    pub fn new(scene: Arc<dyn ScenePort>, cache: Arc<VisionCache>) -> Self {
        Self { scene, cache }
    }

    /// Observer capabilities, cached, with the missing-actor fallback.
    pub fn capabilities_of(&self, token: &TokenSnapshot) -> VisionCapabilities {
        let scene = Arc::clone(&self.scene);
        let actor_id = token.actor_id;
        self.cache.get_or_compute(token.id, move || {
            match scene.actor(actor_id) {
                Some(actor) => extract_capabilities(&actor),
                None => {
                    tracing::warn!(token = %actor_id, "actor data missing; empty capability set");
                    VisionCapabilities::empty()
                }
            }
        })
    }

    /// Analyze one directional pair. Infallible by construction.
    pub fn analyze(
        &self,
        observer: &TokenSnapshot,
        target: &TokenSnapshot,
        manual_cover: Option<CoverState>,
    ) -> PairInput {
        let mut diagnostics = Vec::new();

        let distance_feet = match self
            .scene
            .distance_feet(&observer.position, &target.position)
        {
            Ok(distance) => distance,
            Err(err) => {
                diagnostics.push(format!("distance query failed: {err}; using euclidean"));
                observer.position.distance_to(&target.position)
            }
        };

        let has_line_of_sight = match self
            .scene
            .has_line_of_sight(&observer.position, &target.position)
        {
            Ok(los) => los,
            Err(err) => {
                diagnostics.push(format!("LoS query failed: {err}; assuming blocked"));
                false
            }
        };

        let lighting = match self.scene.light_level_at(&target.position) {
            Ok(sample) => sample,
            Err(err) => {
                diagnostics.push(format!("light query failed: {err}; assuming darkness"));
                LightingSample::darkness(0)
            }
        };

        let darkness_ray = match self
            .scene
            .ray_crosses_darkness(&observer.position, &target.position)
        {
            Ok(ray) => ray,
            Err(err) => {
                diagnostics.push(format!("darkness ray query failed: {err}; assuming crossed"));
                DarknessRay::crossing(4)
            }
        };

        let cover = match manual_cover {
            Some(state) => state,
            None => match self
                .scene
                .cover_between(&observer.position, &target.position)
            {
                Ok(CoverReport { state, .. }) => state,
                Err(err) => {
                    diagnostics.push(format!("cover query failed: {err}; assuming none"));
                    CoverState::None
                }
            },
        };

        let (target_invisible, target_category, target_flying) =
            match self.scene.actor(target.actor_id) {
                Some(actor) => (
                    actor.conditions.is_invisible(),
                    actor.creature_category,
                    actor.conditions.is_flying(),
                ),
                None => {
                    diagnostics.push("target actor data missing; assuming living".to_string());
                    (false, CreatureCategory::Living, false)
                }
            };

        PairInput {
            distance_feet,
            observer: self.capabilities_of(observer),
            target_invisible,
            target_category,
            target_flying,
            cover,
            lighting,
            darkness_ray,
            has_line_of_sight,
            diagnostics,
        }
    }

    /// Auto-detected cover report for a pair, conservative on failure.
    pub fn cover_report(&self, observer: &TokenSnapshot, target: &TokenSnapshot) -> CoverReport {
        self.scene
            .cover_between(&observer.position, &target.position)
            .unwrap_or(CoverReport {
                state: CoverState::None,
                from_creature: false,
                creature_size: None,
            })
    }

    /// Actor snapshot helper used by resolvers.
    pub fn actor_of(&self, token: &TokenSnapshot) -> Option<ActorSnapshot> {
        self.scene.actor(token.actor_id)
    }
}
