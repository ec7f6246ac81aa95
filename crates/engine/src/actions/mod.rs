//! Action resolution pipelines.
//!
//! One resolver per action; all of them share the same dependency bundle
//! and produce `OutcomeRow` values that the applier turns into override
//! writes.

pub mod apply;
pub mod diversion;
pub mod filters;
pub mod hide;
pub mod outcome;
pub mod point_out;
pub mod seek;
pub mod sneak;
pub mod take_cover;

use std::sync::Arc;

use visioner_domain::{OverrideFlag, SenseKind, VisibilityState};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feats::FeatRegistry;
use crate::infrastructure::ports::{Clock, EventSink, FlagStore, ScenePort, TokenSnapshot};
use crate::overrides::OverrideManager;
use crate::visibility::{visibility, PairAnalyzer};

pub use apply::OutcomeApplier;
pub use filters::{SubjectFilters, TemplateShape, Viewport};
pub use outcome::{BulkOutcome, OutcomeGate, OutcomeRow, WallOutcomeRow};

/// Dependency bundle shared by every resolver.
#[derive(Clone)]
pub struct ResolverDeps {
    pub scene: Arc<dyn ScenePort>,
    pub flags: Arc<dyn FlagStore>,
    pub events: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
    pub analyzer: Arc<PairAnalyzer>,
    pub registry: Arc<FeatRegistry>,
    pub overrides: Arc<OverrideManager>,
    pub config: EngineConfig,
}

/// What one observer currently perceives of a target: the pinned override
/// state when present, otherwise the calculator's answer.
pub struct EffectiveVisibility {
    pub state: VisibilityState,
    pub detection_sense: Option<SenseKind>,
    pub override_flag: Option<OverrideFlag>,
}

impl ResolverDeps {
    pub async fn effective_visibility(
        &self,
        observer: &TokenSnapshot,
        target: &TokenSnapshot,
    ) -> Result<EffectiveVisibility, EngineError> {
        if let Some(flag) = self.overrides.get(observer.id, target.id).await? {
            return Ok(EffectiveVisibility {
                state: flag.state,
                detection_sense: None,
                override_flag: Some(flag),
            });
        }
        let input = self.analyzer.analyze(observer, target, None);
        let outcome = visibility(&input);
        Ok(EffectiveVisibility {
            state: outcome.state,
            detection_sense: outcome.detection_sense,
            override_flag: None,
        })
    }
}
