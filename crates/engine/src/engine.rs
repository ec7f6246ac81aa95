//! Engine composition root.
//!
//! One `Engine` owns every subsystem; hosts construct it with their port
//! implementations and a config value, then drive it through the action
//! entry points. Tests build a fresh engine per scenario over the
//! in-memory adapters.

use std::sync::{Arc, Mutex};

use visioner_domain::{CombatantId, CoverState, RollId, TokenId, VisibilityState, VisioningEvent};

use crate::actions::apply::{CancellationFlag, OutcomeApplier, BATCH_SIZE};
use crate::actions::diversion::{DiversionRequest, DiversionResolution, DiversionResolver};
use crate::actions::hide::{HideRequest, HideResolution, HideResolver};
use crate::actions::outcome::{BulkOutcome, OutcomeRow, WallOutcomeRow};
use crate::actions::point_out::{PointOutRequest, PointOutResolution, PointOutResolver};
use crate::actions::seek::{SeekRequest, SeekResolution, SeekResolver};
use crate::actions::sneak::{CoverModifierStore, SneakRequest, SneakResolution, SneakResolver};
use crate::actions::take_cover::{TakeCoverRequest, TakeCoverResolution, TakeCoverResolver};
use crate::actions::{EffectiveVisibility, ResolverDeps};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feats::FeatRegistry;
use crate::infrastructure::ports::{Clock, EventSink, FlagStore, ScenePort, SystemClock};
use crate::overrides::OverrideManager;
use crate::turns::tracker::{DeferredCheck, DeferredResolution, TurnSneakTracker};
use crate::vision::VisionCache;
use crate::visibility::PairAnalyzer;

pub struct Engine {
    deps: ResolverDeps,
    sneak: SneakResolver,
    seek: SeekResolver,
    hide: HideResolver,
    diversion: DiversionResolver,
    point_out: PointOutResolver,
    take_cover: TakeCoverResolver,
    applier: OutcomeApplier,
}

impl Engine {
    pub fn new(
        scene: Arc<dyn ScenePort>,
        flags: Arc<dyn FlagStore>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let cache = Arc::new(VisionCache::new(Arc::clone(&clock)));
        let analyzer = Arc::new(PairAnalyzer::new(Arc::clone(&scene), Arc::clone(&cache)));
        let registry = Arc::new(FeatRegistry::standard());
        let overrides = Arc::new(OverrideManager::new(
            Arc::clone(&flags),
            Arc::clone(&scene),
            Arc::clone(&events),
            Arc::clone(&clock),
            Arc::clone(&cache),
        ));

        let deps = ResolverDeps {
            scene,
            flags,
            events,
            clock,
            analyzer,
            registry,
            overrides: Arc::clone(&overrides),
            config,
        };

        let tracker = Arc::new(Mutex::new(TurnSneakTracker::new()));
        let cover_store = Arc::new(CoverModifierStore::new());

        Self {
            sneak: SneakResolver::new(deps.clone(), tracker, cover_store),
            seek: SeekResolver::new(deps.clone()),
            hide: HideResolver::new(deps.clone()),
            diversion: DiversionResolver::new(deps.clone()),
            point_out: PointOutResolver::new(deps.clone()),
            take_cover: TakeCoverResolver::new(deps.clone()),
            applier: OutcomeApplier::new(overrides),
            deps,
        }
    }

    /// Engine over the wall clock.
    pub fn with_system_clock(
        scene: Arc<dyn ScenePort>,
        flags: Arc<dyn FlagStore>,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self::new(scene, flags, events, Arc::new(SystemClock), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.deps.config
    }

    pub fn overrides(&self) -> &OverrideManager {
        &self.deps.overrides
    }

    /// Effective visibility for a pair: pinned override first, calculator
    /// otherwise.
    pub async fn visibility_between(
        &self,
        observer_id: TokenId,
        target_id: TokenId,
    ) -> Result<EffectiveVisibility, EngineError> {
        let Some(observer) = self.deps.scene.token(observer_id) else {
            return Err(EngineError::fatal(format!("unknown observer {observer_id}")));
        };
        let Some(target) = self.deps.scene.token(target_id) else {
            return Err(EngineError::fatal(format!("unknown target {target_id}")));
        };
        self.deps.effective_visibility(&observer, &target).await
    }

    // =========================================================================
    // Action entry points
    // =========================================================================

    pub async fn resolve_sneak(
        &self,
        request: &SneakRequest,
    ) -> Result<SneakResolution, EngineError> {
        self.sneak.resolve(request).await
    }

    pub async fn resolve_seek(&self, request: &SeekRequest) -> Result<SeekResolution, EngineError> {
        self.seek.resolve(request).await
    }

    pub async fn resolve_hide(&self, request: &HideRequest) -> Result<HideResolution, EngineError> {
        self.hide.resolve(request).await
    }

    pub async fn resolve_diversion(
        &self,
        request: &DiversionRequest,
    ) -> Result<DiversionResolution, EngineError> {
        self.diversion.resolve(request).await
    }

    pub async fn resolve_point_out(
        &self,
        request: &PointOutRequest,
    ) -> Result<PointOutResolution, EngineError> {
        self.point_out.resolve(request).await
    }

    pub fn resolve_take_cover(
        &self,
        request: &TakeCoverRequest,
    ) -> Result<TakeCoverResolution, EngineError> {
        self.take_cover.resolve(request)
    }

    // =========================================================================
    // Apply / revert
    // =========================================================================

    pub async fn apply_outcome(&self, row: &OutcomeRow) -> Result<(), EngineError> {
        self.applier.apply_row(row).await
    }

    pub async fn revert_outcome(&self, row: &OutcomeRow) -> Result<(), EngineError> {
        self.applier.revert_row(row).await
    }

    pub async fn apply_all(
        &self,
        rows: &[OutcomeRow],
        cancel: &CancellationFlag,
    ) -> Result<BulkOutcome, EngineError> {
        self.applier.apply_all(rows, cancel).await
    }

    pub async fn revert_all(
        &self,
        rows: &[OutcomeRow],
        cancel: &CancellationFlag,
    ) -> Result<BulkOutcome, EngineError> {
        self.applier.revert_all(rows, cancel).await
    }

    pub async fn apply_wall_outcomes(
        &self,
        seeker_id: TokenId,
        rows: &[WallOutcomeRow],
    ) -> Result<usize, EngineError> {
        self.seek.apply_wall_outcomes(seeker_id, rows).await
    }

    // =========================================================================
    // Sneak lifecycle
    // =========================================================================

    pub async fn begin_sneak(&self, token_id: TokenId) -> Result<(), EngineError> {
        self.sneak.begin_sneak(token_id).await
    }

    pub async fn finish_sneak(&self, token_id: TokenId) -> Result<(), EngineError> {
        self.sneak.finish_sneak(token_id).await
    }

    pub fn reband_with_cover(
        &self,
        row: &OutcomeRow,
        roll_id: RollId,
        chosen_cover: CoverState,
    ) -> Result<OutcomeRow, EngineError> {
        self.sneak.reband_with_cover(row, roll_id, chosen_cover)
    }

    pub fn is_observer_deferred(&self, combatant_id: CombatantId, observer_id: TokenId) -> bool {
        self.sneak.is_observer_deferred(combatant_id, observer_id)
    }

    pub fn undefer(
        &self,
        combatant_id: CombatantId,
        observer_id: TokenId,
    ) -> Option<DeferredCheck> {
        self.sneak.undefer(combatant_id, observer_id)
    }

    /// End-of-turn revalidation of the combatant's deferred checks.
    pub async fn process_end_of_turn(
        &self,
        combatant_id: CombatantId,
        sneaker_id: TokenId,
    ) -> Result<Vec<DeferredResolution>, EngineError> {
        self.sneak.process_end_of_turn(combatant_id, sneaker_id).await
    }

    // =========================================================================
    // Recompute
    // =========================================================================

    /// Recompute visibility for pairs in batches, yielding between batches
    /// and honoring cancellation. Pinned pairs keep their override state.
    pub async fn recompute_pairs(
        &self,
        pairs: &[(TokenId, TokenId)],
        cancel: &CancellationFlag,
    ) -> Result<usize, EngineError> {
        let mut completed = 0;
        for batch in pairs.chunks(BATCH_SIZE) {
            if cancel.is_cancelled() {
                tracing::info!(completed, "bulk recompute cancelled between batches");
                return Ok(completed);
            }
            for (observer_id, target_id) in batch {
                let view = self.visibility_between(*observer_id, *target_id).await?;
                if view.override_flag.is_none() {
                    self.deps.events.emit(VisioningEvent::VisibilityChanged {
                        observer_id: *observer_id,
                        target_id: *target_id,
                        new_state: view.state,
                        source: visioner_domain::OverrideSource::Other(
                            "auto_visibility".to_string(),
                        ),
                    });
                }
                completed += 1;
            }
            tokio::task::yield_now().await;
        }
        Ok(completed)
    }

    /// Visibility of a pair after clearing its override, per the
    /// set-then-remove round-trip.
    pub async fn recomputed_state(
        &self,
        observer_id: TokenId,
        target_id: TokenId,
    ) -> Result<VisibilityState, EngineError> {
        Ok(self.visibility_between(observer_id, target_id).await?.state)
    }
}
