//! Feat handler registry.
//!
//! Rule overrides are keyed on normalized feat slugs and exposed through
//! five hooks, always evaluated in the same order: prerequisite
//! preprocessing, outcome shift, cover upgrade, visibility adjustment,
//! speed and distance. Handlers never see each other's results; the
//! registry owns sequencing and clamping.

use std::collections::HashMap;
use std::sync::Arc;

use visioner_domain::{
    normalize_slug, ActionKind, CoverState, DegreeOfSuccess, FeatSet, TerrainKind,
    VisibilityState,
};

/// Facts a feat hook may consult. One struct for all actions; fields that
/// do not apply to the current action hold their neutral value.
#[derive(Debug, Clone)]
pub struct FeatFacts {
    pub action: ActionKind,
    /// Current outcome band, once rolled
    pub degree: Option<DegreeOfSuccess>,
    /// Observer-to-actor distance in feet
    pub distance_feet: f64,
    pub terrain: Option<TerrainKind>,
    pub in_difficult_terrain: bool,
    pub terrain_stalker_selections: Vec<TerrainKind>,
    pub end_cover: CoverState,
    pub end_concealed: bool,
    /// Cover at the end position comes from an intervening creature
    pub cover_from_creature: bool,
    /// Size steps the covering creature has over the actor
    pub covering_creature_steps_larger: Option<i32>,
    /// Feet moved during this action
    pub movement_feet: f64,
    /// All non-allied observers currently perceive the actor as undetected
    pub all_observers_undetected: bool,
    /// Closest approach of the movement path to any enemy, in feet
    pub min_path_distance_to_enemies: Option<f64>,
    /// Seek target is a hazard/loot anomaly
    pub target_is_anomaly: bool,
}

impl FeatFacts {
    /// Neutral facts for an action (fixtures and non-positional hooks).
    pub fn neutral(action: ActionKind) -> Self {
        Self {
            action,
            degree: None,
            distance_feet: 0.0,
            terrain: None,
            in_difficult_terrain: false,
            terrain_stalker_selections: Vec::new(),
            end_cover: CoverState::None,
            end_concealed: false,
            cover_from_creature: false,
            covering_creature_steps_larger: None,
            movement_feet: 0.0,
            all_observers_undetected: false,
            min_path_distance_to_enemies: None,
            target_is_anomaly: false,
        }
    }

    /// Whether the current terrain is among the Terrain Stalker selections.
    pub fn in_selected_terrain(&self) -> bool {
        match &self.terrain {
            Some(terrain) => self.terrain_stalker_selections.contains(terrain),
            None => false,
        }
    }
}

/// Mutable prerequisite flags feat preprocessing may relax.
#[derive(Debug, Clone, Default)]
pub struct Prerequisites {
    pub start_qualifies: bool,
    pub end_qualifies: bool,
    /// Start requirement waived by a feat
    pub start_waived: bool,
    /// End requirement waived by a feat
    pub end_waived: bool,
    /// Terrain Stalker rollless Sneak
    pub free_sneak: bool,
    /// Sneaky-family deferral is available
    pub can_defer: bool,
    pub notes: Vec<String>,
}

impl Prerequisites {
    pub fn start_met(&self) -> bool {
        self.start_qualifies || self.start_waived
    }

    pub fn end_met(&self) -> bool {
        self.end_qualifies || self.end_waived
    }
}

/// Per-action speed/distance cap adjustment.
///
/// `multiplier` scales the action's base distance cap (half walk speed for
/// Sneak); `bonus_feet` is added after scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedAdjustment {
    pub multiplier: f64,
    pub bonus_feet: f64,
}

impl Default for SpeedAdjustment {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            bonus_feet: 0.0,
        }
    }
}

/// One feat's rule overrides. Default impls are no-ops, so handlers
/// implement only the hooks their feat touches.
pub trait FeatHandler: Send + Sync {
    fn slug(&self) -> &'static str;

    fn preprocess_prerequisites(&self, _facts: &FeatFacts, _prereq: &mut Prerequisites) {}

    fn outcome_shift(&self, _facts: &FeatFacts) -> i32 {
        0
    }

    fn upgrade_cover(&self, _facts: &FeatFacts, cover: CoverState) -> CoverState {
        cover
    }

    fn adjust_visibility(&self, _facts: &FeatFacts, computed: VisibilityState) -> VisibilityState {
        computed
    }

    fn speed_and_distance(&self, _facts: &FeatFacts) -> SpeedAdjustment {
        SpeedAdjustment::default()
    }
}

const SHIFT_CLAMP: i32 = 2;

/// Slug-indexed handler registry.
pub struct FeatRegistry {
    handlers: HashMap<String, Arc<dyn FeatHandler>>,
}

impl FeatRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with every built-in stealth feat installed.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for handler in super::handlers::built_in() {
            registry.register(handler);
        }
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn FeatHandler>) {
        self.handlers
            .insert(normalize_slug(handler.slug()), handler);
    }

    /// Handlers for the feats a creature actually has, slug-sorted for
    /// deterministic hook order.
    pub fn handlers_for(&self, feats: &FeatSet) -> Vec<Arc<dyn FeatHandler>> {
        let mut matched: Vec<(&String, &Arc<dyn FeatHandler>)> = self
            .handlers
            .iter()
            .filter(|(slug, _)| feats.has(slug))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(b.0));
        matched.into_iter().map(|(_, handler)| Arc::clone(handler)).collect()
    }

    /// Hook 1: prerequisite preprocessing.
    pub fn preprocess_prerequisites(
        &self,
        feats: &FeatSet,
        facts: &FeatFacts,
        prereq: &mut Prerequisites,
    ) {
        for handler in self.handlers_for(feats) {
            handler.preprocess_prerequisites(facts, prereq);
        }
    }

    /// Hook 2: accumulated outcome shift, clamped to [-2, +2] per feat and
    /// in aggregate.
    pub fn outcome_shift(&self, feats: &FeatSet, facts: &FeatFacts) -> i32 {
        let total: i32 = self
            .handlers_for(feats)
            .iter()
            .map(|handler| handler.outcome_shift(facts).clamp(-SHIFT_CLAMP, SHIFT_CLAMP))
            .sum();
        total.clamp(-SHIFT_CLAMP, SHIFT_CLAMP)
    }

    /// Hook 3: cover upgrades, applied in slug order.
    pub fn upgrade_cover(&self, feats: &FeatSet, facts: &FeatFacts, cover: CoverState) -> CoverState {
        self.handlers_for(feats)
            .iter()
            .fold(cover, |current, handler| handler.upgrade_cover(facts, current))
    }

    /// Hook 4: post-calculator visibility adjustments, applied in slug order.
    pub fn adjust_visibility(
        &self,
        feats: &FeatSet,
        facts: &FeatFacts,
        computed: VisibilityState,
    ) -> VisibilityState {
        self.handlers_for(feats)
            .iter()
            .fold(computed, |current, handler| {
                handler.adjust_visibility(facts, current)
            })
    }

    /// Hook 5: combined speed/distance adjustment. Multipliers take the
    /// best, bonuses stack.
    pub fn speed_and_distance(&self, feats: &FeatSet, facts: &FeatFacts) -> SpeedAdjustment {
        let mut combined = SpeedAdjustment::default();
        for handler in self.handlers_for(feats) {
            let adjustment = handler.speed_and_distance(facts);
            combined.multiplier = combined.multiplier.max(adjustment.multiplier);
            combined.bonus_feet += adjustment.bonus_feet;
        }
        combined
    }
}

impl Default for FeatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
