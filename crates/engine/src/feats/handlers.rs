//! Built-in stealth feat handlers.

use std::sync::Arc;

use visioner_domain::feats::slugs;
use visioner_domain::{ActionKind, CoverState, DegreeOfSuccess, VisibilityState};

use super::registry::{FeatFacts, FeatHandler, Prerequisites, SpeedAdjustment};

/// Minimum clear distance to every enemy for a Terrain Stalker free Sneak.
const FREE_SNEAK_ENEMY_CLEARANCE_FEET: f64 = 10.0;

/// Maximum movement for a Terrain Stalker free Sneak.
const FREE_SNEAK_MOVEMENT_FEET: f64 = 5.0;

/// Keen Eyes sharpens Seek inside this range.
const KEEN_EYES_RANGE_FEET: f64 = 30.0;

/// All built-in handlers, ready for registration.
pub fn built_in() -> Vec<Arc<dyn FeatHandler>> {
    vec![
        Arc::new(CeaselessShadows),
        Arc::new(Camouflage),
        Arc::new(LegendarySneak),
        Arc::new(VeryVerySneaky),
        Arc::new(VanishIntoTheLand),
        Arc::new(TerrainStalker),
        Arc::new(DistractingShadows),
        Arc::new(Sneaky),
        Arc::new(VerySneaky),
        Arc::new(SwiftSneak),
        Arc::new(SneakAdept),
        Arc::new(KeenEyes),
        Arc::new(ThatsOdd),
    ]
}

/// End requirement gone entirely; creature-provided cover steps up.
pub struct CeaselessShadows;

impl FeatHandler for CeaselessShadows {
    fn slug(&self) -> &'static str {
        slugs::CEASELESS_SHADOWS
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if matches!(facts.action, ActionKind::Sneak | ActionKind::Hide) {
            prereq.end_waived = true;
            prereq
                .notes
                .push("Ceaseless Shadows: no cover or concealment needed".to_string());
        }
    }

    fn upgrade_cover(&self, facts: &FeatFacts, cover: CoverState) -> CoverState {
        if facts.cover_from_creature {
            cover.stepped_up()
        } else {
            cover
        }
    }
}

/// End requirement waived in any natural terrain (urban is not natural).
pub struct Camouflage;

impl FeatHandler for Camouflage {
    fn slug(&self) -> &'static str {
        slugs::CAMOUFLAGE
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if !matches!(facts.action, ActionKind::Sneak | ActionKind::Hide) {
            return;
        }
        if facts.terrain.as_ref().is_some_and(|terrain| terrain.is_natural()) {
            prereq.end_waived = true;
            prereq
                .notes
                .push("Camouflage: natural terrain stands in for cover".to_string());
        }
    }
}

/// Hide and Sneak without cover or concealment, anywhere.
pub struct LegendarySneak;

impl FeatHandler for LegendarySneak {
    fn slug(&self) -> &'static str {
        slugs::LEGENDARY_SNEAK
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if matches!(facts.action, ActionKind::Sneak | ActionKind::Hide) {
            prereq.start_waived = true;
            prereq.end_waived = true;
            prereq
                .notes
                .push("Legendary Sneak: positional requirements waived".to_string());
        }
    }

    fn speed_and_distance(&self, _facts: &FeatFacts) -> SpeedAdjustment {
        SpeedAdjustment {
            multiplier: 2.0,
            bonus_feet: 0.0,
        }
    }
}

/// End requirement removed while sneaking.
pub struct VeryVerySneaky;

impl FeatHandler for VeryVerySneaky {
    fn slug(&self) -> &'static str {
        slugs::VERY_VERY_SNEAKY
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if facts.action == ActionKind::Sneak {
            prereq.end_waived = true;
            prereq
                .notes
                .push("Very, Very Sneaky: no end cover needed".to_string());
        }
    }

    fn speed_and_distance(&self, _facts: &FeatFacts) -> SpeedAdjustment {
        SpeedAdjustment {
            multiplier: 2.0,
            bonus_feet: 0.0,
        }
    }
}

/// Terrain Stalker selections' difficult terrain stands in for cover, and
/// success leans one step toward concealment in natural terrain.
pub struct VanishIntoTheLand;

impl FeatHandler for VanishIntoTheLand {
    fn slug(&self) -> &'static str {
        slugs::VANISH_INTO_THE_LAND
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if facts.action == ActionKind::Sneak
            && facts.in_difficult_terrain
            && facts.in_selected_terrain()
        {
            prereq.end_waived = true;
            prereq
                .notes
                .push("Vanish into the Land: difficult terrain conceals you".to_string());
        }
    }

    fn adjust_visibility(&self, facts: &FeatFacts, computed: VisibilityState) -> VisibilityState {
        let succeeded = facts.degree.is_some_and(|degree| degree.succeeded());
        let natural = facts.terrain.as_ref().is_some_and(|terrain| terrain.is_natural());
        if facts.action == ActionKind::Sneak && succeeded && natural {
            computed.step_toward_concealment()
        } else {
            computed
        }
    }
}

/// Chosen terrain waives the end requirement; tiny movements among
/// undetected observers need no roll at all.
pub struct TerrainStalker;

impl FeatHandler for TerrainStalker {
    fn slug(&self) -> &'static str {
        slugs::TERRAIN_STALKER
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if facts.action != ActionKind::Sneak || !facts.in_selected_terrain() {
            return;
        }
        prereq.end_waived = true;
        prereq
            .notes
            .push("Terrain Stalker: chosen terrain covers you".to_string());

        let clearance_ok = facts
            .min_path_distance_to_enemies
            .is_some_and(|clearance| clearance >= FREE_SNEAK_ENEMY_CLEARANCE_FEET);
        if facts.movement_feet <= FREE_SNEAK_MOVEMENT_FEET
            && facts.all_observers_undetected
            && clearance_ok
        {
            prereq.free_sneak = true;
            prereq.notes.push("Terrain Stalker: free Sneak".to_string());
        }
    }
}

/// A bigger creature's shadow is cover enough.
pub struct DistractingShadows;

impl FeatHandler for DistractingShadows {
    fn slug(&self) -> &'static str {
        slugs::DISTRACTING_SHADOWS
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if !matches!(facts.action, ActionKind::Sneak | ActionKind::Hide) {
            return;
        }
        let bigger = facts
            .covering_creature_steps_larger
            .is_some_and(|steps| steps >= 1);
        if bigger && facts.cover_from_creature && facts.end_cover.is_some() {
            prereq.end_qualifies = true;
            prereq
                .notes
                .push("Distracting Shadows: larger creature provides cover".to_string());
        }
    }
}

/// Defer the end-position check to end of turn.
pub struct Sneaky;

impl FeatHandler for Sneaky {
    fn slug(&self) -> &'static str {
        slugs::SNEAKY
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if facts.action == ActionKind::Sneak {
            prereq.can_defer = true;
        }
    }
}

/// Sneaky's deferral plus a little extra distance.
pub struct VerySneaky;

impl FeatHandler for VerySneaky {
    fn slug(&self) -> &'static str {
        slugs::VERY_SNEAKY
    }

    fn preprocess_prerequisites(&self, facts: &FeatFacts, prereq: &mut Prerequisites) {
        if facts.action == ActionKind::Sneak {
            prereq.can_defer = true;
        }
    }

    fn speed_and_distance(&self, _facts: &FeatFacts) -> SpeedAdjustment {
        SpeedAdjustment {
            multiplier: 1.0,
            bonus_feet: 5.0,
        }
    }
}

/// Sneak at full speed.
pub struct SwiftSneak;

impl FeatHandler for SwiftSneak {
    fn slug(&self) -> &'static str {
        slugs::SWIFT_SNEAK
    }

    fn speed_and_distance(&self, _facts: &FeatFacts) -> SpeedAdjustment {
        SpeedAdjustment {
            multiplier: 2.0,
            bonus_feet: 0.0,
        }
    }
}

/// Failed Sneaks become plain successes (critical failures stay).
pub struct SneakAdept;

impl FeatHandler for SneakAdept {
    fn slug(&self) -> &'static str {
        slugs::SNEAK_ADEPT
    }

    fn outcome_shift(&self, facts: &FeatFacts) -> i32 {
        if facts.action == ActionKind::Sneak && facts.degree == Some(DegreeOfSuccess::Failure) {
            1
        } else {
            0
        }
    }
}

/// Nearby undetected creatures register as at least hidden when Seeking.
pub struct KeenEyes;

impl FeatHandler for KeenEyes {
    fn slug(&self) -> &'static str {
        slugs::KEEN_EYES
    }

    fn adjust_visibility(&self, facts: &FeatFacts, computed: VisibilityState) -> VisibilityState {
        if facts.action == ActionKind::Seek
            && facts.distance_feet <= KEEN_EYES_RANGE_FEET
            && computed == VisibilityState::Undetected
        {
            VisibilityState::Hidden
        } else {
            computed
        }
    }
}

/// Anomalies stand out: hazards and loot register even without the
/// proficiency to understand them.
pub struct ThatsOdd;

impl FeatHandler for ThatsOdd {
    fn slug(&self) -> &'static str {
        slugs::THATS_ODD
    }

    fn adjust_visibility(&self, facts: &FeatFacts, computed: VisibilityState) -> VisibilityState {
        if facts.action == ActionKind::Seek
            && facts.target_is_anomaly
            && computed == VisibilityState::Undetected
        {
            VisibilityState::Hidden
        } else {
            computed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feats::registry::FeatRegistry;
    use visioner_domain::{FeatSet, TerrainKind};

    fn sneak_facts() -> FeatFacts {
        FeatFacts::neutral(ActionKind::Sneak)
    }

    #[test]
    fn test_ceaseless_shadows_waives_end_and_steps_cover() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::CEASELESS_SHADOWS]);
        let mut facts = sneak_facts();
        facts.cover_from_creature = true;

        let mut prereq = Prerequisites::default();
        registry.preprocess_prerequisites(&feats, &facts, &mut prereq);
        assert!(prereq.end_waived);

        let upgraded = registry.upgrade_cover(&feats, &facts, CoverState::Lesser);
        assert_eq!(upgraded, CoverState::Standard);
    }

    #[test]
    fn test_camouflage_requires_natural_terrain() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::CAMOUFLAGE]);

        let mut facts = sneak_facts();
        facts.terrain = Some(TerrainKind::Forest);
        let mut prereq = Prerequisites::default();
        registry.preprocess_prerequisites(&feats, &facts, &mut prereq);
        assert!(prereq.end_waived);

        facts.terrain = Some(TerrainKind::Urban);
        let mut prereq = Prerequisites::default();
        registry.preprocess_prerequisites(&feats, &facts, &mut prereq);
        assert!(!prereq.end_waived);
    }

    #[test]
    fn test_legendary_sneak_waives_both_ends() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::LEGENDARY_SNEAK]);
        let mut prereq = Prerequisites::default();
        registry.preprocess_prerequisites(&feats, &sneak_facts(), &mut prereq);
        assert!(prereq.start_waived);
        assert!(prereq.end_waived);
    }

    #[test]
    fn test_terrain_stalker_free_sneak_conditions() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::TERRAIN_STALKER]);

        let mut facts = sneak_facts();
        facts.terrain = Some(TerrainKind::Forest);
        facts.terrain_stalker_selections = vec![TerrainKind::Forest];
        facts.movement_feet = 5.0;
        facts.all_observers_undetected = true;
        facts.min_path_distance_to_enemies = Some(15.0);

        let mut prereq = Prerequisites::default();
        registry.preprocess_prerequisites(&feats, &facts, &mut prereq);
        assert!(prereq.free_sneak);
        assert!(prereq
            .notes
            .iter()
            .any(|note| note == "Terrain Stalker: free Sneak"));

        // Too close to an enemy
        facts.min_path_distance_to_enemies = Some(5.0);
        let mut prereq = Prerequisites::default();
        registry.preprocess_prerequisites(&feats, &facts, &mut prereq);
        assert!(!prereq.free_sneak);
        assert!(prereq.end_waived);
    }

    #[test]
    fn test_distracting_shadows_needs_bigger_creature() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::DISTRACTING_SHADOWS]);

        let mut facts = sneak_facts();
        facts.cover_from_creature = true;
        facts.end_cover = CoverState::Lesser;
        facts.covering_creature_steps_larger = Some(1);

        let mut prereq = Prerequisites::default();
        registry.preprocess_prerequisites(&feats, &facts, &mut prereq);
        assert!(prereq.end_qualifies);

        facts.covering_creature_steps_larger = Some(0);
        let mut prereq = Prerequisites::default();
        registry.preprocess_prerequisites(&feats, &facts, &mut prereq);
        assert!(!prereq.end_qualifies);
    }

    #[test]
    fn test_sneak_adept_promotes_failure_only() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::SNEAK_ADEPT]);

        let mut facts = sneak_facts();
        facts.degree = Some(DegreeOfSuccess::Failure);
        assert_eq!(registry.outcome_shift(&feats, &facts), 1);

        facts.degree = Some(DegreeOfSuccess::CriticalFailure);
        assert_eq!(registry.outcome_shift(&feats, &facts), 0);

        facts.degree = Some(DegreeOfSuccess::Success);
        assert_eq!(registry.outcome_shift(&feats, &facts), 0);
    }

    #[test]
    fn test_vanish_into_the_land_bumps_success() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::VANISH_INTO_THE_LAND]);

        let mut facts = sneak_facts();
        facts.degree = Some(DegreeOfSuccess::Success);
        facts.terrain = Some(TerrainKind::Swamp);

        let adjusted = registry.adjust_visibility(&feats, &facts, VisibilityState::Hidden);
        assert_eq!(adjusted, VisibilityState::Undetected);
    }

    #[test]
    fn test_keen_eyes_only_inside_thirty_feet() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::KEEN_EYES]);

        let mut facts = FeatFacts::neutral(ActionKind::Seek);
        facts.distance_feet = 25.0;
        assert_eq!(
            registry.adjust_visibility(&feats, &facts, VisibilityState::Undetected),
            VisibilityState::Hidden
        );

        facts.distance_feet = 45.0;
        assert_eq!(
            registry.adjust_visibility(&feats, &facts, VisibilityState::Undetected),
            VisibilityState::Undetected
        );
    }

    #[test]
    fn test_speed_adjustments_combine() {
        let registry = FeatRegistry::standard();
        let feats = FeatSet::from_raw([slugs::VERY_SNEAKY, slugs::SWIFT_SNEAK]);
        let adjustment = registry.speed_and_distance(&feats, &sneak_facts());
        assert_eq!(adjustment.multiplier, 2.0);
        assert_eq!(adjustment.bonus_feet, 5.0);
    }
}
