//! Sneak scenarios: prerequisites, deferral, free sneaks, re-banding.

use std::collections::HashMap;

use visioner_domain::{
    CheckRoll, CombatantId, CoverState, DegreeOfSuccess, FeatSet, RollId, TerrainKind, TokenId,
    VisibilityState, VisioningEvent,
};

use crate::actions::apply::CancellationFlag;
use crate::infrastructure::ports::FlagStore;
use crate::actions::outcome::BulkOutcome;
use crate::actions::sneak::SneakRequest;
use crate::infrastructure::ports::CoverReport;
use crate::test_fixtures::creature;
use crate::turns::tracker::TurnStamp;

use super::harness::TestEngine;

fn sneak_request(
    sneaker: TokenId,
    combatant: Option<CombatantId>,
    roll: CheckRoll,
    start_states: HashMap<TokenId, VisibilityState>,
) -> SneakRequest {
    SneakRequest {
        sneaker_id: sneaker,
        combatant_id: combatant,
        roll_id: RollId::new(),
        roll,
        stamp: TurnStamp {
            round: 1,
            turn_index: 0,
        },
        start_states,
        start_position: None,
        movement_feet: 15.0,
        min_path_distance_to_enemies: None,
        cover_bonus_in_roll: 0,
        dialog_overrides: HashMap::new(),
    }
}

/// S2: Sneaky sneaker, qualifying start, failing end, successful roll.
/// The row defers, Apply All skips it, and the tracker records the check.
#[tokio::test]
async fn test_sneaky_defers_failing_end_position() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("rogue", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Sneaky"]);
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 15;
    let observer = rig.add(observer_fixture);

    let combatant = CombatantId::new();
    let roll = CheckRoll::from_total(18, 10).expect("valid roll");
    let request = sneak_request(
        sneaker,
        Some(combatant),
        roll,
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );

    let resolution = rig.engine.resolve_sneak(&request).await.expect("sneak resolves");
    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == observer)
        .expect("row for observer");

    assert_eq!(row.degree, Some(DegreeOfSuccess::Success));
    assert!(row.deferred);
    assert!(!row.prerequisites_met);
    assert!(rig.engine.is_observer_deferred(combatant, observer));
    assert!(rig
        .events
        .events()
        .iter()
        .any(|event| matches!(event, VisioningEvent::DeferredCheckScheduled { .. })));

    // Apply All skips deferred rows entirely
    let bulk = rig
        .engine
        .apply_all(&resolution.rows, &CancellationFlag::new())
        .await
        .expect("bulk apply completes");
    assert_eq!(bulk, BulkOutcome::NoChanges);
}

/// Deferred checks revalidate at end of turn: a position that now
/// qualifies keeps the sneak result, one that does not forces observed.
#[tokio::test]
async fn test_end_of_turn_revalidation() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("rogue", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Sneaky"]);
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 15;
    let observer = rig.add(observer_fixture);

    let combatant = CombatantId::new();
    let roll = CheckRoll::from_total(18, 10).expect("valid roll");
    let request = sneak_request(
        sneaker,
        Some(combatant),
        roll,
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );
    rig.engine.resolve_sneak(&request).await.expect("sneak resolves");
    assert!(rig.engine.is_observer_deferred(combatant, observer));

    // The sneaker ducks behind standard cover before the turn ends
    rig.scene.set_cover(
        observer,
        sneaker,
        CoverReport {
            state: CoverState::Standard,
            from_creature: false,
            creature_size: None,
        },
    );

    let resolutions = rig
        .engine
        .process_end_of_turn(combatant, sneaker)
        .await
        .expect("end of turn processes");
    assert_eq!(resolutions.len(), 1);
    assert!(resolutions[0].kept);
    assert_eq!(resolutions[0].final_visibility, VisibilityState::Undetected);

    // The kept result was pinned for the pair
    let flag = rig
        .engine
        .overrides()
        .get(observer, sneaker)
        .await
        .expect("read succeeds")
        .expect("flag present");
    assert_eq!(flag.state, VisibilityState::Undetected);
    assert!(rig
        .events
        .events()
        .iter()
        .any(|event| matches!(event, VisioningEvent::DeferredCheckResolved { .. })));
}

#[tokio::test]
async fn test_end_of_turn_forces_observed_when_still_exposed() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("rogue", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Very Sneaky"]);
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 15;
    let observer = rig.add(observer_fixture);

    let combatant = CombatantId::new();
    let roll = CheckRoll::from_total(18, 10).expect("valid roll");
    let request = sneak_request(
        sneaker,
        Some(combatant),
        roll,
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );
    rig.engine.resolve_sneak(&request).await.expect("sneak resolves");

    let resolutions = rig
        .engine
        .process_end_of_turn(combatant, sneaker)
        .await
        .expect("end of turn processes");
    assert_eq!(resolutions.len(), 1);
    assert!(!resolutions[0].kept);
    assert_eq!(resolutions[0].final_visibility, VisibilityState::Observed);
}

/// Invariant 7: undeferring recovers the original outcome and snapshot.
#[tokio::test]
async fn test_undefer_round_trip() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("rogue", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Sneaky"]);
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 15;
    let observer = rig.add(observer_fixture);

    let combatant = CombatantId::new();
    let roll = CheckRoll::from_total(18, 10).expect("valid roll");
    let request = sneak_request(
        sneaker,
        Some(combatant),
        roll,
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );
    rig.engine.resolve_sneak(&request).await.expect("sneak resolves");

    let check = rig
        .engine
        .undefer(combatant, observer)
        .expect("deferred check present");
    assert_eq!(check.original_outcome.roll, roll);
    assert_eq!(check.original_outcome.degree, DegreeOfSuccess::Success);
    assert_eq!(
        check.original_outcome.start_visibility,
        VisibilityState::Hidden
    );
    assert!(!rig.engine.is_observer_deferred(combatant, observer));
}

/// S3: Terrain Stalker in chosen forest terrain, tiny movement, everyone
/// undetected, clear of enemies: Sneak resolves without a roll.
#[tokio::test]
async fn test_terrain_stalker_free_sneak() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("stalker", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Terrain Stalker"]);
    sneaker_fixture.actor.terrain_stalker_selections = vec![TerrainKind::Forest];
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 15;
    let observer = rig.add(observer_fixture);

    rig.scene.set_terrain(Some(TerrainKind::Forest), true);

    // All non-allies already perceive the stalker as undetected
    rig.engine
        .overrides()
        .set(
            observer,
            &HashMap::from([(sneaker, VisibilityState::Undetected)]),
            visioner_domain::OverrideSource::ManualAction,
        )
        .await
        .expect("override write succeeds");

    let mut request = sneak_request(sneaker, None, CheckRoll::from_total(10, 5).expect("valid roll"), HashMap::new());
    request.movement_feet = 5.0;
    request.min_path_distance_to_enemies = Some(15.0);

    let resolution = rig.engine.resolve_sneak(&request).await.expect("sneak resolves");
    assert!(resolution.free_sneak);

    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == observer)
        .expect("row for observer");
    assert!(row.roll.is_none());
    assert_eq!(row.degree, Some(DegreeOfSuccess::Success));
    assert_eq!(row.new_visibility, VisibilityState::Undetected);
    assert!(row
        .feat_notes
        .iter()
        .any(|note| note == "Terrain Stalker: free Sneak"));
}

/// S6: Camouflage does not apply in urban terrain; a naturally failing
/// end prerequisite stays failing and the result is forced to observed.
#[tokio::test]
async fn test_camouflage_does_not_apply_in_urban_terrain() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("rogue", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Camouflage"]);
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 15;
    let observer = rig.add(observer_fixture);

    rig.scene.set_terrain(Some(TerrainKind::Urban), false);

    let roll = CheckRoll::from_total(19, 11).expect("valid roll");
    let request = sneak_request(
        sneaker,
        None,
        roll,
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );
    let resolution = rig.engine.resolve_sneak(&request).await.expect("sneak resolves");
    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == observer)
        .expect("row for observer");

    assert_eq!(row.degree, Some(DegreeOfSuccess::Success));
    assert!(!row.prerequisites_met);
    assert!(!row.deferred);
    assert_eq!(row.new_visibility, VisibilityState::Observed);
}

/// Invariant 6: failing prerequisites without relaxation force observed
/// regardless of the roll.
#[tokio::test]
async fn test_unqualified_start_forces_observed() {
    let rig = TestEngine::new();
    let sneaker = rig.add(creature("clumsy", 20.0, 0.0));
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 10;
    let observer = rig.add(observer_fixture);

    // Start state: observed (live calculation, bright light, no cover)
    let roll = CheckRoll::from_total(30, 18).expect("valid roll");
    let request = sneak_request(sneaker, None, roll, HashMap::new());
    let resolution = rig.engine.resolve_sneak(&request).await.expect("sneak resolves");
    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == observer)
        .expect("row for observer");

    assert!(row.degree.expect("degree present").succeeded());
    assert_eq!(row.new_visibility, VisibilityState::Observed);
}

/// A roll failure earlier in the turn coerces later Sneak results against
/// that observer to the avs sentinel.
#[tokio::test]
async fn test_roll_failure_yields_pair_to_calculator() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("rogue", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Sneaky"]);
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 25;
    let observer = rig.add(observer_fixture);

    let combatant = CombatantId::new();
    // First sneak fails the roll
    let failing = sneak_request(
        sneaker,
        Some(combatant),
        CheckRoll::from_total(12, 4).expect("valid roll"),
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );
    rig.engine.resolve_sneak(&failing).await.expect("sneak resolves");

    // Second sneak the same turn: pair yields to auto-visibility
    let retry = sneak_request(
        sneaker,
        Some(combatant),
        CheckRoll::from_total(30, 18).expect("valid roll"),
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );
    let resolution = rig.engine.resolve_sneak(&retry).await.expect("sneak resolves");
    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == observer)
        .expect("row for observer");
    assert_eq!(row.new_visibility, VisibilityState::Avs);
}

/// Sneak Adept promotes a failed band to success before the transition
/// table applies.
#[tokio::test]
async fn test_sneak_adept_promotes_failure() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("adept", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Sneak Adept", "Legendary Sneak"]);
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 20;
    let observer = rig.add(observer_fixture);

    // Total 17 vs DC 20: failure, promoted to success by Sneak Adept;
    // Legendary Sneak waives the positional prerequisites.
    let roll = CheckRoll::from_total(17, 9).expect("valid roll");
    let request = sneak_request(
        sneaker,
        None,
        roll,
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );
    let resolution = rig.engine.resolve_sneak(&request).await.expect("sneak resolves");
    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == observer)
        .expect("row for observer");
    assert_eq!(row.degree, Some(DegreeOfSuccess::Success));
    assert_eq!(row.new_visibility, VisibilityState::Undetected);
}

/// Cover re-banding swaps the cover bonus without re-rolling: the die is
/// preserved and the band recomputes from the adjusted total.
#[tokio::test]
async fn test_reband_with_cover_preserves_die() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("rogue", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Legendary Sneak"]);
    let sneaker = rig.add(sneaker_fixture);
    let mut observer_fixture = creature("guard", 0.0, 0.0);
    observer_fixture.actor.perception_dc = 20;
    let observer = rig.add(observer_fixture);

    // Roll included +2 from standard cover: total 19 vs DC 20 fails
    let roll = CheckRoll::from_total(19, 9).expect("valid roll");
    let mut request = sneak_request(
        sneaker,
        None,
        roll,
        HashMap::from([(observer, VisibilityState::Hidden)]),
    );
    request.cover_bonus_in_roll = 2;
    let roll_id = request.roll_id;

    let resolution = rig.engine.resolve_sneak(&request).await.expect("sneak resolves");
    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == observer)
        .expect("row for observer");
    assert_eq!(row.degree, Some(DegreeOfSuccess::Failure));

    // The dialog grants greater cover (+4): total becomes 21, a success
    let rebanded = rig
        .engine
        .reband_with_cover(row, roll_id, CoverState::Greater)
        .expect("reband succeeds");
    let new_roll = rebanded.roll.expect("roll present");
    assert_eq!(new_roll.die, 9);
    assert_eq!(new_roll.total, 21);
    assert_eq!(rebanded.degree, Some(DegreeOfSuccess::Success));
    assert_eq!(rebanded.new_visibility, VisibilityState::Undetected);
}

/// Feats widen the per-Sneak distance cap.
#[tokio::test]
async fn test_distance_cap_reflects_speed_feats() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("swift", 20.0, 0.0);
    sneaker_fixture.actor.feats = FeatSet::from_raw(["Swift Sneak"]);
    sneaker_fixture.actor.walk_speed_feet = 30;
    let sneaker = rig.add(sneaker_fixture);
    rig.add(creature("guard", 0.0, 0.0));

    let roll = CheckRoll::from_total(15, 5).expect("valid roll");
    let request = sneak_request(sneaker, None, roll, HashMap::new());
    let resolution = rig.engine.resolve_sneak(&request).await.expect("sneak resolves");
    // Full speed instead of half
    assert_eq!(resolution.distance_cap_feet, 30.0);
}

/// Sneak bookkeeping flags: walk speed stashed while active, cleared after.
#[tokio::test]
async fn test_sneak_walk_speed_flags() {
    let rig = TestEngine::new();
    let mut sneaker_fixture = creature("rogue", 0.0, 0.0);
    sneaker_fixture.actor.walk_speed_feet = 30;
    let sneaker = rig.add(sneaker_fixture);

    rig.engine.begin_sneak(sneaker).await.expect("begin succeeds");
    let speed = rig
        .flags
        .get_flag(sneaker, visioner_domain::SNEAK_WALK_SPEED_KEY)
        .await
        .expect("flag read succeeds");
    assert_eq!(speed, Some(serde_json::json!(30)));
    let active = rig
        .flags
        .get_flag(sneaker, visioner_domain::SNEAK_ACTIVE_KEY)
        .await
        .expect("flag read succeeds");
    assert_eq!(active, Some(serde_json::json!(true)));

    rig.engine.finish_sneak(sneaker).await.expect("finish succeeds");
    assert_eq!(
        rig.flags
            .get_flag(sneaker, visioner_domain::SNEAK_ACTIVE_KEY)
            .await
            .expect("flag read succeeds"),
        None
    );
}
