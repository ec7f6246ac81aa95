//! Point Out and Take Cover scenarios.

use visioner_domain::{CoverState, Disposition, VisibilityState, VisioningEvent};

use crate::actions::point_out::PointOutRequest;
use crate::actions::take_cover::TakeCoverRequest;
use crate::infrastructure::ports::CoverReport;
use crate::test_fixtures::creature;

use super::harness::TestEngine;

#[tokio::test]
async fn test_point_out_upgrades_undetected_allies_to_hidden() {
    let rig = TestEngine::new();
    let mut pointer_fixture = creature("scout", 0.0, 0.0);
    pointer_fixture.token.disposition = Disposition::Friendly;
    let pointer = rig.add(pointer_fixture);

    let mut ally_fixture = creature("ally", 5.0, 0.0);
    ally_fixture.token.disposition = Disposition::Friendly;
    let ally = rig.add(ally_fixture);

    let mut lurker_fixture = creature("lurker", 30.0, 0.0);
    lurker_fixture.token.disposition = Disposition::Hostile;
    let lurker = rig.add(lurker_fixture);

    // The ally has lost track of the lurker entirely
    rig.engine
        .overrides()
        .set(
            ally,
            &std::collections::HashMap::from([(lurker, VisibilityState::Undetected)]),
            visioner_domain::OverrideSource::ManualAction,
        )
        .await
        .expect("override write succeeds");

    let resolution = rig
        .engine
        .resolve_point_out(&PointOutRequest {
            pointer_id: pointer,
            target_id: lurker,
        })
        .await
        .expect("point out resolves");

    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == ally)
        .expect("row for ally");
    assert_eq!(row.old_visibility, VisibilityState::Undetected);
    assert_eq!(row.new_visibility, VisibilityState::Hidden);
    assert!(row.roll.is_none());

    // Applying persists the point_out override one-way
    rig.engine.apply_outcome(row).await.expect("apply succeeds");
    let flag = rig
        .engine
        .overrides()
        .get(ally, lurker)
        .await
        .expect("read succeeds")
        .expect("flag present");
    assert_eq!(flag.source, visioner_domain::OverrideSource::PointOutAction);
    assert_eq!(flag.state, VisibilityState::Hidden);
}

#[tokio::test]
async fn test_point_out_leaves_seeing_allies_unchanged() {
    let rig = TestEngine::new();
    let mut pointer_fixture = creature("scout", 0.0, 0.0);
    pointer_fixture.token.disposition = Disposition::Friendly;
    let pointer = rig.add(pointer_fixture);

    let mut ally_fixture = creature("ally", 5.0, 0.0);
    ally_fixture.token.disposition = Disposition::Friendly;
    let ally = rig.add(ally_fixture);

    let mut lurker_fixture = creature("lurker", 30.0, 0.0);
    lurker_fixture.token.disposition = Disposition::Hostile;
    let lurker = rig.add(lurker_fixture);

    let resolution = rig
        .engine
        .resolve_point_out(&PointOutRequest {
            pointer_id: pointer,
            target_id: lurker,
        })
        .await
        .expect("point out resolves");

    // Bright light, clear line: the ally already observes the lurker
    let row = resolution
        .rows
        .iter()
        .find(|row| row.observer_id == ally)
        .expect("row for ally");
    assert_eq!(row.old_visibility, VisibilityState::Observed);
    assert_eq!(row.new_visibility, VisibilityState::Observed);
    assert!(!row.has_actionable_change);
}

#[tokio::test]
async fn test_take_cover_raises_cover_and_emits_event() {
    let rig = TestEngine::new();
    let actor = rig.add(creature("soldier", 0.0, 0.0));
    let observer = rig.add(creature("archer", 30.0, 0.0));

    rig.scene.set_cover(
        observer,
        actor,
        CoverReport {
            state: CoverState::Lesser,
            from_creature: false,
            creature_size: None,
        },
    );

    let resolution = rig
        .engine
        .resolve_take_cover(&TakeCoverRequest { token_id: actor })
        .expect("take cover resolves");
    assert_eq!(resolution.previous_cover, CoverState::Lesser);
    assert_eq!(resolution.new_cover, CoverState::Standard);

    assert!(rig.events.events().iter().any(|event| matches!(
        event,
        VisioningEvent::CoverRaised {
            new_cover: CoverState::Standard,
            ..
        }
    )));
}
