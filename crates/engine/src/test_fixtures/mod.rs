//! Shared fixtures for unit and scenario tests.

use std::collections::HashSet;

use visioner_domain::{
    ActorId, ActorKind, ConditionSet, CreatureCategory, Disposition, FeatSet, Position,
    SenseDescriptor, SizeCategory, TokenId, WallId,
};

use crate::infrastructure::ports::{
    ActorSnapshot, DoorKind, TokenSnapshot, WallSnapshot,
};

/// A token plus the actor behind it, ready for `MemoryScene::add_token`.
pub struct TestCreature {
    pub token: TokenSnapshot,
    pub actor: ActorSnapshot,
}

/// Default NPC creature at a position: medium, neutral, DC 15 across the
/// board, no special senses.
pub fn creature(name: &str, x: f64, y: f64) -> TestCreature {
    let actor_id = ActorId::new();
    TestCreature {
        token: TokenSnapshot {
            id: TokenId::new(),
            actor_id,
            name: name.to_string(),
            position: Position::new(x, y, 0.0),
            size: SizeCategory::Medium,
            disposition: Disposition::Neutral,
            hidden: false,
            actor_kind: ActorKind::Npc,
        },
        actor: ActorSnapshot {
            id: actor_id,
            conditions: ConditionSet::new(),
            feats: FeatSet::new(),
            senses: Vec::new(),
            perception_dc: 15,
            stealth_dc: 15,
            perception_rank: 1,
            creature_category: CreatureCategory::Living,
            traits: Vec::new(),
            is_dead: false,
            terrain_stalker_selections: Vec::new(),
            walk_speed_feet: 25,
            sneaky_roll_options: HashSet::new(),
            min_perception_rank: None,
        },
    }
}

/// Actor snapshot with only the given senses (implicit defaults are added
/// by extraction).
pub fn actor_with_senses(senses: Vec<SenseDescriptor>) -> ActorSnapshot {
    let mut fixture = creature("sensor", 0.0, 0.0);
    fixture.actor.senses = senses;
    fixture.actor
}

/// A Seek-discoverable wall.
pub fn hidden_wall(x1: f64, y1: f64, x2: f64, y2: f64, stealth_dc: Option<i32>) -> WallSnapshot {
    WallSnapshot {
        id: WallId::new(),
        endpoints: (Position::new(x1, y1, 0.0), Position::new(x2, y2, 0.0)),
        door: DoorKind::Secret,
        hidden_wall: true,
        stealth_dc,
        connected_walls: Vec::new(),
    }
}
