extern crate self as visioner_domain;

pub mod action;
pub mod actor;
pub mod check;
pub mod cover;
pub mod error;
pub mod events;
pub mod feats;
pub mod geometry;
pub mod ids;
pub mod lighting;
pub mod overrides;
pub mod senses;
pub mod transition;
pub mod visibility;

pub use action::ActionKind;
pub use actor::{ActorKind, Condition, ConditionSet, CreatureCategory, Disposition, SizeCategory};
pub use check::{determine_degree, CheckRoll, DegreeOfSuccess};
pub use cover::CoverState;
pub use error::DomainError;
pub use events::VisioningEvent;
pub use feats::{normalize_slug, FeatSet, TerrainKind};
pub use geometry::{round_down_to_increment, Position};
pub use lighting::{DarknessRay, LightLevel, LightingSample};
pub use overrides::{
    override_flag_key, Directionality, OverrideEndpoint, OverrideFlag, OverrideSource, FLAG_SCOPE,
    OVERRIDE_KEY_PREFIX, SNEAK_ACTIVE_KEY, SNEAK_WALK_SPEED_KEY, WALLS_KEY,
};
pub use senses::{Precision, SenseDescriptor, SenseKind, SenseRange, VisionCapabilities};
pub use transition::{PositionState, PositionTransition, TransitionKind};
pub use visibility::{VisibilityState, WallVisibility};

// Re-export ID types
pub use ids::{ActorId, CombatantId, RollId, SceneId, TokenId, WallId};
