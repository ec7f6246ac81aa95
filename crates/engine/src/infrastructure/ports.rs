//! Port traits for host boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is
//! concrete types. Ports exist for:
//! - Scene queries (tokens, walls, grid, geometry, lighting)
//! - Flag persistence (per-entity KV on the host's documents)
//! - Event emission (visibility change notifications)
//! - Clock (for testing and flag timestamps)
//!
//! Scene queries are synchronous snapshots: resolvers read the scene once at
//! the start of a resolution and never suspend mid-computation. Flag
//! persistence is the engine's only host I/O and the only async boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

use visioner_domain::{
    ActorId, ConditionSet, CreatureCategory, DarknessRay, Disposition, FeatSet, LightingSample,
    Position, SenseDescriptor, SizeCategory, TerrainKind, TokenId, VisioningEvent, WallId,
};
use visioner_domain::ActorKind;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Geometry query failed: {0}")]
    QueryFailed(String),
    #[error("Token not found: {0}")]
    TokenNotFound(TokenId),
}

#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("Flag read failed: {0}")]
    ReadFailed(String),
    #[error("Flag write failed: {0}")]
    WriteFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// Snapshot Types
// =============================================================================

/// One token as the scene reports it at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSnapshot {
    pub id: TokenId,
    pub actor_id: ActorId,
    pub name: String,
    pub position: Position,
    pub size: SizeCategory,
    pub disposition: Disposition,
    /// Scene-hidden (GM-hidden); excluded from computation when set
    pub hidden: bool,
    pub actor_kind: ActorKind,
}

/// One wall segment as the scene reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct WallSnapshot {
    pub id: WallId,
    pub endpoints: (Position, Position),
    pub door: DoorKind,
    /// Only walls marked hidden are Seek-discoverable
    pub hidden_wall: bool,
    /// Custom stealth DC; falls back to the configured wall DC
    pub stealth_dc: Option<i32>,
    /// Linked wall ids sharing discovery state
    pub connected_walls: Vec<WallId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorKind {
    None,
    Door,
    Secret,
}

/// Rules-relevant data of the actor behind a token.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub conditions: ConditionSet,
    pub feats: FeatSet,
    pub senses: Vec<SenseDescriptor>,
    pub perception_dc: i32,
    pub stealth_dc: i32,
    /// Perception proficiency rank 0-4 (untrained..legendary)
    pub perception_rank: u8,
    pub creature_category: CreatureCategory,
    pub traits: Vec<String>,
    pub is_dead: bool,
    /// Terrain Stalker selections (empty when the feat is absent)
    pub terrain_stalker_selections: Vec<TerrainKind>,
    pub walk_speed_feet: u32,
    /// Observers this actor holds a "sneaky vs" roll option against
    pub sneaky_roll_options: HashSet<TokenId>,
    /// Hazard/loot: minimum Perception rank required to Seek this out
    pub min_perception_rank: Option<u8>,
}

/// Cover auto-detection result for a pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverReport {
    pub state: visioner_domain::CoverState,
    /// Cover provided by an intervening creature rather than terrain
    pub from_creature: bool,
    /// Size of the covering creature, when from a creature
    pub creature_size: Option<SizeCategory>,
}

// =============================================================================
// Scene Port
// =============================================================================

/// Host-provided scene query interface.
///
/// All methods are synchronous reads over the host's current scene state;
/// implementations should answer from a consistent snapshot.
pub trait ScenePort: Send + Sync {
    fn tokens_in_scene(&self) -> Vec<TokenSnapshot>;
    fn walls_in_scene(&self) -> Vec<WallSnapshot>;
    fn grid_feet_per_square(&self) -> f64;
    fn token(&self, id: TokenId) -> Option<TokenSnapshot>;
    fn actor(&self, id: ActorId) -> Option<ActorSnapshot>;

    /// Distance between two points in feet (pre-rounding).
    fn distance_feet(&self, a: &Position, b: &Position) -> Result<f64, GeometryError>;

    fn has_line_of_sight(&self, a: &Position, b: &Position) -> Result<bool, GeometryError>;

    fn light_level_at(&self, point: &Position) -> Result<LightingSample, GeometryError>;

    fn ray_crosses_darkness(&self, a: &Position, b: &Position) -> Result<DarknessRay, GeometryError>;

    /// Auto-detected cover the target enjoys against the observer.
    fn cover_between(&self, observer: &Position, target: &Position)
        -> Result<CoverReport, GeometryError>;

    /// Terrain region kind at a point, when the scene marks one.
    fn terrain_at(&self, point: &Position) -> Option<TerrainKind>;

    /// Whether the terrain at a point is difficult terrain.
    fn is_difficult_terrain_at(&self, point: &Position) -> bool;

    fn in_combat(&self) -> bool;

    fn is_combatant(&self, token_id: TokenId) -> bool;
}

// =============================================================================
// Flag Store Port
// =============================================================================

/// Host-provided per-entity KV store (token document flags).
///
/// The only persistence the core owns; the only suspension point inside a
/// resolution.
#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn get_flag(&self, token_id: TokenId, key: &str) -> Result<Option<Value>, FlagError>;

    async fn set_flag(&self, token_id: TokenId, key: &str, value: Value) -> Result<(), FlagError>;

    async fn unset_flag(&self, token_id: TokenId, key: &str) -> Result<(), FlagError>;

    /// All flags on a token whose key starts with `prefix`.
    async fn flags_with_prefix(
        &self,
        token_id: TokenId,
        prefix: &str,
    ) -> Result<Vec<(String, Value)>, FlagError>;
}

// =============================================================================
// Event Sink Port
// =============================================================================

/// Receiver for core-emitted visibility change events.
///
/// Emission is synchronous and in-order per source observer.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, event: VisioningEvent);
}

// =============================================================================
// Clock Port
// =============================================================================

/// Time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
