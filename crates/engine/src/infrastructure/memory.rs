//! In-memory port implementations.
//!
//! Reference adapters for tests and for hosts that keep scene state in
//! process. Geometry is Euclidean over token positions; LoS, lighting,
//! cover, and darkness rays are explicit per-pair fixtures rather than
//! computed from wall data.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use visioner_domain::{
    ActorId, CoverState, DarknessRay, LightingSample, Position, TerrainKind, TokenId,
    VisioningEvent, WallId,
};

use super::ports::{
    ActorSnapshot, Clock, CoverReport, EventSink, FlagError, FlagStore, GeometryError, ScenePort,
    TokenSnapshot, WallSnapshot,
};

/// Key for per-pair fixtures, order-sensitive (observer, target).
type PairKey = (TokenId, TokenId);

/// In-memory scene with fixture-driven geometry.
#[derive(Default)]
pub struct MemoryScene {
    tokens: RwLock<HashMap<TokenId, TokenSnapshot>>,
    actors: RwLock<HashMap<ActorId, ActorSnapshot>>,
    walls: RwLock<HashMap<WallId, WallSnapshot>>,
    grid_feet: RwLock<f64>,
    blocked_sight: RwLock<HashMap<PairKey, bool>>,
    lighting: RwLock<HashMap<TokenId, LightingSample>>,
    default_lighting: RwLock<LightingSample>,
    cover: RwLock<HashMap<PairKey, CoverReport>>,
    darkness_rays: RwLock<HashMap<PairKey, DarknessRay>>,
    terrain: RwLock<Option<TerrainKind>>,
    difficult_terrain: RwLock<bool>,
    in_combat: RwLock<bool>,
    combatants: RwLock<Vec<TokenId>>,
    geometry_broken: AtomicBool,
}

impl MemoryScene {
    pub fn new() -> Self {
        let scene = Self::default();
        *scene.grid_feet.write().expect("lock poisoned") = 5.0;
        *scene.default_lighting.write().expect("lock poisoned") = LightingSample::bright();
        scene
    }

    pub fn add_token(&self, token: TokenSnapshot, actor: ActorSnapshot) {
        self.tokens
            .write()
            .expect("lock poisoned")
            .insert(token.id, token.clone());
        self.actors
            .write()
            .expect("lock poisoned")
            .insert(actor.id, actor);
    }

    pub fn add_wall(&self, wall: WallSnapshot) {
        self.walls
            .write()
            .expect("lock poisoned")
            .insert(wall.id, wall);
    }

    pub fn set_position(&self, token_id: TokenId, position: Position) {
        if let Some(token) = self.tokens.write().expect("lock poisoned").get_mut(&token_id) {
            token.position = position;
        }
    }

    pub fn set_lighting_at(&self, token_id: TokenId, sample: LightingSample) {
        self.lighting
            .write()
            .expect("lock poisoned")
            .insert(token_id, sample);
    }

    pub fn set_default_lighting(&self, sample: LightingSample) {
        *self.default_lighting.write().expect("lock poisoned") = sample;
    }

    /// Fixture: cover the target has against the observer.
    pub fn set_cover(&self, observer: TokenId, target: TokenId, report: CoverReport) {
        self.cover
            .write()
            .expect("lock poisoned")
            .insert((observer, target), report);
    }

    pub fn block_sight(&self, observer: TokenId, target: TokenId) {
        self.blocked_sight
            .write()
            .expect("lock poisoned")
            .insert((observer, target), true);
    }

    pub fn set_darkness_ray(&self, observer: TokenId, target: TokenId, ray: DarknessRay) {
        self.darkness_rays
            .write()
            .expect("lock poisoned")
            .insert((observer, target), ray);
    }

    pub fn set_terrain(&self, terrain: Option<TerrainKind>, difficult: bool) {
        *self.terrain.write().expect("lock poisoned") = terrain;
        *self.difficult_terrain.write().expect("lock poisoned") = difficult;
    }

    pub fn set_in_combat(&self, in_combat: bool, combatants: Vec<TokenId>) {
        *self.in_combat.write().expect("lock poisoned") = in_combat;
        *self.combatants.write().expect("lock poisoned") = combatants;
    }

    /// Make every geometry query fail (GeometryUnavailable drills).
    pub fn break_geometry(&self, broken: bool) {
        self.geometry_broken.store(broken, Ordering::SeqCst);
    }

    fn check_geometry(&self) -> Result<(), GeometryError> {
        if self.geometry_broken.load(Ordering::SeqCst) {
            return Err(GeometryError::QueryFailed(
                "scene geometry unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn token_near(&self, point: &Position) -> Option<TokenSnapshot> {
        self.tokens
            .read()
            .expect("lock poisoned")
            .values()
            .find(|token| token.position.distance_to(point) < 0.5)
            .cloned()
    }

    fn pair_key(&self, a: &Position, b: &Position) -> Option<PairKey> {
        let from = self.token_near(a)?;
        let to = self.token_near(b)?;
        Some((from.id, to.id))
    }
}

impl ScenePort for MemoryScene {
    fn tokens_in_scene(&self) -> Vec<TokenSnapshot> {
        self.tokens
            .read()
            .expect("lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn walls_in_scene(&self) -> Vec<WallSnapshot> {
        self.walls
            .read()
            .expect("lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn grid_feet_per_square(&self) -> f64 {
        *self.grid_feet.read().expect("lock poisoned")
    }

    fn token(&self, id: TokenId) -> Option<TokenSnapshot> {
        self.tokens.read().expect("lock poisoned").get(&id).cloned()
    }

    fn actor(&self, id: ActorId) -> Option<ActorSnapshot> {
        self.actors.read().expect("lock poisoned").get(&id).cloned()
    }

    fn distance_feet(&self, a: &Position, b: &Position) -> Result<f64, GeometryError> {
        self.check_geometry()?;
        Ok(a.distance_to(b))
    }

    fn has_line_of_sight(&self, a: &Position, b: &Position) -> Result<bool, GeometryError> {
        self.check_geometry()?;
        if let Some(key) = self.pair_key(a, b) {
            if self
                .blocked_sight
                .read()
                .expect("lock poisoned")
                .get(&key)
                .copied()
                .unwrap_or(false)
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn light_level_at(&self, point: &Position) -> Result<LightingSample, GeometryError> {
        self.check_geometry()?;
        if let Some(token) = self.token_near(point) {
            if let Some(sample) = self.lighting.read().expect("lock poisoned").get(&token.id) {
                return Ok(*sample);
            }
        }
        Ok(*self.default_lighting.read().expect("lock poisoned"))
    }

    fn ray_crosses_darkness(&self, a: &Position, b: &Position) -> Result<DarknessRay, GeometryError> {
        self.check_geometry()?;
        if let Some(key) = self.pair_key(a, b) {
            if let Some(ray) = self.darkness_rays.read().expect("lock poisoned").get(&key) {
                return Ok(*ray);
            }
        }
        Ok(DarknessRay::clear())
    }

    fn cover_between(
        &self,
        observer: &Position,
        target: &Position,
    ) -> Result<CoverReport, GeometryError> {
        self.check_geometry()?;
        if let Some(key) = self.pair_key(observer, target) {
            if let Some(report) = self.cover.read().expect("lock poisoned").get(&key) {
                return Ok(*report);
            }
        }
        Ok(CoverReport {
            state: CoverState::None,
            from_creature: false,
            creature_size: None,
        })
    }

    fn terrain_at(&self, _point: &Position) -> Option<TerrainKind> {
        self.terrain.read().expect("lock poisoned").clone()
    }

    fn is_difficult_terrain_at(&self, _point: &Position) -> bool {
        *self.difficult_terrain.read().expect("lock poisoned")
    }

    fn in_combat(&self) -> bool {
        *self.in_combat.read().expect("lock poisoned")
    }

    fn is_combatant(&self, token_id: TokenId) -> bool {
        self.combatants
            .read()
            .expect("lock poisoned")
            .contains(&token_id)
    }
}

/// In-memory flag store over a concurrent map.
#[derive(Default)]
pub struct MemoryFlagStore {
    flags: DashMap<TokenId, HashMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (FlagStoreFailure drills).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn get_flag(&self, token_id: TokenId, key: &str) -> Result<Option<Value>, FlagError> {
        Ok(self
            .flags
            .get(&token_id)
            .and_then(|entry| entry.get(key).cloned()))
    }

    async fn set_flag(&self, token_id: TokenId, key: &str, value: Value) -> Result<(), FlagError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FlagError::WriteFailed("flag store offline".to_string()));
        }
        self.flags
            .entry(token_id)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn unset_flag(&self, token_id: TokenId, key: &str) -> Result<(), FlagError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FlagError::WriteFailed("flag store offline".to_string()));
        }
        if let Some(mut entry) = self.flags.get_mut(&token_id) {
            entry.remove(key);
        }
        Ok(())
    }

    async fn flags_with_prefix(
        &self,
        token_id: TokenId,
        prefix: &str,
    ) -> Result<Vec<(String, Value)>, FlagError> {
        Ok(self
            .flags
            .get(&token_id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|(key, _)| key.starts_with(prefix))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Event sink that records everything for assertions.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<VisioningEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<VisioningEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.events.lock().expect("lock poisoned").clear();
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: VisioningEvent) {
        self.events.lock().expect("lock poisoned").push(event);
    }
}

/// Controllable clock for TTL and timestamp tests.
pub struct FrozenClock {
    now: Mutex<DateTime<Utc>>,
}

impl FrozenClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("lock poisoned");
        *now += by;
    }
}

impl Default for FrozenClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flag_store_round_trip() {
        let store = MemoryFlagStore::new();
        let token = TokenId::new();
        store
            .set_flag(token, "walls", serde_json::json!({"a": "observed"}))
            .await
            .expect("write succeeds");
        let value = store.get_flag(token, "walls").await.expect("read succeeds");
        assert_eq!(value, Some(serde_json::json!({"a": "observed"})));

        store.unset_flag(token, "walls").await.expect("unset succeeds");
        assert_eq!(
            store.get_flag(token, "walls").await.expect("read succeeds"),
            None
        );
    }

    #[tokio::test]
    async fn test_flags_with_prefix() {
        let store = MemoryFlagStore::new();
        let token = TokenId::new();
        store
            .set_flag(token, "avs-override-from-a", serde_json::json!(1))
            .await
            .expect("write succeeds");
        store
            .set_flag(token, "avs-override-from-b", serde_json::json!(2))
            .await
            .expect("write succeeds");
        store
            .set_flag(token, "walls", serde_json::json!(3))
            .await
            .expect("write succeeds");

        let matches = store
            .flags_with_prefix(token, "avs-override-from-")
            .await
            .expect("scan succeeds");
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_frozen_clock_advances() {
        let clock = FrozenClock::default();
        let before = clock.now();
        clock.advance(Duration::seconds(3));
        assert_eq!(clock.now() - before, Duration::seconds(3));
    }
}
