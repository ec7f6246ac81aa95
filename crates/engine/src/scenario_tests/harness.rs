//! Scenario test harness: engine plus its in-memory ports.

use std::sync::Arc;

use visioner_domain::TokenId;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::infrastructure::memory::{
    FrozenClock, MemoryEventSink, MemoryFlagStore, MemoryScene,
};
use crate::infrastructure::ports::{Clock, EventSink, FlagStore, ScenePort};
use crate::test_fixtures::TestCreature;

pub struct TestEngine {
    pub scene: Arc<MemoryScene>,
    pub flags: Arc<MemoryFlagStore>,
    pub events: Arc<MemoryEventSink>,
    pub clock: Arc<FrozenClock>,
    pub engine: Engine,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        // RUST_LOG-driven tracing for failing scenario diagnosis
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let scene = Arc::new(MemoryScene::new());
        let flags = Arc::new(MemoryFlagStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let clock = Arc::new(FrozenClock::default());
        let engine = Engine::new(
            Arc::clone(&scene) as Arc<dyn ScenePort>,
            Arc::clone(&flags) as Arc<dyn FlagStore>,
            Arc::clone(&events) as Arc<dyn EventSink>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            config,
        );
        Self {
            scene,
            flags,
            events,
            clock,
            engine,
        }
    }

    pub fn add(&self, fixture: TestCreature) -> TokenId {
        let id = fixture.token.id;
        self.scene.add_token(fixture.token, fixture.actor);
        id
    }
}
