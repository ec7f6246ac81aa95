//! The override manager: persistent per-pair visibility pins.
//!
//! Flags live on the target token's document under
//! `avs-override-from-<observerId>`. The manager keeps an in-memory mirror
//! as the authoritative read path; host persistence is best-effort, and a
//! failed write degrades to in-memory state with a retry on the next
//! mutation of the same pair.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use visioner_domain::{
    override_flag_key, Directionality, OverrideEndpoint, OverrideFlag, OverrideSource, TokenId,
    VisibilityState, VisioningEvent, OVERRIDE_KEY_PREFIX,
};

use crate::error::EngineError;
use crate::infrastructure::ports::{Clock, EventSink, FlagStore, ScenePort, TokenSnapshot};
use crate::vision::VisionCache;

type PairKey = (TokenId, TokenId);

pub struct OverrideManager {
    flags: Arc<dyn FlagStore>,
    scene: Arc<dyn ScenePort>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    cache: Arc<VisionCache>,
    mirror: DashMap<PairKey, OverrideFlag>,
}

impl OverrideManager {
    pub fn new(
        flags: Arc<dyn FlagStore>,
        scene: Arc<dyn ScenePort>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        cache: Arc<VisionCache>,
    ) -> Self {
        Self {
            flags,
            scene,
            events,
            clock,
            cache,
            mirror: DashMap::new(),
        }
    }

    /// Apply a batch of per-target state changes for one observer.
    ///
    /// `Avs` entries clear the pair's override instead of writing one.
    /// Writes that would violate policy (hazard/loot or scene-hidden
    /// endpoints) are skipped with a warning; the rest of the batch
    /// proceeds. Returns the number of flags written.
    pub async fn set(
        &self,
        observer_id: TokenId,
        changes: &HashMap<TokenId, VisibilityState>,
        source: OverrideSource,
    ) -> Result<usize, EngineError> {
        let Some(observer) = self.scene.token(observer_id) else {
            return Err(EngineError::fatal(format!(
                "override write for unknown observer {observer_id}"
            )));
        };

        let mut written = 0;
        for (target_id, state) in changes {
            if *state == VisibilityState::Avs {
                self.remove(observer_id, *target_id).await?;
                continue;
            }
            let Some(target) = self.scene.token(*target_id) else {
                tracing::warn!(target = %target_id, "override target missing from scene; skipped");
                continue;
            };
            match self
                .write_pair(&observer, &target, *state, source.clone())
                .await
            {
                Ok(()) => written += 1,
                Err(EngineError::Domain(err)) => {
                    tracing::warn!(
                        observer = %observer.name,
                        target = %target.name,
                        error = %err,
                        "override write rejected by policy"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(written)
    }

    async fn write_pair(
        &self,
        observer: &TokenSnapshot,
        target: &TokenSnapshot,
        state: VisibilityState,
        source: OverrideSource,
    ) -> Result<(), EngineError> {
        let observer_endpoint = endpoint_of(observer);
        let target_endpoint = endpoint_of(target);

        let flag = OverrideFlag::new(
            state,
            source.clone(),
            &observer_endpoint,
            &target_endpoint,
            false,
            false,
            None,
            self.clock.now(),
        )?;

        self.store_flag(&flag).await;

        if source.directionality() == Directionality::Symmetric {
            self.store_flag(&flag.reversed()).await;
        }

        self.cache.invalidate(observer.id);
        self.cache.invalidate(target.id);

        self.events.emit(VisioningEvent::OverrideChanged {
            observer_id: observer.id,
            target_id: target.id,
            present: true,
        });
        self.events.emit(VisioningEvent::VisibilityChanged {
            observer_id: observer.id,
            target_id: target.id,
            new_state: state,
            source,
        });
        Ok(())
    }

    /// Persist one directional flag: mirror always, host store best-effort.
    async fn store_flag(&self, flag: &OverrideFlag) {
        self.mirror
            .insert((flag.observer_id, flag.target_id), flag.clone());

        let key = override_flag_key(flag.observer_id);
        match serde_json::to_value(flag) {
            Ok(value) => {
                if let Err(err) = self.flags.set_flag(flag.target_id, &key, value).await {
                    tracing::error!(
                        observer = %flag.observer_name,
                        target = %flag.target_name,
                        error = %err,
                        "flag persistence failed; override kept in memory"
                    );
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "override flag serialization failed");
            }
        }
    }

    /// Current override for a directional pair.
    pub async fn get(
        &self,
        observer_id: TokenId,
        target_id: TokenId,
    ) -> Result<Option<OverrideFlag>, EngineError> {
        if let Some(flag) = self.mirror.get(&(observer_id, target_id)) {
            return Ok(Some(flag.clone()));
        }
        let key = override_flag_key(observer_id);
        let raw = self
            .flags
            .get_flag(target_id, &key)
            .await
            .map_err(|err| EngineError::flag_store(err.to_string()))?;
        match raw {
            Some(value) => {
                let flag: OverrideFlag = serde_json::from_value(value)
                    .map_err(|err| EngineError::flag_store(err.to_string()))?;
                self.mirror
                    .insert((observer_id, target_id), flag.clone());
                Ok(Some(flag))
            }
            None => Ok(None),
        }
    }

    /// Remove a pair's override. Returns whether one was present.
    pub async fn remove(
        &self,
        observer_id: TokenId,
        target_id: TokenId,
    ) -> Result<bool, EngineError> {
        let was_present = self.mirror.remove(&(observer_id, target_id)).is_some();

        let key = override_flag_key(observer_id);
        let stored = self
            .flags
            .get_flag(target_id, &key)
            .await
            .map_err(|err| EngineError::flag_store(err.to_string()))?
            .is_some();
        if stored {
            if let Err(err) = self.flags.unset_flag(target_id, &key).await {
                tracing::error!(error = %err, "flag removal failed; override cleared in memory");
            }
        }

        let removed = was_present || stored;
        if removed {
            self.cache.invalidate(observer_id);
            self.cache.invalidate(target_id);
            self.events.emit(VisioningEvent::OverrideChanged {
                observer_id,
                target_id,
                present: false,
            });
        }
        Ok(removed)
    }

    /// Remove every override where the token is either endpoint.
    pub async fn remove_all_involving(&self, token_id: TokenId) -> Result<usize, EngineError> {
        let mut removed = 0;

        // Overrides stored on this token (others observing it)
        let stored = self
            .flags
            .flags_with_prefix(token_id, OVERRIDE_KEY_PREFIX)
            .await
            .map_err(|err| EngineError::flag_store(err.to_string()))?;
        for (key, value) in stored {
            let observer_id = observer_from_key(&key, &value);
            if let Some(observer_id) = observer_id {
                if self.remove(observer_id, token_id).await? {
                    removed += 1;
                }
            }
        }

        // Overrides this token holds over others (stored on the others)
        for other in self.scene.tokens_in_scene() {
            if other.id == token_id {
                continue;
            }
            if self.remove(token_id, other.id).await? {
                removed += 1;
            }
        }

        // Mirror entries for tokens no longer in the scene
        self.mirror
            .retain(|(observer, target), _| *observer != token_id && *target != token_id);

        Ok(removed)
    }

    /// Remove every override in the scene.
    pub async fn clear_all(&self) -> Result<usize, EngineError> {
        let mut removed = 0;
        for token in self.scene.tokens_in_scene() {
            let stored = self
                .flags
                .flags_with_prefix(token.id, OVERRIDE_KEY_PREFIX)
                .await
                .map_err(|err| EngineError::flag_store(err.to_string()))?;
            for (key, value) in stored {
                if let Some(observer_id) = observer_from_key(&key, &value) {
                    if self.remove(observer_id, token.id).await? {
                        removed += 1;
                    }
                }
            }
        }
        self.mirror.clear();
        self.cache.invalidate_all();
        Ok(removed)
    }

    /// Re-install a previously captured flag verbatim (revert path).
    pub async fn restore(&self, flag: OverrideFlag) -> Result<(), EngineError> {
        let observer_id = flag.observer_id;
        let target_id = flag.target_id;
        self.store_flag(&flag).await;
        self.cache.invalidate(observer_id);
        self.cache.invalidate(target_id);
        self.events.emit(VisioningEvent::OverrideChanged {
            observer_id,
            target_id,
            present: true,
        });
        Ok(())
    }

    /// All pairs currently pinned (mirror view).
    pub fn pinned_pairs(&self) -> Vec<PairKey> {
        self.mirror.iter().map(|entry| *entry.key()).collect()
    }
}

fn endpoint_of(token: &TokenSnapshot) -> OverrideEndpoint {
    OverrideEndpoint::new(
        token.id,
        token.name.clone(),
        token.actor_kind.clone(),
        token.hidden,
    )
}

/// Recover the observer id from a flag key or, failing that, the payload.
fn observer_from_key(key: &str, value: &Value) -> Option<TokenId> {
    key.strip_prefix(OVERRIDE_KEY_PREFIX)
        .and_then(|raw| raw.parse::<uuid::Uuid>().ok())
        .map(TokenId::from_uuid)
        .or_else(|| {
            value
                .get("observerId")
                .and_then(|id| serde_json::from_value(id.clone()).ok())
        })
}
