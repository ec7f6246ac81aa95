//! Short-TTL cache for derived vision capabilities.
//!
//! Capability extraction walks the actor's sense list and conditions on
//! every pair; a scene-wide recompute touches every observer many times.
//! Entries live ~2 seconds and are dropped on any override write or flag
//! mutation observed on a relevant token.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use visioner_domain::{TokenId, VisionCapabilities};

use crate::infrastructure::ports::Clock;

const DEFAULT_TTL_MS: i64 = 2_000;

struct CacheEntry {
    capabilities: VisionCapabilities,
    computed_at: DateTime<Utc>,
}

/// TTL cache keyed by token.
pub struct VisionCache {
    entries: DashMap<TokenId, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl VisionCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::milliseconds(DEFAULT_TTL_MS),
            clock,
        }
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Fetch fresh-enough capabilities or derive them with `compute`.
    pub fn get_or_compute<F>(&self, token_id: TokenId, compute: F) -> VisionCapabilities
    where
        F: FnOnce() -> VisionCapabilities,
    {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(&token_id) {
            if now - entry.computed_at < self.ttl {
                return entry.capabilities.clone();
            }
        }
        let capabilities = compute();
        self.entries.insert(
            token_id,
            CacheEntry {
                capabilities: capabilities.clone(),
                computed_at: now,
            },
        );
        capabilities
    }

    /// Drop one token's entry (its flags or conditions changed).
    pub fn invalidate(&self, token_id: TokenId) {
        self.entries.remove(&token_id);
    }

    /// Drop everything (bulk override mutation).
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::FrozenClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counted_compute(counter: &AtomicU32) -> VisionCapabilities {
        counter.fetch_add(1, Ordering::SeqCst);
        VisionCapabilities::empty()
    }

    #[test]
    fn test_fresh_entry_is_reused() {
        let clock = Arc::new(FrozenClock::default());
        let cache = VisionCache::new(clock);
        let token = TokenId::new();
        let computes = AtomicU32::new(0);

        cache.get_or_compute(token, || counted_compute(&computes));
        cache.get_or_compute(token, || counted_compute(&computes));
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expired_entry_recomputes() {
        let clock = Arc::new(FrozenClock::default());
        let cache = VisionCache::new(Arc::clone(&clock) as Arc<dyn Clock>);
        let token = TokenId::new();
        let computes = AtomicU32::new(0);

        cache.get_or_compute(token, || counted_compute(&computes));
        clock.advance(Duration::seconds(3));
        cache.get_or_compute(token, || counted_compute(&computes));
        assert_eq!(computes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let clock = Arc::new(FrozenClock::default());
        let cache = VisionCache::new(clock);
        let token = TokenId::new();
        let computes = AtomicU32::new(0);

        cache.get_or_compute(token, || counted_compute(&computes));
        cache.invalidate(token);
        cache.get_or_compute(token, || counted_compute(&computes));
        assert_eq!(computes.load(Ordering::SeqCst), 2);
    }
}
