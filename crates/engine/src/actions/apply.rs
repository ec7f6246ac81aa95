//! Applying and reverting outcome rows.
//!
//! Apply turns a row into an override write under the action's source;
//! Revert restores exactly what the row displaced, override flag included.
//! Bulk operations run in fixed-size batches with a yield point between
//! them so the host event loop breathes, and honor cancellation at batch
//! boundaries: already-applied batches stay applied.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EngineError;
use crate::overrides::OverrideManager;

use super::outcome::{BulkOutcome, OutcomeRow};

/// Pairs recomputed/applied per batch before yielding.
pub const BATCH_SIZE: usize = 5;

/// Cooperative cancellation for bulk operations.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct OutcomeApplier {
    overrides: Arc<OverrideManager>,
}

impl OutcomeApplier {
    pub fn new(overrides: Arc<OverrideManager>) -> Self {
        Self { overrides }
    }

    /// Apply one row: pin the effective state for the row's pair.
    pub async fn apply_row(&self, row: &OutcomeRow) -> Result<(), EngineError> {
        let changes = HashMap::from([(row.target_id, row.effective_new_state())]);
        self.overrides
            .set(row.observer_id, &changes, row.source.clone())
            .await?;
        Ok(())
    }

    /// Revert one row: restore the displaced override, or clear the pair.
    pub async fn revert_row(&self, row: &OutcomeRow) -> Result<(), EngineError> {
        match &row.previous_override {
            Some(flag) => self.overrides.restore(flag.clone()).await?,
            None => {
                self.overrides.remove(row.observer_id, row.target_id).await?;
            }
        }
        Ok(())
    }

    /// Apply every actionable, non-deferred row in batches.
    pub async fn apply_all(
        &self,
        rows: &[OutcomeRow],
        cancel: &CancellationFlag,
    ) -> Result<BulkOutcome, EngineError> {
        let eligible: Vec<&OutcomeRow> = rows
            .iter()
            .filter(|row| !row.deferred)
            .filter(|row| row.has_actionable_change)
            .collect();
        if eligible.is_empty() {
            return Ok(BulkOutcome::NoChanges);
        }

        let mut completed = 0;
        for batch in eligible.chunks(BATCH_SIZE) {
            if cancel.is_cancelled() {
                tracing::info!(completed, "bulk apply cancelled between batches");
                return Ok(BulkOutcome::Cancelled { completed });
            }
            for row in batch {
                self.apply_row(row).await?;
                completed += 1;
            }
            tokio::task::yield_now().await;
        }
        Ok(BulkOutcome::Applied { count: completed })
    }

    /// Revert every actionable row in batches.
    pub async fn revert_all(
        &self,
        rows: &[OutcomeRow],
        cancel: &CancellationFlag,
    ) -> Result<BulkOutcome, EngineError> {
        let eligible: Vec<&OutcomeRow> = rows
            .iter()
            .filter(|row| row.has_actionable_change)
            .collect();
        if eligible.is_empty() {
            return Ok(BulkOutcome::NoChanges);
        }

        let mut completed = 0;
        for batch in eligible.chunks(BATCH_SIZE) {
            if cancel.is_cancelled() {
                tracing::info!(completed, "bulk revert cancelled between batches");
                return Ok(BulkOutcome::Cancelled { completed });
            }
            for row in batch {
                self.revert_row(row).await?;
                completed += 1;
            }
            tokio::task::yield_now().await;
        }
        Ok(BulkOutcome::Reverted { count: completed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visioner_domain::VisibilityState;

    #[test]
    fn test_cancellation_flag() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_cancelled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_avs_effective_state_routes_to_clear() {
        // Rows whose dialog override selects avs clear the pair on apply;
        // the manager interprets avs as removal, covered by its own tests.
        let state = VisibilityState::Avs;
        assert!(!state.is_concrete());
    }
}
