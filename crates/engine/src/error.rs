//! Engine error taxonomy.
//!
//! Computation paths are total: per-pair analysis failures degrade that
//! pair's result only, and a batch never aborts because one pair failed.
//! Conditions that are *outcomes* rather than failures (a sense that cannot
//! detect this target, a proficiency gate) are typed outcome-row variants,
//! not errors - see `actions::outcome::OutcomeGate`.

use thiserror::Error;

use visioner_domain::{DomainError, TokenId};

/// Unified error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Distance/LoS/lighting query failed; the affected sense is skipped
    #[error("Geometry unavailable: {0}")]
    GeometryUnavailable(String),

    /// Actor lacks expected structure; treated as an empty capability set
    #[error("Missing capability data for {token_id}: {detail}")]
    MissingCapability { token_id: TokenId, detail: String },

    /// Flag persistence read/write failed; engine continues in-memory
    #[error("Flag store failure: {0}")]
    FlagStoreFailure(String),

    /// Sneak resolution without a captured start state
    #[error("Position data missing for {token_id}")]
    PositionDataMissing { token_id: TokenId },

    /// Domain-level validation failed
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Internal invariant violation; propagated to the host as an error event
    #[error("Internal invariant violated: {0}")]
    Fatal(String),
}

impl EngineError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::GeometryUnavailable(msg.into())
    }

    pub fn missing_capability(token_id: TokenId, detail: impl Into<String>) -> Self {
        Self::MissingCapability {
            token_id,
            detail: detail.into(),
        }
    }

    pub fn flag_store(msg: impl Into<String>) -> Self {
        Self::FlagStoreFailure(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        let err = EngineError::geometry("wall query timed out");
        assert_eq!(err.to_string(), "Geometry unavailable: wall query timed out");

        let id = TokenId::new();
        let err = EngineError::missing_capability(id, "no senses list");
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_domain_errors_convert() {
        let err: EngineError = DomainError::validation("bad state").into();
        assert!(matches!(err, EngineError::Domain(_)));
    }
}
