//! Domain Events
//!
//! Coarse-grained events representing visibility state changes. These are the
//! core's outward-facing notifications - the host maps them to canvas
//! refreshes, socket broadcasts, or chat messages at its own boundary.

use serde::{Deserialize, Serialize};

use crate::cover::CoverState;
use crate::ids::TokenId;
use crate::overrides::OverrideSource;
use crate::visibility::VisibilityState;

/// Event emitted by the resolution core on state changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum VisioningEvent {
    /// The effective visibility of target from observer changed
    VisibilityChanged {
        observer_id: TokenId,
        target_id: TokenId,
        new_state: VisibilityState,
        source: OverrideSource,
    },
    /// An override flag was written or removed for a pair
    OverrideChanged {
        observer_id: TokenId,
        target_id: TokenId,
        present: bool,
    },
    /// A Sneaky-feat deferred check was recorded
    DeferredCheckScheduled {
        sneaker_id: TokenId,
        observer_id: TokenId,
    },
    /// A deferred check was revalidated at end of turn or undeferred
    DeferredCheckResolved {
        sneaker_id: TokenId,
        observer_id: TokenId,
        result: VisibilityState,
    },
    /// Take Cover raised the acting token's cover
    CoverRaised {
        token_id: TokenId,
        new_cover: CoverState,
    },
    /// Internal invariant violation surfaced to the host
    EngineFault { message: String },
}

impl VisioningEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::VisibilityChanged { .. } => "visibility_changed",
            Self::OverrideChanged { .. } => "override_changed",
            Self::DeferredCheckScheduled { .. } => "deferred_check_scheduled",
            Self::DeferredCheckResolved { .. } => "deferred_check_resolved",
            Self::CoverRaised { .. } => "cover_raised",
            Self::EngineFault { .. } => "engine_fault",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let event = VisioningEvent::OverrideChanged {
            observer_id: TokenId::new(),
            target_id: TokenId::new(),
            present: true,
        };
        assert_eq!(event.event_type(), "override_changed");
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = VisioningEvent::VisibilityChanged {
            observer_id: TokenId::new(),
            target_id: TokenId::new(),
            new_state: VisibilityState::Hidden,
            source: OverrideSource::SneakAction,
        };
        let json = serde_json::to_value(&event).expect("serializable");
        assert!(json["visibilityChanged"].get("observerId").is_some());
        assert_eq!(json["visibilityChanged"]["newState"], "hidden");
    }
}
