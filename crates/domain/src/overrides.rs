//! Persistent per-pair visibility overrides.
//!
//! An override pins the visibility one observer has of one target and
//! suppresses the calculator for that pair until cleared. Flags are stored
//! on the *target* token under a key derived from the observer id, so the
//! pair key is directional by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorKind;
use crate::cover::CoverState;
use crate::error::DomainError;
use crate::ids::TokenId;
use crate::visibility::VisibilityState;

/// Flag namespace on host token documents.
pub const FLAG_SCOPE: &str = "pf2e-visioner";

/// Key prefix for per-pair override flags on the target token.
pub const OVERRIDE_KEY_PREFIX: &str = "avs-override-from-";

/// Key for the per-observer discovered-wall map.
pub const WALLS_KEY: &str = "walls";

/// Key stashing the actor's pre-Sneak walk speed.
pub const SNEAK_WALK_SPEED_KEY: &str = "sneak-original-walk-speed";

/// Marker set while a Sneak action is in flight.
pub const SNEAK_ACTIVE_KEY: &str = "sneak-active";

/// Flag slot on the target token for an observer's override.
pub fn override_flag_key(observer_id: TokenId) -> String {
    format!("{OVERRIDE_KEY_PREFIX}{observer_id}")
}

/// Where an override came from; decides write directionality.
///
/// Serialized as its snake_case string form so flag payloads stay flat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OverrideSource {
    SneakAction,
    HideAction,
    DiversionAction,
    SeekAction,
    PointOutAction,
    TakeCoverAction,
    ManualAction,
    /// Region overrides, bulk system writes, anything else
    Other(String),
}

/// Whether a source writes one direction or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directionality {
    /// observer -> target only
    OneWay,
    /// both directions of the pair
    Symmetric,
}

impl OverrideSource {
    /// Action sources are directional; everything else pins both directions.
    pub fn directionality(&self) -> Directionality {
        match self {
            Self::SneakAction
            | Self::HideAction
            | Self::DiversionAction
            | Self::SeekAction
            | Self::PointOutAction
            | Self::TakeCoverAction
            | Self::ManualAction => Directionality::OneWay,
            Self::Other(_) => Directionality::Symmetric,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SneakAction => "sneak_action",
            Self::HideAction => "hide_action",
            Self::DiversionAction => "diversion_action",
            Self::SeekAction => "seek_action",
            Self::PointOutAction => "point_out_action",
            Self::TakeCoverAction => "take_cover_action",
            Self::ManualAction => "manual_action",
            Self::Other(name) => name,
        }
    }

    pub fn parse(input: &str) -> Self {
        match input {
            "sneak_action" => Self::SneakAction,
            "hide_action" => Self::HideAction,
            "diversion_action" => Self::DiversionAction,
            "seek_action" => Self::SeekAction,
            "point_out_action" => Self::PointOutAction,
            "take_cover_action" => Self::TakeCoverAction,
            "manual_action" => Self::ManualAction,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for OverrideSource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OverrideSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Persisted payload of one directional override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideFlag {
    pub state: VisibilityState,
    pub source: OverrideSource,
    pub has_cover: bool,
    pub has_concealment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_cover: Option<CoverState>,
    pub timestamp: DateTime<Utc>,
    pub observer_id: TokenId,
    pub target_id: TokenId,
    pub observer_name: String,
    pub target_name: String,
}

impl OverrideFlag {
    /// Validate and build a flag payload.
    ///
    /// `Avs` is a clear signal, never a stored state, and hazard/loot or
    /// scene-hidden endpoints can never hold overrides.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: VisibilityState,
        source: OverrideSource,
        observer: &OverrideEndpoint,
        target: &OverrideEndpoint,
        has_cover: bool,
        has_concealment: bool,
        expected_cover: Option<CoverState>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if state == VisibilityState::Avs {
            return Err(DomainError::validation(
                "override state cannot be avs; avs clears an override",
            ));
        }
        for endpoint in [observer, target] {
            if endpoint.actor_kind.is_override_exempt() {
                return Err(DomainError::constraint(format!(
                    "{} actors cannot participate in overrides ({})",
                    match endpoint.actor_kind {
                        ActorKind::Hazard => "hazard",
                        ActorKind::Loot => "loot",
                        _ => "exempt",
                    },
                    endpoint.name
                )));
            }
            if endpoint.scene_hidden {
                return Err(DomainError::constraint(format!(
                    "scene-hidden token {} cannot participate in overrides",
                    endpoint.name
                )));
            }
        }
        Ok(Self {
            state,
            source,
            has_cover,
            has_concealment,
            expected_cover,
            timestamp,
            observer_id: observer.token_id,
            target_id: target.token_id,
            observer_name: observer.name.clone(),
            target_name: target.name.clone(),
        })
    }

    /// The flag mirrored for the reverse direction (symmetric writes).
    pub fn reversed(&self) -> Self {
        Self {
            state: self.state,
            source: self.source.clone(),
            has_cover: self.has_cover,
            has_concealment: self.has_concealment,
            expected_cover: self.expected_cover,
            timestamp: self.timestamp,
            observer_id: self.target_id,
            target_id: self.observer_id,
            observer_name: self.target_name.clone(),
            target_name: self.observer_name.clone(),
        }
    }
}

/// The identity facts override validation needs about one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideEndpoint {
    pub token_id: TokenId,
    pub name: String,
    pub actor_kind: ActorKind,
    pub scene_hidden: bool,
}

impl OverrideEndpoint {
    pub fn new(
        token_id: TokenId,
        name: impl Into<String>,
        actor_kind: ActorKind,
        scene_hidden: bool,
    ) -> Self {
        Self {
            token_id,
            name: name.into(),
            actor_kind,
            scene_hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creature(name: &str) -> OverrideEndpoint {
        OverrideEndpoint::new(TokenId::new(), name, ActorKind::Npc, false)
    }

    fn flag_between(
        observer: &OverrideEndpoint,
        target: &OverrideEndpoint,
        state: VisibilityState,
    ) -> Result<OverrideFlag, DomainError> {
        OverrideFlag::new(
            state,
            OverrideSource::SneakAction,
            observer,
            target,
            false,
            false,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_avs_is_rejected() {
        let observer = creature("guard");
        let target = creature("rogue");
        assert!(flag_between(&observer, &target, VisibilityState::Avs).is_err());
    }

    #[test]
    fn test_loot_endpoint_rejected() {
        let observer = creature("guard");
        let target = OverrideEndpoint::new(TokenId::new(), "chest", ActorKind::Loot, false);
        assert!(flag_between(&observer, &target, VisibilityState::Hidden).is_err());
    }

    #[test]
    fn test_scene_hidden_endpoint_rejected() {
        let observer = OverrideEndpoint::new(TokenId::new(), "gm-token", ActorKind::Npc, true);
        let target = creature("rogue");
        assert!(flag_between(&observer, &target, VisibilityState::Hidden).is_err());
    }

    #[test]
    fn test_valid_flag_builds() {
        let observer = creature("guard");
        let target = creature("rogue");
        let flag =
            flag_between(&observer, &target, VisibilityState::Undetected).expect("valid flag");
        assert_eq!(flag.observer_id, observer.token_id);
        assert_eq!(flag.target_id, target.token_id);
    }

    #[test]
    fn test_reversed_swaps_endpoints() {
        let observer = creature("guard");
        let target = creature("rogue");
        let flag = flag_between(&observer, &target, VisibilityState::Hidden).expect("valid flag");
        let reversed = flag.reversed();
        assert_eq!(reversed.observer_id, flag.target_id);
        assert_eq!(reversed.target_id, flag.observer_id);
        assert_eq!(reversed.observer_name, "rogue");
    }

    #[test]
    fn test_directionality_policy() {
        assert_eq!(
            OverrideSource::SneakAction.directionality(),
            Directionality::OneWay
        );
        assert_eq!(
            OverrideSource::ManualAction.directionality(),
            Directionality::OneWay
        );
        assert_eq!(
            OverrideSource::Other("region_override".to_string()).directionality(),
            Directionality::Symmetric
        );
    }

    #[test]
    fn test_flag_key_format() {
        let id = TokenId::new();
        assert_eq!(override_flag_key(id), format!("avs-override-from-{id}"));
    }

    #[test]
    fn test_source_serde_round_trip() {
        for source in [
            OverrideSource::SneakAction,
            OverrideSource::PointOutAction,
            OverrideSource::Other("region_override".to_string()),
        ] {
            let json = serde_json::to_string(&source).expect("serializable");
            let back: OverrideSource = serde_json::from_str(&json).expect("deserializable");
            assert_eq!(back, source);
        }
        assert_eq!(
            serde_json::to_value(OverrideSource::Other("region_override".to_string()))
                .expect("serializable"),
            serde_json::Value::String("region_override".to_string())
        );
    }

    #[test]
    fn test_flag_serializes_camel_case() {
        let observer = creature("guard");
        let target = creature("rogue");
        let flag = flag_between(&observer, &target, VisibilityState::Hidden).expect("valid flag");
        let json = serde_json::to_value(&flag).expect("serializable");
        assert!(json.get("hasCover").is_some());
        assert!(json.get("observerId").is_some());
        assert_eq!(json["state"], "hidden");
        assert_eq!(json["source"], "sneak_action");
    }
}
