//! The stealth action vocabulary.

use serde::{Deserialize, Serialize};

use crate::overrides::OverrideSource;

/// The six actions the resolution engine knows how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Seek,
    Hide,
    Sneak,
    CreateADiversion,
    PointOut,
    TakeCover,
}

impl ActionKind {
    /// The override source each action writes with.
    pub fn override_source(&self) -> OverrideSource {
        match self {
            Self::Seek => OverrideSource::SeekAction,
            Self::Hide => OverrideSource::HideAction,
            Self::Sneak => OverrideSource::SneakAction,
            Self::CreateADiversion => OverrideSource::DiversionAction,
            Self::PointOut => OverrideSource::PointOutAction,
            Self::TakeCover => OverrideSource::TakeCoverAction,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seek => "seek",
            Self::Hide => "hide",
            Self::Sneak => "sneak",
            Self::CreateADiversion => "create-a-diversion",
            Self::PointOut => "point-out",
            Self::TakeCover => "take-cover",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::Directionality;

    #[test]
    fn test_every_action_writes_one_way() {
        for action in [
            ActionKind::Seek,
            ActionKind::Hide,
            ActionKind::Sneak,
            ActionKind::CreateADiversion,
            ActionKind::PointOut,
            ActionKind::TakeCover,
        ] {
            assert_eq!(
                action.override_source().directionality(),
                Directionality::OneWay
            );
        }
    }
}
