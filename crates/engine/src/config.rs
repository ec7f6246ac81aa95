//! Engine configuration.
//!
//! The host owns persistence of these options; the engine receives a value
//! at construction and treats it as immutable for the engine's lifetime.

use serde::{Deserialize, Serialize};

/// Options the resolution core recognizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Master switch for calculator-driven visibility
    pub auto_visibility_enabled: bool,
    /// Drop allied observers from action subject lists
    pub ignore_allies: bool,
    /// Exclude scene-hidden tokens from subject lists entirely
    pub hide_foundry_hidden_tokens: bool,
    /// Start action dialogs with the encounter filter on
    pub default_encounter_filter: bool,
    /// Cap Seek range while in combat
    pub limit_seek_range_in_combat: bool,
    /// Cap Seek range out of combat
    pub limit_seek_range_out_of_combat: bool,
    /// Seek cap in feet (combat)
    pub custom_seek_distance: u32,
    /// Seek cap in feet (exploration)
    pub custom_seek_distance_out_of_combat: u32,
    /// Default stealth DC for hidden walls without a custom DC
    pub wall_stealth_dc: i32,
    /// Default stealth DC for loot actors without a custom DC
    pub loot_stealth_dc: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_visibility_enabled: true,
            ignore_allies: false,
            hide_foundry_hidden_tokens: true,
            default_encounter_filter: false,
            limit_seek_range_in_combat: false,
            limit_seek_range_out_of_combat: false,
            custom_seek_distance: 30,
            custom_seek_distance_out_of_combat: 60,
            wall_stealth_dc: 15,
            loot_stealth_dc: 15,
        }
    }
}

impl EngineConfig {
    /// Effective Seek cap in feet for the given combat state, if any.
    pub fn seek_range_cap(&self, in_combat: bool) -> Option<u32> {
        if in_combat && self.limit_seek_range_in_combat {
            Some(self.custom_seek_distance)
        } else if !in_combat && self.limit_seek_range_out_of_combat {
            Some(self.custom_seek_distance_out_of_combat)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_cap_selection() {
        let config = EngineConfig {
            limit_seek_range_in_combat: true,
            custom_seek_distance: 30,
            limit_seek_range_out_of_combat: false,
            ..EngineConfig::default()
        };
        assert_eq!(config.seek_range_cap(true), Some(30));
        assert_eq!(config.seek_range_cap(false), None);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"ignoreAllies":true}"#).expect("partial config parses");
        assert!(config.ignore_allies);
        assert!(config.auto_visibility_enabled);
        assert_eq!(config.wall_stealth_dc, 15);
    }
}
