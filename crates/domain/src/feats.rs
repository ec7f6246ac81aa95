//! Feat slugs: normalization and the stealth-relevant slug vocabulary.
//!
//! Feats arrive from the host as display names or loosely formatted slugs.
//! Everything rule-relevant is keyed on the normalized form, so
//! "That's Odd", "thats-odd" and "That’s Odd" all hash to the same entry.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Normalize a feat name or slug to its canonical key.
///
/// Lowercase; apostrophes (straight and curly) removed; every other
/// non-alphanumeric run becomes a single `-`; edge hyphens stripped.
/// Idempotent: `normalize_slug(normalize_slug(s)) == normalize_slug(s)`.
pub fn normalize_slug(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for ch in input.chars() {
        if ch == '\'' || ch == '\u{2019}' || ch == '\u{2018}' {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Normalized feat slugs attached to one creature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatSet(HashSet<String>);

impl FeatSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw names/slugs, normalizing each.
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            raw.into_iter()
                .map(|name| normalize_slug(name.as_ref()))
                .filter(|slug| !slug.is_empty())
                .collect(),
        )
    }

    /// Membership by any spelling; the query is normalized too.
    pub fn has(&self, slug: &str) -> bool {
        self.0.contains(&normalize_slug(slug))
    }

    pub fn insert(&mut self, slug: &str) {
        let normalized = normalize_slug(slug);
        if !normalized.is_empty() {
            self.0.insert(normalized);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Canonical slugs for the feats the resolution engine understands.
pub mod slugs {
    pub const SNEAKY: &str = "sneaky";
    pub const VERY_SNEAKY: &str = "very-sneaky";
    pub const VERY_VERY_SNEAKY: &str = "very-very-sneaky";
    pub const LEGENDARY_SNEAK: &str = "legendary-sneak";
    pub const SWIFT_SNEAK: &str = "swift-sneak";
    pub const CEASELESS_SHADOWS: &str = "ceaseless-shadows";
    pub const CAMOUFLAGE: &str = "camouflage";
    pub const VANISH_INTO_THE_LAND: &str = "vanish-into-the-land";
    pub const TERRAIN_STALKER: &str = "terrain-stalker";
    pub const DISTRACTING_SHADOWS: &str = "distracting-shadows";
    pub const SNEAK_ADEPT: &str = "sneak-adept";
    pub const KEEN_EYES: &str = "keen-eyes";
    pub const THATS_ODD: &str = "thats-odd";
}

/// Natural terrain kinds recognized by Camouflage and Terrain Stalker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerrainKind {
    Aquatic,
    Arctic,
    Desert,
    Forest,
    Mountain,
    Plains,
    Sky,
    Swamp,
    Underground,
    Urban,
    Other(String),
}

impl TerrainKind {
    /// Natural terrain set for Camouflage (urban is excluded).
    pub fn is_natural(&self) -> bool {
        !matches!(self, Self::Urban | Self::Other(_))
    }

    pub fn parse(slug: &str) -> Self {
        match normalize_slug(slug).as_str() {
            "aquatic" => Self::Aquatic,
            "arctic" => Self::Arctic,
            "desert" => Self::Desert,
            "forest" => Self::Forest,
            "mountain" => Self::Mountain,
            "plains" => Self::Plains,
            "sky" => Self::Sky,
            "swamp" => Self::Swamp,
            "underground" => Self::Underground,
            "urban" => Self::Urban,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Aquatic => "aquatic",
            Self::Arctic => "arctic",
            Self::Desert => "desert",
            Self::Forest => "forest",
            Self::Mountain => "mountain",
            Self::Plains => "plains",
            Self::Sky => "sky",
            Self::Swamp => "swamp",
            Self::Underground => "underground",
            Self::Urban => "urban",
            Self::Other(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_equivalence_class() {
        assert_eq!(normalize_slug("That's Odd"), "thats-odd");
        assert_eq!(normalize_slug("thats-odd"), "thats-odd");
        assert_eq!(normalize_slug("That\u{2019}s Odd"), "thats-odd");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["Vanish into the Land!", "  Keen   Eyes ", "very_very_sneaky"] {
            let once = normalize_slug(input);
            assert_eq!(normalize_slug(&once), once);
        }
    }

    #[test]
    fn test_normalize_strips_edge_hyphens() {
        assert_eq!(normalize_slug("--Sneaky--"), "sneaky");
        assert_eq!(normalize_slug("(Terrain Stalker)"), "terrain-stalker");
    }

    #[test]
    fn test_normalize_collapses_runs() {
        assert_eq!(normalize_slug("very  very   sneaky"), "very-very-sneaky");
    }

    #[test]
    fn test_feat_set_membership_any_spelling() {
        let feats = FeatSet::from_raw(["That's Odd", "Legendary Sneak"]);
        assert!(feats.has("thats-odd"));
        assert!(feats.has("That\u{2019}s Odd"));
        assert!(feats.has(slugs::LEGENDARY_SNEAK));
        assert!(!feats.has(slugs::SNEAKY));
    }

    #[test]
    fn test_terrain_natural_set_excludes_urban() {
        assert!(TerrainKind::Forest.is_natural());
        assert!(TerrainKind::Underground.is_natural());
        assert!(!TerrainKind::Urban.is_natural());
    }
}
