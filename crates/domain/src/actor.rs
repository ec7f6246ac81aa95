//! Actor classification: kinds, dispositions, creature categories, conditions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What kind of entity owns a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActorKind {
    Character,
    Npc,
    Hazard,
    Loot,
    Familiar,
    Other(String),
}

impl ActorKind {
    /// Hazards and loot never participate in pair overrides.
    pub fn is_override_exempt(&self) -> bool {
        matches!(self, Self::Hazard | Self::Loot)
    }

    /// Creatures act and observe; hazards and loot are only ever targets.
    pub fn is_creature(&self) -> bool {
        matches!(self, Self::Character | Self::Npc | Self::Familiar)
    }
}

/// Token disposition toward the party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Disposition {
    Friendly,
    Neutral,
    Hostile,
    Secret,
}

impl Disposition {
    /// Two tokens on the same side (the ally filter's test).
    pub fn is_allied_with(&self, other: Disposition) -> bool {
        matches!(
            (self, other),
            (Self::Friendly, Disposition::Friendly) | (Self::Hostile, Disposition::Hostile)
        )
    }
}

/// Coarse creature category, used by the lifesense gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CreatureCategory {
    Living,
    Undead,
    Construct,
}

impl CreatureCategory {
    /// Lifesense detects life force and void: living and undead, never
    /// constructs.
    pub fn lifesense_detectable(&self) -> bool {
        !matches!(self, Self::Construct)
    }

    /// Scent keys off living bodies.
    pub fn scent_detectable(&self) -> bool {
        matches!(self, Self::Living)
    }
}

/// Creature size categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SizeCategory {
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
    Gargantuan,
}

impl SizeCategory {
    /// Numeric rank for size comparisons (Distracting Shadows needs "at
    /// least one size larger").
    pub fn rank(&self) -> i32 {
        match self {
            Self::Tiny => 0,
            Self::Small => 1,
            Self::Medium => 2,
            Self::Large => 3,
            Self::Huge => 4,
            Self::Gargantuan => 5,
        }
    }

    /// Steps larger than `other` (negative when smaller).
    pub fn steps_larger_than(&self, other: SizeCategory) -> i32 {
        self.rank() - other.rank()
    }
}

/// Condition slugs the resolution engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    Blinded,
    Deafened,
    Invisible,
    Flying,
    Dead,
    Other(String),
}

impl Condition {
    pub fn parse(slug: &str) -> Self {
        match slug {
            "blinded" => Self::Blinded,
            "deafened" => Self::Deafened,
            "invisible" => Self::Invisible,
            "flying" => Self::Flying,
            "dead" => Self::Dead,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Set of active conditions on an actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet(HashSet<Condition>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slugs<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            slugs
                .into_iter()
                .map(|slug| Condition::parse(slug.as_ref()))
                .collect(),
        )
    }

    pub fn insert(&mut self, condition: Condition) {
        self.0.insert(condition);
    }

    pub fn has(&self, condition: &Condition) -> bool {
        self.0.contains(condition)
    }

    pub fn is_blinded(&self) -> bool {
        self.has(&Condition::Blinded)
    }

    pub fn is_deafened(&self) -> bool {
        self.has(&Condition::Deafened)
    }

    pub fn is_invisible(&self) -> bool {
        self.has(&Condition::Invisible)
    }

    pub fn is_flying(&self) -> bool {
        self.has(&Condition::Flying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_exempt_kinds() {
        assert!(ActorKind::Hazard.is_override_exempt());
        assert!(ActorKind::Loot.is_override_exempt());
        assert!(!ActorKind::Npc.is_override_exempt());
        assert!(!ActorKind::Familiar.is_override_exempt());
    }

    #[test]
    fn test_lifesense_gate() {
        assert!(CreatureCategory::Living.lifesense_detectable());
        assert!(CreatureCategory::Undead.lifesense_detectable());
        assert!(!CreatureCategory::Construct.lifesense_detectable());
    }

    #[test]
    fn test_scent_gate() {
        assert!(CreatureCategory::Living.scent_detectable());
        assert!(!CreatureCategory::Undead.scent_detectable());
        assert!(!CreatureCategory::Construct.scent_detectable());
    }

    #[test]
    fn test_condition_set_from_slugs() {
        let conditions = ConditionSet::from_slugs(["blinded", "prone"]);
        assert!(conditions.is_blinded());
        assert!(!conditions.is_deafened());
        assert!(conditions.has(&Condition::Other("prone".to_string())));
    }

    #[test]
    fn test_size_steps() {
        assert_eq!(SizeCategory::Large.steps_larger_than(SizeCategory::Medium), 1);
        assert_eq!(SizeCategory::Small.steps_larger_than(SizeCategory::Huge), -3);
    }

    #[test]
    fn test_allegiance() {
        assert!(Disposition::Friendly.is_allied_with(Disposition::Friendly));
        assert!(!Disposition::Friendly.is_allied_with(Disposition::Hostile));
        assert!(!Disposition::Neutral.is_allied_with(Disposition::Neutral));
    }
}
