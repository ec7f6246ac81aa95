//! Pure subject filters for action resolution.
//!
//! Resolvers gather candidate tokens, then narrow them through whichever of
//! these filters the request enables. Filters never consult mutable state:
//! everything they need rides in on the snapshots.

use visioner_domain::{round_down_to_increment, Position, TokenId};

use crate::infrastructure::ports::{ActorSnapshot, ScenePort, TokenSnapshot};

/// Rectangular viewport bounds in scene feet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Viewport {
    pub fn contains(&self, position: &Position) -> bool {
        position.x >= self.min_x
            && position.x <= self.max_x
            && position.y >= self.min_y
            && position.y <= self.max_y
    }
}

/// Aimed template for Seek: a circle in scene feet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateShape {
    pub center: Position,
    pub radius_feet: f64,
}

impl TemplateShape {
    pub fn contains(&self, position: &Position) -> bool {
        self.center.distance_to(position) <= self.radius_feet
    }
}

/// Which filters a resolution applies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubjectFilters {
    pub encounter_only: bool,
    pub ignore_allies: bool,
    pub exclude_defeated: bool,
    /// Distance cap in feet, post 5-ft rounding
    pub range_cap_feet: Option<u32>,
    pub viewport: Option<Viewport>,
    pub template: Option<TemplateShape>,
}

/// Narrow candidate subjects relative to an acting token.
pub fn filter_subjects(
    scene: &dyn ScenePort,
    actor_token: &TokenSnapshot,
    subjects: Vec<TokenSnapshot>,
    filters: &SubjectFilters,
) -> Vec<TokenSnapshot> {
    subjects
        .into_iter()
        .filter(|subject| subject.id != actor_token.id)
        .filter(|subject| !filters.encounter_only || scene.is_combatant(subject.id))
        .filter(|subject| {
            !filters.ignore_allies
                || !subject.disposition.is_allied_with(actor_token.disposition)
        })
        .filter(|subject| {
            !filters.exclude_defeated || !is_defeated(scene.actor(subject.actor_id))
        })
        .filter(|subject| match filters.range_cap_feet {
            Some(cap) => {
                let distance = actor_token.position.distance_to(&subject.position);
                round_down_to_increment(distance) <= cap
            }
            None => true,
        })
        .filter(|subject| match &filters.viewport {
            Some(viewport) => viewport.contains(&subject.position),
            None => true,
        })
        .filter(|subject| match &filters.template {
            Some(template) => template.contains(&subject.position),
            None => true,
        })
        .collect()
}

fn is_defeated(actor: Option<ActorSnapshot>) -> bool {
    actor.is_some_and(|actor| actor.is_dead || actor.conditions.has(&visioner_domain::Condition::Dead))
}

/// Candidate subjects: everything in the scene except scene-hidden tokens
/// (when configured away) and the actor itself.
pub fn candidate_subjects(
    scene: &dyn ScenePort,
    actor_id: TokenId,
    include_scene_hidden: bool,
) -> Vec<TokenSnapshot> {
    scene
        .tokens_in_scene()
        .into_iter()
        .filter(|token| token.id != actor_id)
        .filter(|token| include_scene_hidden || !token.hidden)
        .collect()
}
