//! Vision capability extraction from actor snapshots.
//!
//! Turns a stat-block sense list plus active conditions into the
//! condition-adjusted `VisionCapabilities` the calculator consumes.
//! Blinded drops visual senses; deafened drops hearing-family senses
//! (echolocation included). Creatures get implicit vision and hearing
//! unless the stat block overrides them.

use visioner_domain::{Precision, SenseKind, SenseRange, VisionCapabilities};

use crate::infrastructure::ports::ActorSnapshot;

/// Derive the observer-side capability vector for one actor.
pub fn extract_capabilities(actor: &ActorSnapshot) -> VisionCapabilities {
    let is_blinded = actor.conditions.is_blinded();
    let is_deafened = actor.conditions.is_deafened();

    let mut caps = VisionCapabilities {
        is_blinded,
        is_deafened,
        ..VisionCapabilities::empty()
    };

    let mut senses = actor.senses.clone();

    // Implicit defaults: every creature hears, and sees unless the stat
    // block says otherwise.
    if !senses.iter().any(|sense| sense.kind.is_visual()) {
        senses.push(visioner_domain::SenseDescriptor::new(
            SenseKind::Vision,
            Precision::Precise,
            SenseRange::Unlimited,
        ));
    }
    if !senses
        .iter()
        .any(|sense| sense.kind == SenseKind::Hearing)
    {
        senses.push(visioner_domain::SenseDescriptor::new(
            SenseKind::Hearing,
            Precision::Imprecise,
            SenseRange::Unlimited,
        ));
    }

    for sense in senses {
        if sense.kind.is_visual() {
            caps.has_vision = true;
            if sense.kind.is_darkvision() {
                caps.darkvision_range = Some(best_range(caps.darkvision_range, sense.range));
            }
            if sense.kind == SenseKind::GreaterDarkvision {
                caps.has_greater_darkvision = true;
            }
        }

        // Condition suppression
        if is_blinded && sense.kind.is_visual() {
            continue;
        }
        if is_deafened && sense.kind.is_hearing_family() {
            continue;
        }

        match sense.precision {
            Precision::Precise => {
                let entry = caps
                    .precise
                    .entry(sense.kind.clone())
                    .or_insert(sense.range);
                *entry = best_range(Some(*entry), sense.range);
            }
            Precision::Imprecise => {
                let entry = caps
                    .imprecise
                    .entry(sense.kind.clone())
                    .or_insert(sense.range);
                *entry = best_range(Some(*entry), sense.range);
            }
        }
    }

    caps
}

fn best_range(current: Option<SenseRange>, candidate: SenseRange) -> SenseRange {
    match (current, candidate) {
        (None, range) => range,
        (Some(SenseRange::Unlimited), _) | (_, SenseRange::Unlimited) => SenseRange::Unlimited,
        (Some(SenseRange::Feet(a)), SenseRange::Feet(b)) => SenseRange::Feet(a.max(b)),
    }
}
