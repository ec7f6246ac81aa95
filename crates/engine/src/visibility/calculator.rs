//! The auto-visibility calculator.
//!
//! Pure function from one observer/target pair's analyzed inputs to a
//! visibility state with the detecting sense recorded. Total: geometry or
//! capability failures are resolved by the analyzer into conservative
//! inputs before this module runs, so every call returns a result.
//!
//! Sense precedence: precise non-visual, then visual precise, then
//! imprecise non-visual, then hearing. The best detection quality across
//! all candidates wins; ties keep the earlier precedence class.

use visioner_domain::{
    round_down_to_increment, CoverState, CreatureCategory, DarknessRay, LightLevel,
    LightingSample, Precision, SenseDescriptor, SenseKind, VisibilityState, VisionCapabilities,
};

/// Analyzed inputs for one observer/target pair.
#[derive(Debug, Clone)]
pub struct PairInput {
    pub distance_feet: f64,
    pub observer: VisionCapabilities,
    pub target_invisible: bool,
    pub target_category: CreatureCategory,
    pub target_flying: bool,
    pub cover: CoverState,
    /// Light at the target's position
    pub lighting: LightingSample,
    /// Darkness sources intervening on the sight line
    pub darkness_ray: DarknessRay,
    pub has_line_of_sight: bool,
    /// Analyzer fallback notes, carried into the result
    pub diagnostics: Vec<String>,
}

/// Calculator output.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityOutcome {
    pub state: VisibilityState,
    pub detection_sense: Option<SenseKind>,
    pub notes: Vec<String>,
}

/// Magical darkness of this spell rank or higher defeats ordinary darkvision.
const DARKVISION_DEFEATING_RANK: u8 = 4;

/// Derive the visibility state for a pair.
pub fn visibility(input: &PairInput) -> VisibilityOutcome {
    let rounded_distance = round_down_to_increment(input.distance_feet);
    let mut notes = input.diagnostics.clone();

    let mut best: Option<(VisibilityState, SenseKind)> = None;

    for sense in candidate_senses(&input.observer, rounded_distance) {
        let Some(quality) = sense_quality(&sense, input) else {
            continue;
        };
        let better = match &best {
            Some((current, _)) => {
                quality.quality().unwrap_or(0) > current.quality().unwrap_or(0)
            }
            None => true,
        };
        if better {
            best = Some((quality, sense.kind));
        }
    }

    match best {
        Some((state, kind)) => VisibilityOutcome {
            state,
            detection_sense: Some(kind),
            notes,
        },
        None => {
            notes.push("no sense can detect the target".to_string());
            VisibilityOutcome {
                state: VisibilityState::Undetected,
                detection_sense: None,
                notes,
            }
        }
    }
}

/// Candidate senses in evaluation precedence, range-filtered.
///
/// Within a precedence class, candidates are sorted by kind so the recorded
/// detecting sense is stable across runs.
fn candidate_senses(observer: &VisionCapabilities, rounded_distance: u32) -> Vec<SenseDescriptor> {
    let mut candidates = Vec::new();

    // 1. Precise non-visual
    let mut class: Vec<SenseDescriptor> = observer
        .precise
        .iter()
        .filter(|(kind, range)| !kind.is_visual() && range.contains(rounded_distance))
        .map(|(kind, range)| SenseDescriptor::new(kind.clone(), Precision::Precise, *range))
        .collect();
    class.sort_by(|a, b| a.kind.as_str().cmp(b.kind.as_str()));
    candidates.append(&mut class);

    // 2. Visual precise
    let mut class: Vec<SenseDescriptor> = observer
        .precise
        .iter()
        .filter(|(kind, range)| kind.is_visual() && range.contains(rounded_distance))
        .map(|(kind, range)| SenseDescriptor::new(kind.clone(), Precision::Precise, *range))
        .collect();
    class.sort_by(|a, b| a.kind.as_str().cmp(b.kind.as_str()));
    candidates.append(&mut class);

    // 3. Imprecise non-visual (hearing last)
    let mut class: Vec<SenseDescriptor> = observer
        .imprecise
        .iter()
        .filter(|(kind, range)| **kind != SenseKind::Hearing && range.contains(rounded_distance))
        .map(|(kind, range)| SenseDescriptor::new(kind.clone(), Precision::Imprecise, *range))
        .collect();
    class.sort_by(|a, b| a.kind.as_str().cmp(b.kind.as_str()));
    candidates.append(&mut class);

    // 4. Hearing (unlimited range; absent from the map when deafened)
    if let Some(range) = observer.imprecise.get(&SenseKind::Hearing) {
        if range.contains(rounded_distance) {
            candidates.push(SenseDescriptor::new(
                SenseKind::Hearing,
                Precision::Imprecise,
                *range,
            ));
        }
    }

    candidates
}

/// Best state one sense can yield against this target, or None when the
/// sense cannot contribute at all.
fn sense_quality(sense: &SenseDescriptor, input: &PairInput) -> Option<VisibilityState> {
    if !sense_can_detect_target(&sense.kind, input) {
        return None;
    }

    if sense.kind.is_visual() {
        return visual_quality(&sense.kind, input);
    }

    match sense.precision {
        // Non-visual precise senses (echolocation) ignore light, cover,
        // and invisibility
        Precision::Precise => Some(VisibilityState::Observed),
        // Imprecise senses locate without perceiving
        Precision::Imprecise => Some(VisibilityState::Hidden),
    }
}

/// Target-type gates: senses that cannot detect this kind of target.
fn sense_can_detect_target(kind: &SenseKind, input: &PairInput) -> bool {
    match kind {
        SenseKind::Lifesense => input.target_category.lifesense_detectable(),
        SenseKind::Scent => input.target_category.scent_detectable(),
        SenseKind::Tremorsense => !input.target_flying,
        _ => true,
    }
}

fn visual_quality(kind: &SenseKind, input: &PairInput) -> Option<VisibilityState> {
    if input.observer.is_blinded || !input.has_line_of_sight {
        return None;
    }
    if !darkness_permits(kind, input) {
        return None;
    }

    let mut state = VisibilityState::Observed;

    // Invisibility floor: a precise visual sense that would observe an
    // invisible target perceives at best its location.
    if input.target_invisible {
        return Some(VisibilityState::Hidden);
    }

    // Dim light combined with standard or greater cover degrades precision.
    if input.lighting.level == LightLevel::Dim && input.cover.is_standard_or_better() {
        state = VisibilityState::Concealed;
    }

    Some(state)
}

/// Whether darkness at the target or on the ray leaves this visual sense
/// usable.
fn darkness_permits(kind: &SenseKind, input: &PairInput) -> bool {
    let target_dark = input.lighting.level == LightLevel::Darkness;
    let ray = input.darkness_ray;

    match kind {
        SenseKind::GreaterDarkvision => true,
        SenseKind::Darkvision => {
            // Ordinary darkvision pierces darkness below the defeating rank
            let target_blocks =
                target_dark && input.lighting.darkness_rank >= DARKVISION_DEFEATING_RANK;
            let ray_blocks = ray.crosses_darkness && ray.rank >= DARKVISION_DEFEATING_RANK;
            !(target_blocks || ray_blocks)
        }
        _ => !target_dark && !ray.crosses_darkness,
    }
}
