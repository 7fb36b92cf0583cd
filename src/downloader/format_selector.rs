// Format normalizer - reduces raw engine streams to one offering per
// resolution tier.
//
// Tie-break within a tier, first criterion wins:
// 1. A stream with embedded audio beats one without.
// 2. Among equals, container mp4 beats any other container.
// 3. Otherwise the first stream in input order stays.

use std::collections::HashMap;

use super::models::{FormatOffering, StreamDescriptor};
use super::utils::format_filesize;

/// Canonical resolution tiers, in the order offerings are emitted.
/// Heights outside this set are dropped, never snapped to a tier.
pub const RESOLUTION_TIERS: [u32; 8] = [2160, 1440, 1080, 720, 480, 360, 240, 144];

/// Reduce raw stream descriptors to a deduplicated, ranked offering list.
///
/// Pure function: deterministic for a given input order, no I/O.
pub fn normalize_formats(descriptors: &[StreamDescriptor]) -> Vec<FormatOffering> {
    let mut best_per_height: HashMap<u32, &StreamDescriptor> = HashMap::new();

    for descriptor in descriptors {
        if !descriptor.has_video() || descriptor.is_audio_only() {
            continue;
        }
        let Some(height) = descriptor.height.filter(|h| *h > 0) else {
            continue;
        };

        match best_per_height.get(&height) {
            Some(current) if !beats(descriptor, current) => {}
            _ => {
                best_per_height.insert(height, descriptor);
            }
        }
    }

    let mut offerings = Vec::new();
    for &tier in RESOLUTION_TIERS.iter() {
        if let Some(descriptor) = best_per_height.get(&tier) {
            let needs_audio_merge = !descriptor.has_audio();
            let size = descriptor.effective_size();
            offerings.push(FormatOffering {
                index: offerings.len(),
                label: offering_label(tier, &descriptor.ext, size, needs_audio_merge),
                format_id: descriptor.format_id.clone(),
                height: tier,
                container: descriptor.ext.clone(),
                size,
                needs_audio_merge,
            });
        }
    }

    offerings
}

/// Whether `candidate` strictly beats the currently kept stream at the
/// same height. A full tie keeps the incumbent (input-order stability).
fn beats(candidate: &StreamDescriptor, current: &StreamDescriptor) -> bool {
    match (candidate.has_audio(), current.has_audio()) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.ext == "mp4" && current.ext != "mp4",
    }
}

fn offering_label(height: u32, container: &str, size: Option<u64>, needs_audio_merge: bool) -> String {
    let audio_note = if needs_audio_merge { " + audio" } else { "" };
    format!(
        "{}p ({}) {}{}",
        height,
        container,
        format_filesize(size),
        audio_note
    )
}
