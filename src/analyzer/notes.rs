use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single note onset after normalization.
///
/// `time` is in beats for expected notes and in seconds for detected notes;
/// the timing aligner is what reconciles the two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub time: f64,
    pub loudness: f64,
}

/// Fallbacks used when an entry is missing a usable field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteDefaults {
    /// Spacing used to synthesize `time` as `index * step`.
    pub step: f64,
    /// Loudness used when `rms` is absent or not a number.
    pub loudness: f64,
}

/// Reference notes: slightly wider synthetic spacing, louder baseline.
pub const EXPECTED_DEFAULTS: NoteDefaults = NoteDefaults {
    step: 0.5,
    loudness: 0.2,
};

/// Live detected notes: tighter synthetic spacing, quieter baseline.
pub const DETECTED_DEFAULTS: NoteDefaults = NoteDefaults {
    step: 0.4,
    loudness: 0.1,
};

/// Normalize an arbitrary JSON value into an ordered note sequence.
///
/// Anything that isn't an array yields an empty sequence. Non-object entries
/// are treated as `{}` and get both fields from `defaults`. Loudness is read
/// from `rms` (the detector's field name), falling back to `loudness`.
pub fn normalize_notes(raw: &Value, defaults: NoteDefaults) -> Vec<NoteEvent> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let time = finite_field(item, "time").unwrap_or(i as f64 * defaults.step);
            let loudness = finite_field(item, "rms")
                .or_else(|| finite_field(item, "loudness"))
                .unwrap_or(defaults.loudness);
            NoteEvent { time, loudness }
        })
        .filter(|n| n.time.is_finite())
        .collect()
}

/// Read `key` from a JSON object as a finite f64. Strings and other types don't count.
fn finite_field(item: &Value, key: &str) -> Option<f64> {
    item.as_object()?
        .get(key)?
        .as_f64()
        .filter(|v| v.is_finite())
}
