use super::notes::NoteEvent;

/// Tempo assumed when the caller's BPM is missing, zero, negative or non-finite.
pub const DEFAULT_BPM: f64 = 80.0;

/// A detected note within this fraction of a beat counts as on time.
pub const MATCH_TOLERANCE_BEATS: f64 = 0.2;

/// Average loudness treated as a fully clear tone.
const CLARITY_CEILING: f64 = 0.35;

/// Constrain to [0, 1]. NaN collapses to 0 so it can never leak into a report.
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Resolve the effective tempo for a request.
pub fn resolve_bpm(bpm: Option<f64>) -> f64 {
    match bpm {
        Some(b) if b.is_finite() && b > 0.0 => b,
        _ => DEFAULT_BPM,
    }
}

/// Seconds per beat.
pub fn beat_duration(bpm: f64) -> f64 {
    60.0 / bpm
}

/// Treat zero and NaN as "no value", the way a falsy duration is handled.
fn or_fallback(v: f64, fallback: f64) -> f64 {
    if v == 0.0 || v.is_nan() { fallback } else { v }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    Some(values.sum::<f64>() / n as f64)
}

// ── Timing (0-1) ──────────────────────────────────────────────────────
// Expected note k (in beats) is paired with detected note k (in seconds).
// Pairing is by index only: an extra or missing detected note shifts every
// later pair. Historical scores depend on this, so it stays positional.

/// Result of pairing detected notes against the reference.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingAlignment {
    /// Pairs whose error is within tolerance.
    pub matches: usize,
    /// Absolute error in seconds for every pair that exists, in expected order.
    pub errors: Vec<f64>,
    /// `matches / expected.len()`, or 0 with no expected notes.
    pub score: f64,
}

pub fn align_timing(
    detected: &[NoteEvent],
    expected: &[NoteEvent],
    beat: f64,
) -> TimingAlignment {
    let tolerance = MATCH_TOLERANCE_BEATS * beat;
    let mut matches = 0;
    let mut errors = Vec::with_capacity(expected.len().min(detected.len()));

    for (exp, det) in expected.iter().zip(detected) {
        let error = (det.time - exp.time * beat).abs();
        if error <= tolerance {
            matches += 1;
        }
        errors.push(error);
    }

    let score = if expected.is_empty() {
        0.0
    } else {
        matches as f64 / expected.len() as f64
    };

    TimingAlignment {
        matches,
        errors,
        score,
    }
}

// ── Clarity (0-1) ─────────────────────────────────────────────────────
// Mean detected loudness against a calibration ceiling; louder saturates.
pub fn clarity_score(detected: &[NoteEvent]) -> f64 {
    let avg = mean(detected.iter().map(|n| n.loudness)).unwrap_or(0.0);
    clamp01(avg / CLARITY_CEILING)
}

// ── Speed (0-1) ───────────────────────────────────────────────────────
// Ratio of expected to detected elapsed time. Rushing saturates at 1,
// dragging scores proportionally lower. A single detected note has zero
// span and falls back to one beat.
pub fn speed_score(detected: &[NoteEvent], expected: &[NoteEvent], beat: f64) -> f64 {
    let expected_duration = or_fallback(
        expected.last().map_or(0.0, |n| n.time * beat),
        beat,
    );
    let detected_duration = or_fallback(
        match (detected.first(), detected.last()) {
            (Some(first), Some(last)) => last.time - first.time,
            _ => 0.0,
        },
        beat,
    );
    clamp01(expected_duration / detected_duration)
}

// ── Consistency (0-1) ─────────────────────────────────────────────────
// Variance of inter-onset intervals relative to the squared mean interval.
// A zero or undefined mean interval is replaced by 1 before squaring.
pub fn consistency_score(detected: &[NoteEvent]) -> f64 {
    let intervals: Vec<f64> = detected.windows(2).map(|w| w[1].time - w[0].time).collect();

    let avg = mean(intervals.iter().copied()).unwrap_or(1.0);
    let variance = mean(intervals.iter().map(|i| (i - avg).powi(2))).unwrap_or(0.0);
    let denom = or_fallback(avg, 1.0).powi(2);

    clamp01(1.0 - variance / denom)
}
