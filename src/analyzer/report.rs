use serde::{Deserialize, Serialize};

use super::legato_metrics::clamp01;

/// Weight of each sub-score in the overall accuracy. Consistency is reported
/// alongside but carries no weight.
const TIMING_WEIGHT: f64 = 0.4;
const CLARITY_WEIGHT: f64 = 0.3;
const SPEED_WEIGHT: f64 = 0.3;

/// Scores for one practice attempt. All score fields are in [0, 1] with at
/// most three decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub accuracy: f64,
    pub timing_score: f64,
    pub clarity_score: f64,
    pub speed_score: f64,
    pub consistency: f64,
    pub total_detected: usize,
    pub total_expected: usize,
}

impl ScoreReport {
    /// All-zero report, used when either sequence is empty.
    pub fn empty(total_detected: usize, total_expected: usize) -> Self {
        Self {
            accuracy: 0.0,
            timing_score: 0.0,
            clarity_score: 0.0,
            speed_score: 0.0,
            consistency: 0.0,
            total_detected,
            total_expected,
        }
    }
}

/// Raw sub-scores before blending and rounding.
#[derive(Debug, Clone, Copy)]
pub struct SubScores {
    pub timing: f64,
    pub clarity: f64,
    pub speed: f64,
    pub consistency: f64,
}

/// Round to three decimal places.
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Clamp then round, so the result is always a valid report value.
fn finish(v: f64) -> f64 {
    round3(clamp01(v))
}

/// Blend sub-scores into a report.
pub fn aggregate(sub: SubScores, total_detected: usize, total_expected: usize) -> ScoreReport {
    let timing = clamp01(sub.timing);
    let clarity = clamp01(sub.clarity);
    let speed = clamp01(sub.speed);
    let accuracy = TIMING_WEIGHT * timing + CLARITY_WEIGHT * clarity + SPEED_WEIGHT * speed;

    ScoreReport {
        accuracy: finish(accuracy),
        timing_score: finish(timing),
        clarity_score: finish(clarity),
        speed_score: finish(speed),
        consistency: finish(sub.consistency),
        total_detected,
        total_expected,
    }
}
