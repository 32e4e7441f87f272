pub mod legato_metrics;
pub mod notes;
pub mod report;

use legato_metrics::TimingAlignment;
use notes::{DETECTED_DEFAULTS, EXPECTED_DEFAULTS, NoteEvent, normalize_notes};
use report::{ScoreReport, SubScores};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;

/// An analysis request as a client submits it.
///
/// The note arrays are kept as raw JSON so that malformed entries can be
/// repaired by normalization instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub detected_notes: Value,
    #[serde(default)]
    pub expected_notes: Value,
    #[serde(default)]
    pub bpm: Value,
}

impl AnalyzeRequest {
    /// BPM if the request carries a number; anything else means "use the default".
    pub fn bpm(&self) -> Option<f64> {
        self.bpm.as_f64()
    }
}

/// Full analysis output: the report plus the per-note timing detail behind it.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: ScoreReport,
    pub bpm: f64,
    pub timing: Option<TimingAlignment>,
}

/// Score a detected note sequence against the expected one.
///
/// Both inputs must be JSON arrays; their entries may be arbitrarily
/// malformed. Scoring itself never fails.
pub fn analyze(detected: &Value, expected: &Value, bpm: Option<f64>) -> Result<ScoreReport> {
    analyze_detailed(detected, expected, bpm).map(|a| a.report)
}

/// Like [`analyze`], but keeps the timing alignment for per-note feedback.
pub fn analyze_detailed(detected: &Value, expected: &Value, bpm: Option<f64>) -> Result<Analysis> {
    if !detected.is_array() {
        return Err(AnalyzeError::InvalidInput(
            "detectedNotes must be an array".to_string(),
        ));
    }
    if !expected.is_array() {
        return Err(AnalyzeError::InvalidInput(
            "expectedNotes must be an array".to_string(),
        ));
    }

    let expected = normalize_notes(expected, EXPECTED_DEFAULTS);
    let detected = normalize_notes(detected, DETECTED_DEFAULTS);
    Ok(score_notes(&detected, &expected, bpm))
}

/// Score already-normalized sequences.
pub fn score_notes(detected: &[NoteEvent], expected: &[NoteEvent], bpm: Option<f64>) -> Analysis {
    let bpm = legato_metrics::resolve_bpm(bpm);

    if detected.is_empty() || expected.is_empty() {
        log::debug!(
            "Empty sequence (detected={}, expected={}), skipping scoring",
            detected.len(),
            expected.len()
        );
        return Analysis {
            report: ScoreReport::empty(detected.len(), expected.len()),
            bpm,
            timing: None,
        };
    }

    let beat = legato_metrics::beat_duration(bpm);
    let timing = legato_metrics::align_timing(detected, expected, beat);
    let sub = SubScores {
        timing: timing.score,
        clarity: legato_metrics::clarity_score(detected),
        speed: legato_metrics::speed_score(detected, expected, beat),
        consistency: legato_metrics::consistency_score(detected),
    };
    let report = report::aggregate(sub, detected.len(), expected.len());

    log::debug!(
        "Scored {} detected vs {} expected at {} bpm: accuracy {:.3}",
        detected.len(),
        expected.len(),
        bpm,
        report.accuracy
    );

    Analysis {
        report,
        bpm,
        timing: Some(timing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_valid_score(v: f64) -> bool {
        (0.0..=1.0).contains(&v) && ((v * 1000.0).round() - v * 1000.0).abs() < 1e-6
    }

    fn all_scores(r: &ScoreReport) -> [f64; 5] {
        [r.accuracy, r.timing_score, r.clarity_score, r.speed_score, r.consistency]
    }

    #[test]
    fn test_reference_example() {
        let detected = json!([{"time": 0, "loudness": 0.3}, {"time": 0.5, "loudness": 0.35}]);
        let expected = json!([{"time": 0, "loudness": 0.2}, {"time": 1, "loudness": 0.2}]);
        let r = analyze(&detected, &expected, Some(120.0)).unwrap();

        assert_eq!(r.timing_score, 1.0);
        assert_eq!(r.clarity_score, 0.929);
        assert_eq!(r.speed_score, 1.0);
        assert_eq!(r.consistency, 1.0);
        assert_eq!(r.accuracy, 0.979);
        assert_eq!(r.total_detected, 2);
        assert_eq!(r.total_expected, 2);
    }

    #[test]
    fn test_empty_detected_zeroes_everything() {
        let expected = json!([{"time": 0}, {"time": 1}, {"time": 2}]);
        let r = analyze(&json!([]), &expected, Some(100.0)).unwrap();
        assert_eq!(r, ScoreReport::empty(0, 3));
    }

    #[test]
    fn test_empty_expected_zeroes_everything() {
        let detected = json!([{"time": 0, "rms": 0.3}]);
        let r = analyze(&detected, &json!([]), None).unwrap();
        assert_eq!(all_scores(&r), [0.0; 5]);
        assert_eq!(r.total_detected, 1);
        assert_eq!(r.total_expected, 0);
    }

    #[test]
    fn test_non_array_is_invalid_input() {
        let notes = json!([{"time": 0}]);
        assert!(matches!(
            analyze(&json!({"time": 0}), &notes, None),
            Err(AnalyzeError::InvalidInput(_))
        ));
        assert!(matches!(
            analyze(&notes, &Value::Null, None),
            Err(AnalyzeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_single_detected_note_is_finite() {
        let detected = json!([{"time": 1, "rms": 0.4}]);
        let expected = json!([{"time": 0}, {"time": 1}]);
        let r = analyze(&detected, &expected, Some(120.0)).unwrap();
        assert!(all_scores(&r).iter().all(|&v| is_valid_score(v)));
        assert_eq!(r.speed_score, 1.0);
        assert_eq!(r.clarity_score, 1.0);
    }

    #[test]
    fn test_bad_bpm_uses_default() {
        let detected = json!([{"time": 0}, {"time": 0.75}]);
        let expected = json!([{"time": 0}, {"time": 1}]);
        let with_default = analyze(&detected, &expected, Some(80.0)).unwrap();
        for bpm in [None, Some(0.0), Some(-5.0), Some(f64::NAN)] {
            assert_eq!(analyze(&detected, &expected, bpm).unwrap(), with_default);
        }
        assert_eq!(with_default.timing_score, 1.0);
    }

    #[test]
    fn test_adversarial_inputs_stay_in_range() {
        let cases = [
            (json!([{"time": 1e300, "rms": 1e300}, {"time": -1e300}]), json!([{"time": 1e-300}])),
            (json!([{"time": 0}, {"time": 0}, {"time": 0}]), json!([{"time": 0}, {"time": 0}])),
            (json!([{"time": -3, "rms": -2}, {"time": 5}]), json!([{"time": 9e15}, {"time": -1}])),
            (json!([null, "x", 4, []]), json!([{}, {}])),
        ];
        for bpm in [Some(1e-9), Some(1e12), Some(120.0), None] {
            for (detected, expected) in &cases {
                let r = analyze(detected, expected, bpm).unwrap();
                for v in all_scores(&r) {
                    assert!(
                        is_valid_score(v),
                        "score {v} out of range for {detected} / {expected}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_identical_inputs_identical_output() {
        let detected = json!([
            {"time": 0.01, "rms": 0.21},
            {"time": 0.52},
            {"time": 1.1, "rms": 0.3}
        ]);
        let expected = json!([{"time": 0}, {"time": 1}, {"time": 2}]);
        let a = analyze(&detected, &expected, Some(110.0)).unwrap();
        let b = analyze(&detected, &expected, Some(110.0)).unwrap();
        assert_eq!(a, b);
        for (x, y) in all_scores(&a).iter().zip(all_scores(&b)) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_detailed_keeps_timing_errors() {
        let detected = json!([{"time": 0.0}, {"time": 0.55}]);
        let expected = json!([{"time": 0}, {"time": 1}, {"time": 2}]);
        let a = analyze_detailed(&detected, &expected, Some(120.0)).unwrap();
        let timing = a.timing.unwrap();
        assert_eq!(timing.errors.len(), 2);
        assert_eq!(timing.matches, 2);
        assert_eq!(a.report.timing_score, 0.667);
        assert_eq!(a.bpm, 120.0);
    }

    #[test]
    fn test_request_deserializes() {
        let req: AnalyzeRequest = serde_json::from_value(json!({
            "detectedNotes": [{"time": 0}],
            "expectedNotes": [{"time": 0}],
            "bpm": 90,
        }))
        .unwrap();
        assert_eq!(req.bpm(), Some(90.0));
        assert!(req.detected_notes.is_array());

        let req: AnalyzeRequest = serde_json::from_value(json!({"bpm": "fast"})).unwrap();
        assert_eq!(req.bpm(), None);
        assert!(req.detected_notes.is_null());
    }
}
