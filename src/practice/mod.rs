//! Recording practice attempts and reading them back.
//!
//! Scoring is pure and lives in [`crate::analyzer`]; this module owns the
//! rules for turning a scored attempt into a stored record: who is allowed to
//! save, which fields must be present, and what gets defaulted.

pub mod history;

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::analyzer::legato_metrics::{DEFAULT_BPM, clamp01};
use crate::analyzer::report::{ScoreReport, round3};
use crate::db::models::{AttemptScores, ChunkRange, Level, NewAttempt, PracticeAttempt};
use crate::db::{Database, DbError};

#[derive(Error, Debug)]
pub enum PracticeError {
    #[error("Not authenticated: a user id is required")]
    NotAuthenticated,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, PracticeError>;

/// Scores as submitted by a client. Every field is required when saving.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFields {
    pub accuracy: Option<f64>,
    pub timing_score: Option<f64>,
    pub clarity_score: Option<f64>,
    pub speed_score: Option<f64>,
    pub consistency: Option<f64>,
}

impl From<ScoreReport> for ScoreFields {
    fn from(r: ScoreReport) -> Self {
        Self {
            accuracy: Some(r.accuracy),
            timing_score: Some(r.timing_score),
            clarity_score: Some(r.clarity_score),
            speed_score: Some(r.speed_score),
            consistency: Some(r.consistency),
        }
    }
}

/// Attempt metadata plus scores, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttemptFields {
    pub lesson_id: Option<String>,
    pub lesson_title: Option<String>,
    pub level: Option<String>,
    pub bpm: Option<f64>,
    pub target_bpm: Option<f64>,
    pub practice_duration: Option<f64>,
    pub notes_detected: Option<i64>,
    pub notes_expected: Option<i64>,
    pub chunk_used: Option<ChunkRange>,
    pub scores: Option<ScoreFields>,
}

impl AttemptFields {
    /// Fill scores and note counts from a fresh analysis. Counts the client
    /// already supplied are kept.
    pub fn with_report(mut self, report: &ScoreReport) -> Self {
        self.scores = Some((*report).into());
        self.notes_detected = self.notes_detected.or(Some(report.total_detected as i64));
        self.notes_expected = self.notes_expected.or(Some(report.total_expected as i64));
        self
    }
}

/// Resolve the acting user. A missing or blank id is not authenticated.
pub fn authenticate(user_id: Option<&str>) -> Result<&str> {
    match user_id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(PracticeError::NotAuthenticated),
    }
}

/// Validate and store a practice attempt for `user_id`.
pub fn record_attempt(
    db: &Database,
    user_id: &str,
    fields: AttemptFields,
) -> Result<PracticeAttempt> {
    let user_id = authenticate(Some(user_id))?;
    let attempt = validate(user_id, fields)?;
    let id = db.insert_attempt(&attempt)?;

    log::info!(
        "Recorded attempt {} for {} on {} (accuracy {:.3})",
        id,
        attempt.user_id,
        attempt.lesson_id,
        attempt.scores.accuracy
    );

    Ok(PracticeAttempt {
        id,
        user_id: attempt.user_id,
        lesson_id: attempt.lesson_id,
        lesson_title: attempt.lesson_title,
        level: attempt.level,
        bpm: attempt.bpm,
        target_bpm: attempt.target_bpm,
        practice_duration: attempt.practice_duration,
        notes_detected: attempt.notes_detected,
        notes_expected: attempt.notes_expected,
        chunk_used: attempt.chunk_used,
        scores: attempt.scores,
        created_at: attempt.created_at,
    })
}

fn validate(user_id: &str, f: AttemptFields) -> Result<NewAttempt> {
    let lesson_id = f
        .lesson_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("lessonId is required"))?;
    let lesson_title = f
        .lesson_title
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| lesson_id.clone());

    let level = match f.level {
        Some(s) => s.parse::<Level>().map_err(PracticeError::Validation)?,
        None => Level::Beginner,
    };

    let bpm = positive("bpm", f.bpm)?.unwrap_or(DEFAULT_BPM);
    let target_bpm = positive("targetBpm", f.target_bpm)?.unwrap_or(bpm);

    let practice_duration = f.practice_duration.unwrap_or(0.0);
    if !practice_duration.is_finite() || practice_duration < 0.0 {
        return Err(invalid("practiceDuration must be a non-negative number"));
    }

    let notes_detected = count("notesDetected", f.notes_detected)?;
    let notes_expected = count("notesExpected", f.notes_expected)?;

    if let Some(c) = f.chunk_used {
        if !c.start.is_finite() || !c.end.is_finite() || c.start > c.end {
            return Err(invalid("chunkUsed must have start <= end"));
        }
    }

    let s = f.scores.ok_or_else(|| invalid("scores are required"))?;
    let scores = AttemptScores {
        accuracy: score("accuracy", s.accuracy)?,
        timing_score: score("timingScore", s.timing_score)?,
        clarity_score: score("clarityScore", s.clarity_score)?,
        speed_score: score("speedScore", s.speed_score)?,
        consistency: score("consistency", s.consistency)?,
    };

    Ok(NewAttempt {
        user_id: user_id.to_string(),
        lesson_id,
        lesson_title,
        level,
        bpm,
        target_bpm,
        practice_duration,
        notes_detected,
        notes_expected,
        chunk_used: f.chunk_used,
        scores,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn invalid(msg: &str) -> PracticeError {
    PracticeError::Validation(msg.to_string())
}

fn positive(name: &str, v: Option<f64>) -> Result<Option<f64>> {
    match v {
        Some(b) if !(b.is_finite() && b > 0.0) => {
            Err(PracticeError::Validation(format!("{name} must be a positive number")))
        }
        other => Ok(other),
    }
}

fn count(name: &str, v: Option<i64>) -> Result<i64> {
    match v {
        Some(n) if n < 0 => Err(PracticeError::Validation(format!(
            "{name} must not be negative"
        ))),
        Some(n) => Ok(n),
        None => Ok(0),
    }
}

/// Required score, stored clamped and at report precision.
fn score(name: &str, v: Option<f64>) -> Result<f64> {
    match v {
        Some(x) if x.is_finite() => Ok(round3(clamp01(x))),
        Some(_) => Err(PracticeError::Validation(format!("scores.{name} must be a number"))),
        None => Err(PracticeError::Validation(format!("scores.{name} is required"))),
    }
}
