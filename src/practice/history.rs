use serde::Serialize;

use super::{Result, authenticate};
use crate::analyzer::report::round3;
use crate::db::Database;
use crate::db::models::PracticeAttempt;

/// Window size when the caller doesn't ask for one.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Largest window a single history read may return.
pub const MAX_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub sessions: usize,
    pub average_accuracy: f64,
}

/// Recent attempts (newest first) and statistics over exactly that window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub attempts: Vec<PracticeAttempt>,
    pub stats: HistoryStats,
}

/// Clamp a requested window size to 1..=50.
pub fn clamp_limit(limit: Option<i64>) -> usize {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT) as usize
}

/// Summarize an already-retrieved window of attempts.
pub fn summarize(attempts: Vec<PracticeAttempt>) -> HistorySummary {
    let sessions = attempts.len();
    let average_accuracy = if sessions > 0 {
        round3(attempts.iter().map(|a| a.scores.accuracy).sum::<f64>() / sessions as f64)
    } else {
        0.0
    };

    HistorySummary {
        attempts,
        stats: HistoryStats {
            sessions,
            average_accuracy,
        },
    }
}

/// Read a user's most recent attempts and summarize them.
pub fn get_history(
    db: &Database,
    user_id: Option<&str>,
    limit: Option<i64>,
) -> Result<HistorySummary> {
    let user_id = authenticate(user_id)?;
    let limit = clamp_limit(limit);
    let attempts = db.recent_attempts(user_id, limit)?;
    log::debug!(
        "Loaded {} of up to {} attempts for {}",
        attempts.len(),
        limit,
        user_id
    );
    Ok(summarize(attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::{AttemptFields, PracticeError, ScoreFields, record_attempt};

    fn save(db: &Database, user: &str, accuracy: f64) {
        let fields = AttemptFields {
            lesson_id: Some("legato-1".into()),
            scores: Some(ScoreFields {
                accuracy: Some(accuracy),
                timing_score: Some(0.5),
                clarity_score: Some(0.5),
                speed_score: Some(0.5),
                consistency: Some(0.5),
            }),
            ..Default::default()
        };
        record_attempt(db, user, fields).unwrap();
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-7)), 1);
        assert_eq!(clamp_limit(Some(10)), 10);
        assert_eq!(clamp_limit(Some(1000)), 50);
    }

    #[test]
    fn test_summarize_empty() {
        let s = summarize(Vec::new());
        assert_eq!(s.stats.sessions, 0);
        assert_eq!(s.stats.average_accuracy, 0.0);
        assert!(s.attempts.is_empty());
    }

    #[test]
    fn test_fewer_stored_than_requested() {
        let db = Database::open_in_memory().unwrap();
        for acc in [0.5, 0.6, 0.75] {
            save(&db, "ana", acc);
        }
        let h = get_history(&db, Some("ana"), Some(10)).unwrap();
        assert_eq!(h.attempts.len(), 3);
        assert_eq!(h.stats.sessions, 3);
        assert_eq!(h.stats.average_accuracy, 0.617);
    }

    #[test]
    fn test_window_is_bounded() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..55 {
            save(&db, "ana", (i % 10) as f64 / 10.0);
        }
        save(&db, "ben", 1.0);

        assert_eq!(get_history(&db, Some("ana"), Some(1000)).unwrap().attempts.len(), 50);
        assert_eq!(get_history(&db, Some("ana"), Some(0)).unwrap().attempts.len(), 1);
        assert_eq!(get_history(&db, Some("ana"), None).unwrap().attempts.len(), 20);

        let ben = get_history(&db, Some("ben"), None).unwrap();
        assert_eq!(ben.stats.sessions, 1);
        assert_eq!(ben.stats.average_accuracy, 1.0);
    }

    #[test]
    fn test_window_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        save(&db, "ana", 0.1);
        save(&db, "ana", 0.2);
        save(&db, "ana", 0.3);

        let h = get_history(&db, Some("ana"), Some(2)).unwrap();
        let acc: Vec<f64> = h.attempts.iter().map(|a| a.scores.accuracy).collect();
        assert_eq!(acc, vec![0.3, 0.2]);
        assert_eq!(h.stats.average_accuracy, 0.25);
    }

    #[test]
    fn test_history_requires_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            get_history(&db, None, None),
            Err(PracticeError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_summary_serializes_contract_shape() {
        let json = serde_json::to_value(summarize(Vec::new())).unwrap();
        assert_eq!(json["stats"]["sessions"], 0);
        assert_eq!(json["stats"]["averageAccuracy"], 0.0);
        assert!(json["attempts"].as_array().unwrap().is_empty());
    }
}
