use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Difficulty tier of the lesson an attempt was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown level \"{other}\"")),
        }
    }
}

impl ToSql for Level {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Level {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Section of the exercise that was practiced, in beats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkRange {
    pub start: f64,
    pub end: f64,
}

/// The score subset stored with each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptScores {
    pub accuracy: f64,
    pub timing_score: f64,
    pub clarity_score: f64,
    pub speed_score: f64,
    pub consistency: f64,
}

/// Validated attempt, ready to insert.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: String,
    pub lesson_id: String,
    pub lesson_title: String,
    pub level: Level,
    pub bpm: f64,
    pub target_bpm: f64,
    pub practice_duration: f64,
    pub notes_detected: i64,
    pub notes_expected: i64,
    pub chunk_used: Option<ChunkRange>,
    pub scores: AttemptScores,
    pub created_at: String,
}

/// A practice attempt row read from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeAttempt {
    pub id: i64,
    pub user_id: String,
    pub lesson_id: String,
    pub lesson_title: String,
    pub level: Level,
    pub bpm: f64,
    pub target_bpm: f64,
    pub practice_duration: f64,
    pub notes_detected: i64,
    pub notes_expected: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_used: Option<ChunkRange>,
    pub scores: AttemptScores,
    pub created_at: String,
}

/// Running progress of one user on one lesson.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub lesson_id: String,
    pub lesson_title: String,
    pub attempts: i64,
    pub best_accuracy: f64,
    pub last_accuracy: f64,
    pub last_practiced_at: String,
}

/// Store-wide statistics.
#[derive(Debug)]
pub struct PracticeStats {
    pub total_attempts: i64,
    pub users: i64,
    pub lessons: i64,
    pub average_accuracy: f64,
    pub total_practice_hours: f64,
    pub levels: Vec<(String, i64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!("beginner".parse::<Level>().unwrap(), Level::Beginner);
        assert_eq!(" Advanced ".parse::<Level>().unwrap(), Level::Advanced);
        assert!("expert".parse::<Level>().is_err());
        assert_eq!(Level::Intermediate.to_string(), "intermediate");
    }

    #[test]
    fn test_attempt_serializes_camel_case() {
        let attempt = PracticeAttempt {
            id: 1,
            user_id: "u1".into(),
            lesson_id: "scale-c".into(),
            lesson_title: "C major scale".into(),
            level: Level::Beginner,
            bpm: 80.0,
            target_bpm: 100.0,
            practice_duration: 42.5,
            notes_detected: 8,
            notes_expected: 8,
            chunk_used: None,
            scores: AttemptScores {
                accuracy: 0.9,
                timing_score: 1.0,
                clarity_score: 0.8,
                speed_score: 0.85,
                consistency: 0.7,
            },
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["lessonTitle"], "C major scale");
        assert_eq!(json["level"], "beginner");
        assert_eq!(json["scores"]["timingScore"], 1.0);
        assert!(json.get("chunkUsed").is_none());
    }
}
