use super::models::{
    AttemptScores, ChunkRange, LessonProgress, NewAttempt, PracticeAttempt, PracticeStats,
};
use super::{Database, Result};
use rusqlite::{Connection, Row, params};

const ATTEMPT_COLUMNS: &str = "id, user_id, lesson_id, lesson_title, level, bpm, target_bpm,
     practice_duration, notes_detected, notes_expected, chunk_start, chunk_end,
     accuracy, timing_score, clarity_score, speed_score, consistency, created_at";

impl Database {
    /// Insert an attempt and fold it into the user's lesson progress.
    /// Both writes share one transaction when the connection supports it.
    /// Returns the new attempt id.
    pub fn insert_attempt(&self, a: &NewAttempt) -> Result<i64> {
        if self.capabilities.transactions {
            let tx = self.conn.unchecked_transaction()?;
            let id = Self::insert_attempt_row(&tx, a)?;
            Self::upsert_progress(&tx, a)?;
            tx.commit()?;
            Ok(id)
        } else {
            let id = Self::insert_attempt_row(&self.conn, a)?;
            Self::upsert_progress(&self.conn, a)?;
            Ok(id)
        }
    }

    fn insert_attempt_row(conn: &Connection, a: &NewAttempt) -> Result<i64> {
        let (chunk_start, chunk_end) = match a.chunk_used {
            Some(c) => (Some(c.start), Some(c.end)),
            None => (None, None),
        };
        conn.execute(
            "INSERT INTO practice_attempts (
                user_id, lesson_id, lesson_title, level, bpm, target_bpm,
                practice_duration, notes_detected, notes_expected, chunk_start, chunk_end,
                accuracy, timing_score, clarity_score, speed_score, consistency, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                a.user_id, a.lesson_id, a.lesson_title, a.level, a.bpm, a.target_bpm,
                a.practice_duration, a.notes_detected, a.notes_expected, chunk_start, chunk_end,
                a.scores.accuracy, a.scores.timing_score, a.scores.clarity_score,
                a.scores.speed_score, a.scores.consistency, a.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn upsert_progress(conn: &Connection, a: &NewAttempt) -> Result<()> {
        conn.execute(
            "INSERT INTO lesson_progress (
                user_id, lesson_id, lesson_title, attempts,
                best_accuracy, last_accuracy, last_practiced_at
            ) VALUES (?1, ?2, ?3, 1, ?4, ?4, ?5)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                lesson_title = excluded.lesson_title,
                attempts = attempts + 1,
                best_accuracy = MAX(best_accuracy, excluded.best_accuracy),
                last_accuracy = excluded.last_accuracy,
                last_practiced_at = excluded.last_practiced_at
            ",
            params![a.user_id, a.lesson_id, a.lesson_title, a.scores.accuracy, a.created_at],
        )?;
        Ok(())
    }

    /// Fetch one attempt by id.
    pub fn get_attempt(&self, id: i64) -> Result<Option<PracticeAttempt>> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM practice_attempts WHERE id = ?1");
        match self.conn.query_row(&sql, params![id], read_attempt_row) {
            Ok(attempt) => Ok(Some(attempt)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Most recent attempts for a user, newest first. Ties on `created_at`
    /// go to the later insert.
    pub fn recent_attempts(&self, user_id: &str, limit: usize) -> Result<Vec<PracticeAttempt>> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM practice_attempts
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let attempts = stmt
            .query_map(params![user_id, limit as i64], read_attempt_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(attempts)
    }

    /// Per-lesson progress for a user, most recently practiced first.
    pub fn lesson_progress(&self, user_id: &str) -> Result<Vec<LessonProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT lesson_id, lesson_title, attempts,
                    best_accuracy, last_accuracy, last_practiced_at
             FROM lesson_progress
             WHERE user_id = ?1
             ORDER BY last_practiced_at DESC, lesson_id",
        )?;

        let progress = stmt
            .query_map(params![user_id], |row| {
                Ok(LessonProgress {
                    lesson_id: row.get(0)?,
                    lesson_title: row.get(1)?,
                    attempts: row.get(2)?,
                    best_accuracy: row.get(3)?,
                    last_accuracy: row.get(4)?,
                    last_practiced_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(progress)
    }

    /// Get store-wide statistics.
    pub fn stats(&self) -> Result<PracticeStats> {
        let (total_attempts, users, lessons, average_accuracy, total_practice_hours): (
            i64,
            i64,
            i64,
            f64,
            f64,
        ) = self.conn.query_row(
            "SELECT COUNT(*),
                    COUNT(DISTINCT user_id),
                    COUNT(DISTINCT lesson_id),
                    COALESCE(AVG(accuracy), 0.0),
                    COALESCE(SUM(practice_duration), 0.0) / 3600.0
             FROM practice_attempts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )?;

        let mut level_stmt = self.conn.prepare(
            "SELECT level, COUNT(*) FROM practice_attempts GROUP BY level ORDER BY COUNT(*) DESC",
        )?;
        let levels: Vec<(String, i64)> = level_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(PracticeStats {
            total_attempts,
            users,
            lessons,
            average_accuracy,
            total_practice_hours,
            levels,
        })
    }
}

fn read_attempt_row(row: &Row<'_>) -> rusqlite::Result<PracticeAttempt> {
    let chunk_start: Option<f64> = row.get(10)?;
    let chunk_end: Option<f64> = row.get(11)?;
    let chunk_used = match (chunk_start, chunk_end) {
        (Some(start), Some(end)) => Some(ChunkRange { start, end }),
        _ => None,
    };

    Ok(PracticeAttempt {
        id: row.get(0)?,
        user_id: row.get(1)?,
        lesson_id: row.get(2)?,
        lesson_title: row.get(3)?,
        level: row.get(4)?,
        bpm: row.get(5)?,
        target_bpm: row.get(6)?,
        practice_duration: row.get(7)?,
        notes_detected: row.get(8)?,
        notes_expected: row.get(9)?,
        chunk_used,
        scores: AttemptScores {
            accuracy: row.get(12)?,
            timing_score: row.get(13)?,
            clarity_score: row.get(14)?,
            speed_score: row.get(15)?,
            consistency: row.get(16)?,
        },
        created_at: row.get(17)?,
    })
}
