pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// What the underlying connection can do. Probed once when the database is
/// opened and carried on the handle; tests can inject their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Multi-statement writes can be wrapped in a transaction.
    pub transactions: bool,
}

impl Capabilities {
    /// Check whether a transaction can be opened and rolled back on `conn`.
    pub fn probe(conn: &Connection) -> Self {
        let transactions = conn.execute_batch("BEGIN; ROLLBACK;").is_ok();
        if !transactions {
            log::warn!("Connection does not support transactions; writes will not be atomic");
        }
        Self { transactions }
    }
}

pub struct Database {
    pub conn: Connection,
    pub capabilities: Capabilities,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, None)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, None)
    }

    /// Open an in-memory database with fixed capabilities instead of probing.
    pub fn open_in_memory_with(capabilities: Capabilities) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, Some(capabilities))
    }

    fn with_connection(conn: Connection, capabilities: Option<Capabilities>) -> Result<Self> {
        let capabilities = capabilities.unwrap_or_else(|| Capabilities::probe(&conn));
        let db = Self { conn, capabilities };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // WAL mode for better concurrent read performance
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version < 1 {
            self.migrate_v1()?;
        }
        if version < 2 {
            self.migrate_v2()?;
        }

        self.conn.pragma_update(None, "user_version", 2)?;
        Ok(())
    }

    /// V1: practice attempts, one row per saved attempt
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS practice_attempts (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             TEXT NOT NULL,
                lesson_id           TEXT NOT NULL,
                lesson_title        TEXT NOT NULL,
                level               TEXT NOT NULL,
                bpm                 REAL NOT NULL,
                target_bpm          REAL NOT NULL,
                practice_duration   REAL NOT NULL,
                notes_detected      INTEGER NOT NULL,
                notes_expected      INTEGER NOT NULL,

                -- Practiced section (beats), both null when the whole piece was played
                chunk_start         REAL,
                chunk_end           REAL,

                -- Scores (0-1, three decimals)
                accuracy            REAL NOT NULL,
                timing_score        REAL NOT NULL,
                clarity_score       REAL NOT NULL,
                speed_score         REAL NOT NULL,
                consistency         REAL NOT NULL,

                created_at          TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_user_created
                ON practice_attempts(user_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_attempts_lesson ON practice_attempts(lesson_id);
            ",
        )?;
        Ok(())
    }

    /// V2: per-lesson progress, maintained alongside each insert
    fn migrate_v2(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS lesson_progress (
                user_id             TEXT NOT NULL,
                lesson_id           TEXT NOT NULL,
                lesson_title        TEXT NOT NULL,
                attempts            INTEGER NOT NULL,
                best_accuracy       REAL NOT NULL,
                last_accuracy       REAL NOT NULL,
                last_practiced_at   TEXT NOT NULL,
                PRIMARY KEY (user_id, lesson_id)
            );

            CREATE INDEX IF NOT EXISTS idx_progress_user ON lesson_progress(user_id);
            ",
        )?;
        Ok(())
    }
}
