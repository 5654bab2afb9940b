//! SQLite-backed store for surveys, responses, sentiment verdicts, review flags
//! and reviewer notifications.
//!
//! The database lives at `~/.pulsecheck/pulsecheck.db` unless configured
//! otherwise. Every table is written through the methods on [`FeedbackDb`];
//! the read side of the dashboard queries the same tables directly.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

pub mod types;
pub use types::*;

pub struct FeedbackDb {
    conn: Connection,
}

impl FeedbackDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at its default location and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        Self::open_at(Self::default_path()?)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        Self::prepare(conn)
    }

    /// Open a throwaway in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DbError> {
        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.pulsecheck/pulsecheck.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".pulsecheck").join("pulsecheck.db"))
    }

    /// Path of the main database file, empty for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.conn.path().map(Path::new)
    }
}

/// Generate a prefixed row id, e.g. `flag-2f1c…`.
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub mod flags;
pub mod notifications;
pub mod people;
pub mod responses;
pub mod sentiment;
pub mod surveys;

pub use flags::FlagInsert;

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::*;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the test.
    /// FK enforcement is disabled so that unit tests can insert rows without
    /// satisfying every foreign key constraint.
    pub fn test_db() -> FeedbackDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        let db = FeedbackDb::open_at(path).expect("Failed to open test database");
        db.conn_ref()
            .execute_batch("PRAGMA foreign_keys = OFF;")
            .expect("disable FK for tests");
        db
    }

    /// Insert a survey with one question per entry in `questions`, returning
    /// the survey id and question ids in order.
    pub fn seed_survey(db: &FeedbackDb, questions: &[QuestionType]) -> (String, Vec<String>) {
        let survey = db
            .create_survey("Quarterly pulse", None, Some("hr-1"))
            .expect("create survey");
        let mut ids = Vec::new();
        for (i, qt) in questions.iter().enumerate() {
            let q = db
                .insert_question(&survey.id, &format!("Question {}", i + 1), *qt, true, i as i32)
                .expect("insert question");
            ids.push(q.id);
        }
        (survey.id, ids)
    }

    /// Insert a profile for `user_id` in `department`, returning the profile id.
    pub fn seed_profile(db: &FeedbackDb, user_id: &str, department: &str) -> String {
        db.upsert_profile(
            user_id,
            &format!("{user_id}@example.com"),
            &format!("Person {user_id}"),
            department,
            AppRole::Employee,
        )
        .expect("upsert profile")
        .id
    }

    /// Count rows in `table` matching an optional raw WHERE clause.
    pub fn count_rows(db: &FeedbackDb, table: &str, filter: Option<&str>) -> i64 {
        let sql = match filter {
            Some(f) => format!("SELECT COUNT(*) FROM {table} WHERE {f}"),
            None => format!("SELECT COUNT(*) FROM {table}"),
        };
        db.conn_ref()
            .query_row(&sql, params![], |row| row.get(0))
            .optional()
            .expect("count query")
            .unwrap_or(0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("pulse.db");
        let db = FeedbackDb::open_at(path.clone()).expect("open");
        assert!(path.exists());
        assert!(db.path().is_some());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            tx.create_survey("Doomed", None, None)?;
            Err(DbError::Migration("forced".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(test_utils::count_rows(&db, "surveys", None), 0);
    }

    #[test]
    fn test_new_id_is_prefixed_and_unique() {
        let a = new_id("flag");
        let b = new_id("flag");
        assert!(a.starts_with("flag-"));
        assert_ne!(a, b);
    }
}
