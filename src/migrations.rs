//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))
}

/// Return the highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to read schema version: {}", e))
}

/// Back up the database before applying migrations.
///
/// Uses SQLite's online backup API to create a hot copy at
/// `<db_path>.pre-migration.bak`. Skipped for fresh databases (version 0)
/// and in-memory connections.
fn backup_before_migration(conn: &Connection, current: i32) -> Result<(), String> {
    if current == 0 {
        return Ok(());
    }

    let db_path: String = conn
        .query_row("PRAGMA database_list", [], |row| row.get(2))
        .map_err(|e| format!("Failed to get database path: {}", e))?;

    if db_path.is_empty() || db_path == ":memory:" {
        return Ok(());
    }

    let backup_path = format!("{}.pre-migration.bak", db_path);
    let mut backup_conn = Connection::open(&backup_path)
        .map_err(|e| format!("Failed to open backup file: {}", e))?;

    let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)
        .map_err(|e| format!("Failed to initialize pre-migration backup: {}", e))?;

    backup
        .step(-1)
        .map_err(|e| format!("Pre-migration backup failed: {}", e))?;

    log::info!("Pre-migration backup created at {}", backup_path);
    Ok(())
}

/// Run all pending migrations.
///
/// Returns the number of migrations applied (0 if already up-to-date).
/// Refuses to touch a database whose version is newer than any known migration.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    if current > max_known {
        return Err(format!(
            "Database schema version ({}) is newer than this version of PulseCheck supports ({}). \
             Please update PulseCheck to the latest version.",
            current, max_known
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        return Ok(0);
    }

    backup_before_migration(conn, current)?;

    for migration in &pending {
        conn.execute_batch(migration.sql)
            .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))?;

        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )
        .map_err(|e| format!("Failed to record migration v{}: {}", migration.version, e))?;

        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending.len())
}
