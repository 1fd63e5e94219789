//! SQLite storage for request counters
//!
//! One row, one column per outcome. Every update bumps `requests` together
//! with exactly one outcome column, so the columns always sum to `requests`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::Outcome;

/// Counter values at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub ok: u64,
    pub invalid_input: u64,
    pub all_failed: u64,
    /// Time of the last update; `None` until the first request
    pub updated_at: Option<DateTime<Utc>>,
}

/// SQLite-backed counters store
pub struct StatsDb {
    conn: Mutex<Connection>,
}

impl StatsDb {
    /// Open or create the counters database, creating parent directories
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .context("Failed to configure SQLite pragmas")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;

        info!("Opened counters database at {}", db_path.display());
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;

        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS statistics (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    requests INTEGER NOT NULL DEFAULT 0,
                    ok INTEGER NOT NULL DEFAULT 0,
                    invalid_input INTEGER NOT NULL DEFAULT 0,
                    all_failed INTEGER NOT NULL DEFAULT 0,
                    updated_at TEXT
                );

                INSERT OR IGNORE INTO statistics (id) VALUES (1);
                "#,
            )
            .context("Failed to create tables")?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Counters database lock poisoned"))
    }

    /// Cheap round trip to prove the database answers
    pub fn health_check(&self) -> Result<()> {
        let one: i64 = self
            .lock()?
            .query_row("SELECT 1", [], |row| row.get(0))
            .context("Counters database health check failed")?;

        if one != 1 {
            return Err(anyhow!("Counters database returned {} for SELECT 1", one));
        }
        Ok(())
    }

    /// Count one request with its outcome
    pub fn record(&self, outcome: Outcome) -> Result<()> {
        // Column names come from a closed set, never from input
        let sql = format!(
            "UPDATE statistics SET requests = requests + 1, {col} = {col} + 1, updated_at = ?1 WHERE id = 1",
            col = outcome.column()
        );

        let updated = self
            .lock()?
            .execute(&sql, [Utc::now().to_rfc3339()])
            .with_context(|| format!("Failed to record {:?}", outcome))?;

        if updated != 1 {
            return Err(anyhow!("Counters row missing"));
        }

        debug!("Counted {:?}", outcome);
        Ok(())
    }

    /// Current counter values
    pub fn snapshot(&self) -> Result<StatsSnapshot> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT requests, ok, invalid_input, all_failed, updated_at FROM statistics WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()
            .context("Failed to read counters")?;

        let Some((requests, ok, invalid_input, all_failed, updated_at)) = row else {
            return Ok(StatsSnapshot::default());
        };

        let updated_at = updated_at
            .map(|ts| {
                DateTime::parse_from_rfc3339(&ts)
                    .map(|t| t.with_timezone(&Utc))
                    .with_context(|| format!("Invalid timestamp in counters: {}", ts))
            })
            .transpose()?;

        Ok(StatsSnapshot {
            requests: requests as u64,
            ok: ok as u64,
            invalid_input: invalid_input as u64,
            all_failed: all_failed as u64,
            updated_at,
        })
    }

    /// Close the connection, flushing the WAL
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().unwrap_or_else(|e| e.into_inner());
        conn.close()
            .map_err(|(_, e)| e)
            .context("Failed to close counters database")?;
        info!("Closed counters database");
        Ok(())
    }
}
