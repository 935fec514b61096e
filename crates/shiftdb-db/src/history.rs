use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use shiftdb_common::{Error, MigrationError, Result};
use shiftdb_config::loader::is_identifier;
use tracing::debug;

/// A row of the history table: one applied migration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub timestamp: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Ledger of applied migrations, kept in a table of the target database.
///
/// Every method takes the connection explicitly so the runner can pass the
/// open transaction (`rusqlite::Transaction` derefs to `Connection`), keeping
/// bookkeeping writes in the same commit as the schema change.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    table: String,
}

impl HistoryStore {
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(Error::Config(format!(
                "invalid history table name '{table}'"
            )));
        }
        Ok(Self { table })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn ensure_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                timestamp INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );",
            self.table
        ))
        .map_err(|e| Error::Database(format!("failed to create history table: {e}")))?;
        Ok(())
    }

    /// All records, most recent (greatest timestamp) first.
    pub fn loaded(&self, conn: &Connection) -> Result<Vec<HistoryRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT timestamp, name, applied_at FROM {} ORDER BY timestamp DESC",
                self.table
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| Error::Database(format!("failed to query history: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            let (timestamp, name, applied_at) =
                row.map_err(|e| Error::Database(format!("failed to read history row: {e}")))?;
            let applied_at = parse_datetime(&applied_at).ok_or_else(|| {
                Error::Database(format!(
                    "history row {timestamp}_{name} has unreadable applied_at '{applied_at}'"
                ))
            })?;
            records.push(HistoryRecord {
                timestamp,
                name,
                applied_at,
            });
        }
        Ok(records)
    }

    pub fn record(&self, conn: &Connection, timestamp: i64, name: &str) -> Result<()> {
        let inserted = conn
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (timestamp, name, applied_at) VALUES (?1, ?2, ?3)",
                    self.table
                ),
                params![timestamp, name, Utc::now().to_rfc3339()],
            )
            .map_err(|e| Error::Database(format!("failed to record migration: {e}")))?;

        if inserted == 0 {
            return Err(MigrationError::AlreadyRecorded {
                timestamp,
                name: name.to_string(),
            }
            .into());
        }
        debug!(timestamp, name, "history row recorded");
        Ok(())
    }

    pub fn erase(&self, conn: &Connection, timestamp: i64, name: &str) -> Result<()> {
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE timestamp = ?1 AND name = ?2",
                    self.table
                ),
                params![timestamp, name],
            )
            .map_err(|e| Error::Database(format!("failed to erase migration: {e}")))?;

        if deleted == 0 {
            return Err(MigrationError::NotFound {
                timestamp,
                name: name.to_string(),
            }
            .into());
        }
        debug!(timestamp, name, "history row erased");
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // Rows written by hand via datetime('now') use "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .ok()
        })
}
