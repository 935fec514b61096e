use std::time::Duration;

use rusqlite::Connection;
use shiftdb_common::{Error, Result};
use shiftdb_config::DatabaseConfig;
use tracing::info;

/// Open the target database described by `config`.
pub fn open(config: &DatabaseConfig) -> Result<Connection> {
    info!("opening database at {}", config.path.display());
    let conn = Connection::open(&config.path)
        .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
    configure(&conn, config)?;
    Ok(conn)
}

pub fn open_in_memory(config: &DatabaseConfig) -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
    configure(&conn, config)?;
    Ok(conn)
}

fn configure(conn: &Connection, config: &DatabaseConfig) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|e| Error::Database(format!("failed to set busy timeout: {e}")))?;

    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!(
        "PRAGMA journal_mode=WAL; PRAGMA foreign_keys={foreign_keys};"
    ))
    .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

    Ok(())
}
