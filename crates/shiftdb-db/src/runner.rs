use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use shiftdb_common::{Error, MigrationError, Result};
use shiftdb_config::AppConfig;
use tracing::{error, info, warn};

use crate::database;
use crate::events::{Direction, MigrationEvent, MigrationObserver};
use crate::history::{HistoryRecord, HistoryStore};
use crate::loader;
use crate::migration::{MigrationDefinition, MigrationId};
use crate::registry::Registry;

/// Outcome of a successful [`Runner::apply`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Migrations executed by this call, in the order they ran.
    pub applied: Vec<MigrationId>,
    /// Migrations that were already in the history table before the call.
    pub already_applied: usize,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// One registry entry and whether it has been applied.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub timestamp: i64,
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Every registry entry, ascending by timestamp.
    pub migrations: Vec<MigrationStatus>,
    /// History rows with no definition of the same timestamp and name.
    pub orphaned: Vec<HistoryRecord>,
}

impl StatusReport {
    pub fn pending_count(&self) -> usize {
        self.migrations
            .iter()
            .filter(|m| m.applied_at.is_none())
            .count()
    }
}

/// Applies pending migrations and reverts applied ones against a single
/// SQLite connection.
///
/// Each migration runs in its own `BEGIN IMMEDIATE` transaction: schema
/// statements and the history row commit together or not at all. The
/// immediate transaction holds SQLite's write lock, so a second runner on the
/// same file waits (up to the busy timeout) instead of interleaving.
pub struct Runner {
    conn: Mutex<Connection>,
    registry: Registry,
    history: HistoryStore,
    observer: Option<Arc<dyn MigrationObserver>>,
}

impl Runner {
    /// Wrap `conn`, creating the history table if it does not exist.
    pub fn new(conn: Connection, registry: Registry, history: HistoryStore) -> Result<Self> {
        history.ensure_table(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            registry,
            history,
            observer: None,
        })
    }

    /// Open the configured database and load the configured migrations directory.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let registry = loader::load_registry(&config.migrations.directory)?;
        let history = HistoryStore::new(config.migrations.table_name.clone())?;
        let conn = database::open(&config.database)?;
        Self::new(conn, registry, history)
    }

    pub fn with_observer(mut self, observer: Arc<dyn MigrationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("runner connection lock poisoned".into()))
    }

    fn emit(&self, event: MigrationEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    /// Run every pending migration's `up`, oldest first.
    ///
    /// Stops at the first failure; migrations committed before it stay
    /// applied and the error is a [`MigrationError::BatchAborted`].
    pub fn apply(&self) -> Result<ApplyReport> {
        let mut conn = self.connection()?;
        let records = self.history.loaded(&conn)?;
        self.warn_orphaned(&records);

        let applied: HashSet<i64> = records.iter().map(|r| r.timestamp).collect();
        let pending: Vec<&MigrationDefinition> = self
            .registry
            .list()
            .iter()
            .filter(|m| !applied.contains(&m.timestamp()))
            .collect();

        if pending.is_empty() {
            info!("no pending migrations, nothing to do");
            self.emit(MigrationEvent::NothingToDo {
                direction: Direction::Up,
            });
            return Ok(ApplyReport {
                applied: Vec::new(),
                already_applied: applied.len(),
            });
        }

        if let (Some(newest), Some(oldest_pending)) = (records.first(), pending.first())
            && oldest_pending.timestamp() < newest.timestamp
        {
            warn!(
                pending = %oldest_pending.id(),
                newest_applied = newest.timestamp,
                "pending migration is older than the newest applied one; applying it out of order"
            );
        }

        let total = pending.len();
        info!(count = total, "applying pending migrations");

        let mut report = ApplyReport {
            applied: Vec::with_capacity(total),
            already_applied: applied.len(),
        };
        for migration in pending {
            if let Err(e) = self.run_step(&mut conn, migration, Direction::Up) {
                return Err(MigrationError::BatchAborted {
                    applied: report.applied.len(),
                    total,
                    failed_at: migration.id().to_string(),
                    source: Box::new(e),
                }
                .into());
            }
            report.applied.push(migration.id());
        }

        info!(count = total, "all pending migrations applied");
        Ok(report)
    }

    /// Run the `down` of the most recently applied migration.
    ///
    /// Returns `None` when the history table is empty.
    pub fn revert(&self) -> Result<Option<MigrationId>> {
        let mut conn = self.connection()?;
        let records = self.history.loaded(&conn)?;

        let Some(latest) = records.first() else {
            info!("no migrations to revert");
            self.emit(MigrationEvent::NothingToDo {
                direction: Direction::Down,
            });
            return Ok(None);
        };

        let migration = self.definition_for(latest).ok_or_else(|| {
            error!(
                timestamp = latest.timestamp,
                name = %latest.name,
                "applied migration has no definition"
            );
            MigrationError::DefinitionMissing {
                timestamp: latest.timestamp,
                name: latest.name.clone(),
            }
        })?;

        self.run_step(&mut conn, migration, Direction::Down)?;
        Ok(Some(migration.id()))
    }

    /// Every registry entry with its applied time, plus orphaned history rows.
    pub fn status(&self) -> Result<StatusReport> {
        let conn = self.connection()?;
        let records = self.history.loaded(&conn)?;

        let migrations = self
            .registry
            .list()
            .iter()
            .map(|m| MigrationStatus {
                timestamp: m.timestamp(),
                name: m.name().to_string(),
                applied_at: records
                    .iter()
                    .find(|r| r.timestamp == m.timestamp())
                    .map(|r| r.applied_at),
            })
            .collect();

        let mut orphaned: Vec<HistoryRecord> =
            self.orphaned(&records).into_iter().cloned().collect();
        orphaned.reverse();

        Ok(StatusReport {
            migrations,
            orphaned,
        })
    }

    fn run_step(
        &self,
        conn: &mut Connection,
        migration: &MigrationDefinition,
        direction: Direction,
    ) -> Result<()> {
        let id = migration.id();
        info!(
            timestamp = id.timestamp,
            name = %id.name,
            %direction,
            "migration started"
        );
        self.emit(MigrationEvent::Started {
            direction,
            migration: id.clone(),
        });

        match self.execute_step(conn, migration, direction) {
            Ok(()) => {
                info!(
                    timestamp = id.timestamp,
                    name = %id.name,
                    %direction,
                    "migration succeeded"
                );
                self.emit(MigrationEvent::Succeeded {
                    direction,
                    migration: id,
                });
                Ok(())
            }
            Err(e) => {
                error!(
                    timestamp = id.timestamp,
                    name = %id.name,
                    %direction,
                    "migration failed, rolled back: {e}"
                );
                self.emit(MigrationEvent::Failed {
                    direction,
                    migration: id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn execute_step(
        &self,
        conn: &mut Connection,
        migration: &MigrationDefinition,
        direction: Direction,
    ) -> Result<()> {
        // Any early return drops `tx`, which rolls it back.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;

        let statements = match direction {
            Direction::Up => migration.up_statements(),
            Direction::Down => migration.down_statements(),
        };
        for sql in statements {
            tx.execute_batch(sql)
                .map_err(|e| MigrationError::SchemaOperationFailed {
                    migration: migration.id().to_string(),
                    message: e.to_string(),
                })?;
        }

        match direction {
            Direction::Up => self
                .history
                .record(&tx, migration.timestamp(), migration.name())?,
            Direction::Down => self
                .history
                .erase(&tx, migration.timestamp(), migration.name())?,
        }

        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit {}: {e}", migration.id())))
    }

    /// The definition a history row was applied from: same timestamp and name.
    fn definition_for(&self, record: &HistoryRecord) -> Option<&MigrationDefinition> {
        self.registry
            .get(record.timestamp)
            .filter(|m| m.name() == record.name)
    }

    /// History rows `revert` could not undo, including rows whose timestamp
    /// now belongs to a differently named definition.
    fn orphaned<'a>(&self, records: &'a [HistoryRecord]) -> Vec<&'a HistoryRecord> {
        records
            .iter()
            .filter(|r| self.definition_for(r).is_none())
            .collect()
    }

    fn warn_orphaned(&self, records: &[HistoryRecord]) {
        for record in self.orphaned(records) {
            match self.registry.get(record.timestamp) {
                Some(current) => warn!(
                    timestamp = record.timestamp,
                    name = %record.name,
                    definition = current.name(),
                    "history row was applied under a different name than its definition"
                ),
                None => warn!(
                    timestamp = record.timestamp,
                    name = %record.name,
                    "history contains a migration with no definition"
                ),
            }
        }
    }
}
