use std::fmt;

use serde::Serialize;

/// Identity of a migration: its authoring timestamp plus a human name,
/// rendered as `<timestamp>_<name>` (e.g. `1658694616973_CreatePost`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MigrationId {
    pub timestamp: i64,
    pub name: String,
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.timestamp, self.name)
    }
}

/// A forward (`up`) and inverse (`down`) pair of schema changes.
///
/// Each direction is a sequence of SQL batches executed in order inside the
/// step's transaction. Definitions are built once and never mutated after
/// being handed to a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDefinition {
    timestamp: i64,
    name: String,
    up: Vec<String>,
    down: Vec<String>,
}

impl MigrationDefinition {
    pub fn new(timestamp: i64, name: impl Into<String>) -> Self {
        Self {
            timestamp,
            name: name.into(),
            up: Vec::new(),
            down: Vec::new(),
        }
    }

    /// Append a statement to the forward direction.
    pub fn up(mut self, sql: impl Into<String>) -> Self {
        self.up.push(sql.into());
        self
    }

    /// Append a statement to the inverse direction.
    pub fn down(mut self, sql: impl Into<String>) -> Self {
        self.down.push(sql.into());
        self
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    pub fn down_statements(&self) -> &[String] {
        &self.down
    }

    pub fn id(&self) -> MigrationId {
        MigrationId {
            timestamp: self.timestamp,
            name: self.name.clone(),
        }
    }
}
