use shiftdb_common::{MigrationError, Result};

use crate::migration::MigrationDefinition;

/// Ordered container of migration definitions, ascending by timestamp.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    migrations: Vec<MigrationDefinition>,
}

impl Registry {
    /// Sort `migrations` by timestamp. Fails if any two share a timestamp.
    pub fn new(mut migrations: Vec<MigrationDefinition>) -> Result<Self> {
        migrations.sort_by_key(|m| m.timestamp());

        if let Some(pair) = migrations
            .windows(2)
            .find(|w| w[0].timestamp() == w[1].timestamp())
        {
            return Err(MigrationError::DuplicateTimestamp {
                timestamp: pair[0].timestamp(),
                first: pair[0].name().to_string(),
                second: pair[1].name().to_string(),
            }
            .into());
        }

        Ok(Self { migrations })
    }

    pub fn list(&self) -> &[MigrationDefinition] {
        &self.migrations
    }

    pub fn get(&self, timestamp: i64) -> Option<&MigrationDefinition> {
        self.migrations
            .binary_search_by_key(&timestamp, |m| m.timestamp())
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    pub fn latest(&self) -> Option<&MigrationDefinition> {
        self.migrations.last()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
