use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration, read from `shiftdb.yml` / `shiftdb.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

/// Connection settings for the target SQLite database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    /// How long a step waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            foreign_keys: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationsConfig {
    #[serde(default = "default_migrations_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_migrations_dir(),
            table_name: default_table_name(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("shiftdb.sqlite3")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_table_name() -> String {
    "migrations".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: AppConfig = serde_yaml::from_str("database:\n  path: app.db\n").unwrap();
        assert_eq!(config.database.path, PathBuf::from("app.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert!(config.database.foreign_keys);
        assert_eq!(config.migrations, MigrationsConfig::default());
    }

    #[test]
    fn toml_sets_directory_and_table_name() {
        let config: AppConfig = toml::from_str(
            "[migrations]\ndirectory = \"db/migrations\"\ntable_name = \"schema_history\"\n",
        )
        .unwrap();
        assert_eq!(config.migrations.directory, PathBuf::from("db/migrations"));
        assert_eq!(config.migrations.table_name, "schema_history");
    }
}
