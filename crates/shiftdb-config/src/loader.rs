use std::path::{Path, PathBuf};

use shiftdb_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::model::AppConfig;

/// File names probed in the working directory when no explicit path is given.
const DEFAULT_FILES: &[&str] = &["shiftdb.yml", "shiftdb.yaml", "shiftdb.toml"];

pub const ENV_DATABASE_PATH: &str = "SHIFTDB_DATABASE_PATH";
pub const ENV_MIGRATIONS_DIR: &str = "SHIFTDB_MIGRATIONS_DIR";
pub const ENV_MIGRATIONS_TABLE: &str = "SHIFTDB_MIGRATIONS_TABLE";
pub const ENV_BUSY_TIMEOUT_MS: &str = "SHIFTDB_BUSY_TIMEOUT_MS";

/// Resolves an `AppConfig` from an optional file plus environment overrides.
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Probe the working directory for one of the default config files.
    pub fn discover() -> Self {
        Self::discover_in(Path::new("."))
    }

    /// First of `shiftdb.yml`, `shiftdb.yaml`, `shiftdb.toml` found in `dir`.
    pub fn discover_in(dir: &Path) -> Self {
        let path = DEFAULT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file());
        Self { path }
    }

    /// Use an explicit config file; it must exist.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load `./.env` into the process environment. Missing files are ignored.
    pub fn load_dotenv() -> bool {
        Self::load_dotenv_from(Path::new(".env"))
    }

    /// Load `path` into the process environment without overriding variables
    /// that are already set. Returns whether the file was read.
    pub fn load_dotenv_from(path: &Path) -> bool {
        match dotenvy::from_path(path) {
            Ok(()) => {
                debug!("loaded environment from {}", path.display());
                true
            }
            Err(e) if e.not_found() => false,
            Err(e) => {
                warn!("ignoring unreadable {}: {e}", path.display());
                false
            }
        }
    }

    /// Read the file (or defaults), apply process environment overrides and validate.
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = match &self.path {
            Some(path) => {
                let config = read_config(path)?;
                info!("loaded config from {}", path.display());
                config
            }
            None => {
                debug!("no config file found, using defaults");
                AppConfig::default()
            }
        };
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.database.path.as_os_str().is_empty() {
            return Err(Error::Config("database.path cannot be empty".into()));
        }
        if config.migrations.directory.as_os_str().is_empty() {
            return Err(Error::Config("migrations.directory cannot be empty".into()));
        }
        if !is_identifier(&config.migrations.table_name) {
            return Err(Error::Config(format!(
                "migrations.table_name '{}' is not a plain SQL identifier",
                config.migrations.table_name
            )));
        }
        Ok(())
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display()))),
        "toml" => toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}

/// Overlay `SHIFTDB_*` variables onto `config`. `lookup` is injected so callers
/// other than `load` need not touch the process environment.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(ENV_DATABASE_PATH) {
        config.database.path = PathBuf::from(path);
    }
    if let Some(dir) = lookup(ENV_MIGRATIONS_DIR) {
        config.migrations.directory = PathBuf::from(dir);
    }
    if let Some(table) = lookup(ENV_MIGRATIONS_TABLE) {
        config.migrations.table_name = table;
    }
    if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
        config.database.busy_timeout_ms = raw.trim().parse().map_err(|_| {
            Error::Config(format!("{ENV_BUSY_TIMEOUT_MS} must be an integer, got '{raw}'"))
        })?;
    }
    Ok(())
}

/// `[A-Za-z_][A-Za-z0-9_]*`; the history table name is spliced into SQL text.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
