use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use shiftdb_common::{Error, Result};
use tracing::{debug, info};

use crate::migration::MigrationDefinition;
use crate::registry::Registry;

/// `<timestamp>_<Name>.up.sql` / `<timestamp>_<Name>.down.sql`
const FILE_PATTERN: &str = r"^(?P<ts>\d+)_(?P<name>[A-Za-z0-9_]+)\.(?P<dir>up|down)\.sql$";

#[derive(Default)]
struct Pair {
    up: Option<String>,
    down: Option<String>,
}

/// Read every migration file in `dir` into definitions, ascending by timestamp.
///
/// A missing `.down.sql` leaves the inverse empty. A `.down.sql` without its
/// `.up.sql` is an error. Other files are skipped.
pub fn load_dir(dir: &Path) -> Result<Vec<MigrationDefinition>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "migrations directory {} does not exist",
            dir.display()
        )));
    }
    let pattern =
        Regex::new(FILE_PATTERN).map_err(|e| Error::Other(format!("bad file pattern: {e}")))?;

    let mut pairs: BTreeMap<(i64, String), Pair> = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        let Some(caps) = pattern.captures(file_name) else {
            debug!("skipping non-migration file {}", path.display());
            continue;
        };

        let timestamp: i64 = caps["ts"].parse().map_err(|_| {
            Error::Config(format!("migration timestamp out of range in {file_name}"))
        })?;
        let sql = std::fs::read_to_string(&path)?;
        let pair = pairs
            .entry((timestamp, caps["name"].to_string()))
            .or_default();
        match &caps["dir"] {
            "up" => pair.up = Some(sql),
            _ => pair.down = Some(sql),
        }
    }

    let mut migrations = Vec::with_capacity(pairs.len());
    for ((timestamp, name), pair) in pairs {
        let Some(up) = pair.up else {
            return Err(Error::Config(format!(
                "{timestamp}_{name}.down.sql has no matching .up.sql"
            )));
        };
        let mut migration = MigrationDefinition::new(timestamp, name);
        if !up.trim().is_empty() {
            migration = migration.up(up);
        }
        if let Some(down) = pair.down.filter(|d| !d.trim().is_empty()) {
            migration = migration.down(down);
        }
        migrations.push(migration);
    }

    info!(
        count = migrations.len(),
        "loaded migrations from {}",
        dir.display()
    );
    Ok(migrations)
}

/// [`load_dir`] followed by [`Registry::new`].
pub fn load_registry(dir: &Path) -> Result<Registry> {
    Registry::new(load_dir(dir)?)
}

/// Whether `name` can be used as the `<Name>` part of a migration file.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
