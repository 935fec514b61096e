use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use shiftdb_config::AppConfig;
use shiftdb_db::{Runner, loader};
use tracing::info;

use crate::report::{ConsoleReporter, render_status};

fn open_runner(config: &AppConfig) -> Result<Runner> {
    let runner = Runner::open(config).with_context(|| {
        format!(
            "failed to open {} with migrations from {}",
            config.database.path.display(),
            config.migrations.directory.display()
        )
    })?;
    Ok(runner.with_observer(Arc::new(ConsoleReporter)))
}

pub fn run_migrations(config: &AppConfig) -> Result<()> {
    let runner = open_runner(config)?;
    let report = runner.apply().context("migration run failed")?;
    if !report.is_noop() {
        println!(
            "{} migration(s) executed, {} already applied.",
            report.applied.len(),
            report.already_applied
        );
    }
    Ok(())
}

pub fn revert_migration(config: &AppConfig) -> Result<()> {
    let runner = open_runner(config)?;
    runner.revert().context("migration revert failed")?;
    Ok(())
}

/// Print the status and return how many migrations are pending.
pub fn show_migrations(config: &AppConfig, json: bool) -> Result<usize> {
    let runner = open_runner(config)?;
    let status = runner.status().context("failed to read migration status")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&status));
    }

    Ok(status.pending_count())
}

pub fn create_migration(config: &AppConfig, name: &str) -> Result<()> {
    let timestamp = Utc::now().timestamp_millis();
    let (up, down) = write_stubs(&config.migrations.directory, timestamp, name)?;
    info!("created migration {timestamp}_{name}");
    println!("Migration {} has been generated successfully.", up.display());
    println!("Migration {} has been generated successfully.", down.display());
    Ok(())
}

/// Create `<dir>/<timestamp>_<name>.{up,down}.sql`. Existing files are never overwritten.
pub fn write_stubs(dir: &Path, timestamp: i64, name: &str) -> Result<(PathBuf, PathBuf)> {
    if !loader::is_valid_name(name) {
        bail!("migration name '{name}' may only contain letters, digits and underscores");
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let up = dir.join(format!("{timestamp}_{name}.up.sql"));
    let down = dir.join(format!("{timestamp}_{name}.down.sql"));
    write_stub(&up, &format!("-- {timestamp}_{name} (up)"))?;
    write_stub(&down, &format!("-- {timestamp}_{name} (down)"))?;
    Ok((up, down))
}

fn write_stub(path: &Path, header: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writeln!(file, "{header}").with_context(|| format!("failed to write {}", path.display()))
}
