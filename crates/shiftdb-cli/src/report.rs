use std::fmt::Write;

use shiftdb_db::{Direction, MigrationEvent, MigrationObserver, StatusReport};

/// Prints runner progress to stdout as it happens.
pub struct ConsoleReporter;

impl MigrationObserver for ConsoleReporter {
    fn on_event(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::NothingToDo {
                direction: Direction::Up,
            } => println!("No migrations are pending."),
            MigrationEvent::NothingToDo {
                direction: Direction::Down,
            } => println!("No migrations to revert."),
            MigrationEvent::Started {
                direction: Direction::Up,
                migration,
            } => println!("Running migration {migration}"),
            MigrationEvent::Started {
                direction: Direction::Down,
                migration,
            } => println!("Reverting migration {migration}"),
            MigrationEvent::Succeeded {
                direction: Direction::Up,
                migration,
            } => println!("Migration {migration} has been executed successfully."),
            MigrationEvent::Succeeded {
                direction: Direction::Down,
                migration,
            } => println!("Migration {migration} has been reverted successfully."),
            MigrationEvent::Failed {
                direction,
                migration,
                error,
            } => eprintln!("Migration {migration} ({direction}) failed: {error}"),
        }
    }
}

/// One line per migration: `[X]` applied, `[ ]` pending. Orphaned history
/// rows are listed after the registry entries.
pub fn render_status(status: &StatusReport) -> String {
    let mut out = String::new();
    if status.migrations.is_empty() {
        out.push_str("No migrations found.\n");
    }
    for m in &status.migrations {
        let _ = match m.applied_at {
            Some(at) => writeln!(
                out,
                "[X] {}_{}  (applied {})",
                m.timestamp,
                m.name,
                at.format("%Y-%m-%d %H:%M:%S")
            ),
            None => writeln!(out, "[ ] {}_{}", m.timestamp, m.name),
        };
    }
    if !status.orphaned.is_empty() {
        out.push_str("\nApplied with no matching definition (cannot be reverted):\n");
        for r in &status.orphaned {
            let _ = writeln!(out, "[?] {}_{}", r.timestamp, r.name);
        }
    }
    out
}
