use std::fmt;

use crate::migration::MigrationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// Progress reported by the runner while it works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    /// Nothing pending (up) or nothing applied (down).
    NothingToDo { direction: Direction },
    Started {
        direction: Direction,
        migration: MigrationId,
    },
    Succeeded {
        direction: Direction,
        migration: MigrationId,
    },
    Failed {
        direction: Direction,
        migration: MigrationId,
        error: String,
    },
}

/// Receives runner progress. Implemented by wrapping tools that want events
/// in addition to the `tracing` output.
pub trait MigrationObserver: Send + Sync {
    fn on_event(&self, event: &MigrationEvent);
}
