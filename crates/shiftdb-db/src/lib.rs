pub mod database;
pub mod events;
pub mod history;
pub mod loader;
pub mod migration;
pub mod registry;
pub mod runner;

pub use events::{Direction, MigrationEvent, MigrationObserver};
pub use history::{HistoryRecord, HistoryStore};
pub use migration::{MigrationDefinition, MigrationId};
pub use registry::Registry;
pub use runner::{ApplyReport, MigrationStatus, Runner, StatusReport};
