/// Taskboard core: board data model, persistence, integrity and recovery.
pub mod backup;
pub mod cache;
pub mod config;
pub mod error;
pub mod feedback;
pub mod integrity;
pub mod migration;
pub mod recovery;
pub mod resilience;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use backup::BackupManager;
pub use config::CoreConfig;
pub use error::{KanbanError, Result};
pub use feedback::{Feedback, Notification, NotificationLevel, Notifier};
pub use migration::Migrator;
pub use recovery::{BackupEntry, RecoveryOrchestrator, TierOutcome};
pub use resilience::Resilience;
pub use service::BoardService;
pub use storage::{KeyValueStore, StorageError};
pub use types::{Board, BoardSet, Card};
