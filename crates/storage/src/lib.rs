pub mod diagnostics;
pub mod error;
pub mod kv;
pub mod migration;
pub mod persistence;

pub use diagnostics::{inspect, repair, RepairOutcome, SlotReport};
pub use error::StorageError;
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use migration::{load_and_migrate, migrate_legacy, needs_migration, open_store};
pub use persistence::{PersistenceAdapter, STORAGE_KEY, STORAGE_VERSION};
