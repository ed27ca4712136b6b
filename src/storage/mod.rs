pub mod noop;
pub mod sqlite;
pub mod trait_def;

pub use noop::NoopStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{RefererCount, Storage, StorageError, StorageResult};
