pub mod repo;
pub mod sqlite;

pub use repo::{MessageStore, StoreResult};
pub use sqlite::SqliteStore;
