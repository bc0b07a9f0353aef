//! Persistent alert storage.

mod sqlite;

pub use sqlite::SqliteAlertStore;
