//! Repository layer for database operations

pub mod servers;

pub use servers::{ServerRecord, SqliteDirectory};
