//! Tesoro storage backends.
//!
//! One SQLite store implements all three durable collaborator contracts
//! (authorization repository, permission source, key-value store) over a
//! single database file, publishing typed change events through the
//! in-process `ChangeFeedHub` after every successful mutation. In-memory
//! fakes with the same contracts back the unit tests of the other crates.

pub mod feed;
pub mod memory;
pub mod sqlite;

pub use feed::ChangeFeedHub;
pub use memory::{MemoryKeyValueStore, MemoryPermissionSource, MemoryRepository};
pub use sqlite::SqliteStore;
