//! Storage layer for tracefold
//!
//! Events are kept behind the [`EventStore`] trait:
//! - [`Database`]: SQLite with schema migrations (the default)
//! - [`MemoryStore`]: volatile, for tests and throwaway servers

pub mod memory;
pub mod repo;
pub mod schema;
pub mod store;

pub use memory::MemoryStore;
pub use repo::Database;
pub use store::{AppendReport, EventFilter, EventStore, IngestRun};
