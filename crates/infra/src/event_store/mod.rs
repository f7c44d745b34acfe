//! Append-only event store boundary.
//!
//! Storage-agnostic abstraction over tenant-scoped event streams. The
//! in-memory store backs tests and development, the Postgres store backs
//! deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
