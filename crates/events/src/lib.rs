//! `hrims-events` — domain-agnostic event plumbing.
//!
//! Events are facts: immutable, versioned, append-only. This crate holds
//! the event contract, the tenant-scoped envelope, and the pub/sub bus
//! abstraction used to feed projections.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
