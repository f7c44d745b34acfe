//! Infrastructure layer: event store, command dispatch, read models.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
mod runtime;
