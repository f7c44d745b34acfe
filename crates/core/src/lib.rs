//! `hrims-core` — domain foundation building blocks.
//!
//! Pure domain primitives only; no HTTP, storage, or async concerns.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId};
