//! Event-driven projections maintaining the query-side read models.
//!
//! Each projection consumes published envelopes (JSON payloads) from the
//! event bus and maintains a tenant-isolated read model. Projections are
//! idempotent under at-least-once delivery: a per (tenant, aggregate)
//! cursor tracks the last applied sequence number, replays at or below the
//! cursor are ignored, and gaps are rejected.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use hrims_core::{AggregateId, TenantId};

pub mod cursor_store;
pub mod departments;
pub mod employees;
pub mod grades;
pub mod loans;
pub mod positions;

pub use cursor_store::{InMemoryCursorStore, PostgresCursorStore, ProjectionCursorStore};
pub use departments::{DepartmentDirectoryProjection, DepartmentReadModel};
pub use employees::{EmployeeDirectoryProjection, EmployeeReadModel, OnboardingReadModel};
pub use grades::{GradeDirectoryProjection, GradeReadModel};
pub use loans::{LoanBookProjection, LoanReadModel};
pub use positions::{PositionDirectoryProjection, PositionReadModel};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Tenant+aggregate cursor key for at-least-once delivery.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// Whether an envelope should be applied, or silently skipped as a replay.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CursorDecision {
    Apply,
    Skip,
}

/// Per-stream cursor bookkeeping shared by all projections.
///
/// Cursors live in memory; a persistent [`ProjectionCursorStore`] can be
/// attached so a projection resumes from its last offset after a restart.
pub(crate) struct StreamCursors<C> {
    cursors: RwLock<HashMap<CursorKey, u64>>,
    store: Option<Arc<C>>,
    projection_name: String,
}

impl<C: ProjectionCursorStore> StreamCursors<C> {
    pub(crate) fn in_memory(projection_name: impl Into<String>) -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
            store: None,
            projection_name: projection_name.into(),
        }
    }

    pub(crate) fn persistent(store: Arc<C>, projection_name: impl Into<String>) -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
            store: Some(store),
            projection_name: projection_name.into(),
        }
    }

    fn last(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        if let Some(ref store) = self.store {
            store
                .get_cursor(tenant_id, aggregate_id, &self.projection_name)
                .unwrap_or(0)
        } else {
            match self.cursors.read() {
                Ok(cursors) => *cursors
                    .get(&CursorKey {
                        tenant_id,
                        aggregate_id,
                    })
                    .unwrap_or(&0),
                Err(_) => 0,
            }
        }
    }

    /// Cursor check for one envelope. The first event of a stream may carry
    /// any positive sequence; after that increments must be strictly +1.
    pub(crate) fn check(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<CursorDecision, ProjectionError> {
        let last = self.last(tenant_id, aggregate_id);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay under at-least-once delivery.
            return Ok(CursorDecision::Skip);
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        Ok(CursorDecision::Apply)
    }

    pub(crate) fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    tenant_id,
                    aggregate_id,
                },
                seq,
            );
        }

        if let Some(ref store) = self.store {
            store.update_cursor(tenant_id, aggregate_id, &self.projection_name, seq);
        }
    }

    pub(crate) fn clear(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| k.tenant_id != tenant_id);
        }

        if let Some(ref store) = self.store {
            store.clear_cursors(tenant_id, &self.projection_name);
        }
    }
}

/// Deterministic replay order for rebuilds: tenant, aggregate, sequence.
pub(crate) fn sort_for_replay<E>(envs: &mut [hrims_events::EventEnvelope<E>]) {
    envs.sort_by_key(|e| {
        (
            *e.tenant_id().as_uuid().as_bytes(),
            *e.aggregate_id().as_uuid().as_bytes(),
            e.sequence_number(),
        )
    });
}

/// Distinct tenants appearing in a batch of envelopes.
pub(crate) fn tenants_in<E>(envs: &[hrims_events::EventEnvelope<E>]) -> Vec<TenantId> {
    let mut tenants: Vec<_> = envs.iter().map(|e| e.tenant_id()).collect();
    tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
    tenants.dedup();
    tenants
}
