use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hrims_core::TenantId;
use hrims_events::EventEnvelope;
use hrims_org::{DepartmentId, GradeId, PositionEvent, PositionId, RoleFlags};

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::projections::{CursorDecision, ProjectionError, StreamCursors, sort_for_replay, tenants_in};
use crate::read_model::TenantStore;

/// Queryable position read model: headcount per job slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionReadModel {
    pub position_id: PositionId,
    pub title: String,
    pub code: String,
    pub department_id: Option<DepartmentId>,
    pub grade_id: Option<GradeId>,
    pub reports_to: Option<PositionId>,
    pub flags: RoleFlags,
    pub number_of_positions: u32,
    pub currently_filled: u32,
}

impl PositionReadModel {
    pub fn available(&self) -> u32 {
        self.number_of_positions.saturating_sub(self.currently_filled)
    }
}

/// Position directory projection.
pub struct PositionDirectoryProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<PositionId, PositionReadModel>,
{
    store: S,
    cursors: StreamCursors<C>,
}

impl<S> PositionDirectoryProjection<S>
where
    S: TenantStore<PositionId, PositionReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::in_memory("org.positions"),
        }
    }

    pub fn with_persistent_cursors<C: ProjectionCursorStore + 'static>(
        self,
        cursor_store: Arc<C>,
    ) -> PositionDirectoryProjection<S, C> {
        PositionDirectoryProjection {
            store: self.store,
            cursors: StreamCursors::persistent(cursor_store, "org.positions"),
        }
    }
}

impl<S, C> PositionDirectoryProjection<S, C>
where
    S: TenantStore<PositionId, PositionReadModel>,
    C: ProjectionCursorStore + 'static,
{
    pub fn get(&self, tenant_id: TenantId, position_id: &PositionId) -> Option<PositionReadModel> {
        self.store.get(tenant_id, position_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<PositionReadModel> {
        self.store.list(tenant_id)
    }

    /// Case-insensitive substring search on the position title.
    pub fn search_by_name(&self, tenant_id: TenantId, query: &str) -> Vec<PositionReadModel> {
        let q = query.to_lowercase();
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.title.to_lowercase().contains(&q))
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "org.position" {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorDecision::Skip => return Ok(()),
            CursorDecision::Apply => {}
        }

        let event: PositionEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, position_id) = match &event {
            PositionEvent::PositionCreated(e) => (e.tenant_id, e.position_id),
            PositionEvent::PositionUpdated(e) => (e.tenant_id, e.position_id),
            PositionEvent::PositionFilled(e) => (e.tenant_id, e.position_id),
            PositionEvent::PositionVacated(e) => (e.tenant_id, e.position_id),
            PositionEvent::PositionResized(e) => (e.tenant_id, e.position_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if position_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event position_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            PositionEvent::PositionCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.position_id,
                    PositionReadModel {
                        position_id: e.position_id,
                        title: e.title,
                        code: e.code,
                        department_id: e.department_id,
                        grade_id: e.grade_id,
                        reports_to: e.reports_to,
                        flags: e.flags,
                        number_of_positions: e.number_of_positions,
                        currently_filled: 0,
                    },
                );
            }
            PositionEvent::PositionUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.position_id) {
                    rm.title = e.title;
                    rm.reports_to = e.reports_to;
                    rm.flags = e.flags;
                    self.store.upsert(tenant_id, e.position_id, rm);
                }
            }
            PositionEvent::PositionFilled(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.position_id) {
                    rm.currently_filled = rm.currently_filled.saturating_add(1);
                    self.store.upsert(tenant_id, e.position_id, rm);
                }
            }
            PositionEvent::PositionVacated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.position_id) {
                    rm.currently_filled = rm.currently_filled.saturating_sub(1);
                    self.store.upsert(tenant_id, e.position_id, rm);
                }
            }
            PositionEvent::PositionResized(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.position_id) {
                    rm.number_of_positions = e.number_of_positions;
                    self.store.upsert(tenant_id, e.position_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);

        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        for tenant in tenants_in(&envs) {
            self.store.clear_tenant(tenant);
            self.cursors.clear(tenant);
        }

        sort_for_replay(&mut envs);

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
