use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hrims_core::{AggregateId, TenantId};
use hrims_events::EventEnvelope;
use hrims_org::{DepartmentEvent, DepartmentId};

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::projections::{CursorDecision, ProjectionError, StreamCursors, sort_for_replay, tenants_in};
use crate::read_model::TenantStore;

/// Queryable department read model: the org chart node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentReadModel {
    pub department_id: DepartmentId,
    pub name: String,
    pub parent_id: Option<DepartmentId>,
    pub head_employee_id: Option<AggregateId>,
    pub active: bool,
}

/// Department directory projection.
///
/// Also backs hierarchy checks: a reparent request walks `parent_id`
/// links here to refuse cycles before the command is dispatched.
pub struct DepartmentDirectoryProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<DepartmentId, DepartmentReadModel>,
{
    store: S,
    cursors: StreamCursors<C>,
}

impl<S> DepartmentDirectoryProjection<S>
where
    S: TenantStore<DepartmentId, DepartmentReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::in_memory("org.departments"),
        }
    }

    pub fn with_persistent_cursors<C: ProjectionCursorStore + 'static>(
        self,
        cursor_store: Arc<C>,
    ) -> DepartmentDirectoryProjection<S, C> {
        DepartmentDirectoryProjection {
            store: self.store,
            cursors: StreamCursors::persistent(cursor_store, "org.departments"),
        }
    }
}

impl<S, C> DepartmentDirectoryProjection<S, C>
where
    S: TenantStore<DepartmentId, DepartmentReadModel>,
    C: ProjectionCursorStore + 'static,
{
    pub fn get(
        &self,
        tenant_id: TenantId,
        department_id: &DepartmentId,
    ) -> Option<DepartmentReadModel> {
        self.store.get(tenant_id, department_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<DepartmentReadModel> {
        self.store.list(tenant_id)
    }

    /// Case-insensitive substring search on the department name.
    pub fn search_by_name(&self, tenant_id: TenantId, query: &str) -> Vec<DepartmentReadModel> {
        let q = query.to_lowercase();
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.name.to_lowercase().contains(&q))
            .collect()
    }

    /// Whether making `proposed_parent` the parent of `department_id` would
    /// close a cycle in the hierarchy. Walks existing `parent_id` links;
    /// bounded by the tenant's department count, so unaffected by stale or
    /// partially projected links.
    pub fn would_create_cycle(
        &self,
        tenant_id: TenantId,
        department_id: DepartmentId,
        proposed_parent: DepartmentId,
    ) -> bool {
        if proposed_parent == department_id {
            return true;
        }

        let mut current = Some(proposed_parent);
        let mut hops = self.list(tenant_id).len();
        while let Some(dept_id) = current {
            if dept_id == department_id {
                return true;
            }
            if hops == 0 {
                break;
            }
            hops -= 1;
            current = self.get(tenant_id, &dept_id).and_then(|rm| rm.parent_id);
        }

        false
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "org.department" {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorDecision::Skip => return Ok(()),
            CursorDecision::Apply => {}
        }

        let event: DepartmentEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, department_id) = match &event {
            DepartmentEvent::DepartmentCreated(e) => (e.tenant_id, e.department_id),
            DepartmentEvent::DepartmentUpdated(e) => (e.tenant_id, e.department_id),
            DepartmentEvent::DepartmentReparented(e) => (e.tenant_id, e.department_id),
            DepartmentEvent::DepartmentDeactivated(e) => (e.tenant_id, e.department_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if department_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event department_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            DepartmentEvent::DepartmentCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.department_id,
                    DepartmentReadModel {
                        department_id: e.department_id,
                        name: e.name,
                        parent_id: e.parent_id,
                        head_employee_id: e.head_employee_id,
                        active: true,
                    },
                );
            }
            DepartmentEvent::DepartmentUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.department_id) {
                    rm.name = e.name;
                    rm.head_employee_id = e.head_employee_id;
                    self.store.upsert(tenant_id, e.department_id, rm);
                }
            }
            DepartmentEvent::DepartmentReparented(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.department_id) {
                    rm.parent_id = e.parent_id;
                    self.store.upsert(tenant_id, e.department_id, rm);
                }
            }
            DepartmentEvent::DepartmentDeactivated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.department_id) {
                    rm.active = false;
                    self.store.upsert(tenant_id, e.department_id, rm);
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use hrims_org::{DepartmentCreated, DepartmentReparented};

    use crate::read_model::InMemoryTenantStore;

    fn created(
        tenant_id: TenantId,
        department_id: DepartmentId,
        name: &str,
        parent_id: Option<DepartmentId>,
    ) -> DepartmentEvent {
        DepartmentEvent::DepartmentCreated(DepartmentCreated {
            tenant_id,
            department_id,
            name: name.to_string(),
            parent_id,
            head_employee_id: None,
            occurred_at: Utc::now(),
        })
    }

    fn envelope(
        tenant_id: TenantId,
        department_id: DepartmentId,
        seq: u64,
        event: &DepartmentEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            department_id.0,
            "org.department",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn projection()
    -> DepartmentDirectoryProjection<InMemoryTenantStore<DepartmentId, DepartmentReadModel>> {
        DepartmentDirectoryProjection::new(InMemoryTenantStore::new())
    }

    #[test]
    fn created_event_builds_org_chart_node() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let department_id = DepartmentId::new(AggregateId::new());

        let event = created(tenant_id, department_id, "Engineering", None);
        projection
            .apply_envelope(&envelope(tenant_id, department_id, 1, &event))
            .unwrap();

        let rm = projection.get(tenant_id, &department_id).unwrap();
        assert_eq!(rm.name, "Engineering");
        assert!(rm.active);
    }

    #[test]
    fn cycle_detection_walks_parent_links() {
        let projection = projection();
        let tenant_id = TenantId::new();

        // root <- mid <- leaf
        let root = DepartmentId::new(AggregateId::new());
        let mid = DepartmentId::new(AggregateId::new());
        let leaf = DepartmentId::new(AggregateId::new());

        let event = created(tenant_id, root, "Root", None);
        projection
            .apply_envelope(&envelope(tenant_id, root, 1, &event))
            .unwrap();
        let event = created(tenant_id, mid, "Mid", Some(root));
        projection
            .apply_envelope(&envelope(tenant_id, mid, 1, &event))
            .unwrap();
        let event = created(tenant_id, leaf, "Leaf", Some(mid));
        projection
            .apply_envelope(&envelope(tenant_id, leaf, 1, &event))
            .unwrap();

        // Reparenting root under leaf would close the loop.
        assert!(projection.would_create_cycle(tenant_id, root, leaf));
        assert!(projection.would_create_cycle(tenant_id, root, root));
        // Moving leaf directly under root is fine.
        assert!(!projection.would_create_cycle(tenant_id, leaf, root));
    }

    #[test]
    fn reparent_updates_hierarchy() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let root = DepartmentId::new(AggregateId::new());
        let child = DepartmentId::new(AggregateId::new());

        let event = created(tenant_id, root, "Root", None);
        projection
            .apply_envelope(&envelope(tenant_id, root, 1, &event))
            .unwrap();
        let event = created(tenant_id, child, "Child", Some(root));
        projection
            .apply_envelope(&envelope(tenant_id, child, 1, &event))
            .unwrap();

        let event = DepartmentEvent::DepartmentReparented(DepartmentReparented {
            tenant_id,
            department_id: child,
            parent_id: None,
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&envelope(tenant_id, child, 2, &event))
            .unwrap();

        assert_eq!(projection.get(tenant_id, &child).unwrap().parent_id, None);
    }

    #[test]
    fn other_aggregate_types_are_ignored() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let department_id = DepartmentId::new(AggregateId::new());

        let env = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            department_id.0,
            "people.employee",
            1,
            serde_json::json!({"unrelated": true}),
        );
        projection.apply_envelope(&env).unwrap();

        assert!(projection.list(tenant_id).is_empty());
    }
}
