use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hrims_core::TenantId;
use hrims_events::EventEnvelope;
use hrims_org::{CompensationStructure, GradeBand, GradeEvent, GradeId, GradeLimits};

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::projections::{CursorDecision, ProjectionError, StreamCursors, sort_for_replay, tenants_in};
use crate::read_model::TenantStore;

/// Queryable grade read model: compensation bands and loan limits.
///
/// The loan endpoints consult `limits.max_loan_amount` here before a
/// loan application command is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeReadModel {
    pub grade_id: GradeId,
    pub code: String,
    pub level: u32,
    pub band: GradeBand,
    pub compensation: CompensationStructure,
    pub limits: GradeLimits,
}

/// Grade directory projection.
pub struct GradeDirectoryProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<GradeId, GradeReadModel>,
{
    store: S,
    cursors: StreamCursors<C>,
}

impl<S> GradeDirectoryProjection<S>
where
    S: TenantStore<GradeId, GradeReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::in_memory("org.grades"),
        }
    }

    pub fn with_persistent_cursors<C: ProjectionCursorStore + 'static>(
        self,
        cursor_store: Arc<C>,
    ) -> GradeDirectoryProjection<S, C> {
        GradeDirectoryProjection {
            store: self.store,
            cursors: StreamCursors::persistent(cursor_store, "org.grades"),
        }
    }
}

impl<S, C> GradeDirectoryProjection<S, C>
where
    S: TenantStore<GradeId, GradeReadModel>,
    C: ProjectionCursorStore + 'static,
{
    pub fn get(&self, tenant_id: TenantId, grade_id: &GradeId) -> Option<GradeReadModel> {
        self.store.get(tenant_id, grade_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<GradeReadModel> {
        self.store.list(tenant_id)
    }

    /// Case-insensitive substring search on the grade code.
    pub fn search_by_name(&self, tenant_id: TenantId, query: &str) -> Vec<GradeReadModel> {
        let q = query.to_lowercase();
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.code.to_lowercase().contains(&q))
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "org.grade" {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorDecision::Skip => return Ok(()),
            CursorDecision::Apply => {}
        }

        let event: GradeEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, grade_id) = match &event {
            GradeEvent::GradeCreated(e) => (e.tenant_id, e.grade_id),
            GradeEvent::CompensationUpdated(e) => (e.tenant_id, e.grade_id),
            GradeEvent::LimitsUpdated(e) => (e.tenant_id, e.grade_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if grade_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event grade_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            GradeEvent::GradeCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.grade_id,
                    GradeReadModel {
                        grade_id: e.grade_id,
                        code: e.code,
                        level: e.level,
                        band: e.band,
                        compensation: e.compensation,
                        limits: e.limits,
                    },
                );
            }
            GradeEvent::CompensationUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.grade_id) {
                    rm.compensation = e.compensation;
                    self.store.upsert(tenant_id, e.grade_id, rm);
                }
            }
            GradeEvent::LimitsUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.grade_id) {
                    rm.limits = e.limits;
                    self.store.upsert(tenant_id, e.grade_id, rm);
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

    use hrims_core::AggregateId;
    use hrims_org::{GradeCreated, LimitsUpdated};

    use crate::read_model::InMemoryTenantStore;

    fn compensation() -> CompensationStructure {
        CompensationStructure {
            basic_min: 5_000_000,
            basic_mid: 6_500_000,
            basic_max: 8_000_000,
            house_allowance: 1_500_000,
            car_allowance: 500_000,
            travel_allowance: 250_000,
            overtime_multiplier_pct: 150,
        }
    }

    fn created(tenant_id: TenantId, grade_id: GradeId) -> GradeEvent {
        GradeEvent::GradeCreated(GradeCreated {
            tenant_id,
            grade_id,
            code: "G5".to_string(),
            level: 5,
            band: GradeBand::Supervisory,
            compensation: compensation(),
            limits: GradeLimits {
                max_loan_amount: 20_000_000,
                required_approval_level: 2,
            },
            occurred_at: Utc::now(),
        })
    }

    fn envelope(
        tenant_id: TenantId,
        grade_id: GradeId,
        seq: u64,
        event: &GradeEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            grade_id.0,
            "org.grade",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn projection() -> GradeDirectoryProjection<InMemoryTenantStore<GradeId, GradeReadModel>> {
        GradeDirectoryProjection::new(InMemoryTenantStore::new())
    }

    #[test]
    fn created_event_exposes_limits() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let grade_id = GradeId::new(AggregateId::new());

        let event = created(tenant_id, grade_id);
        projection
            .apply_envelope(&envelope(tenant_id, grade_id, 1, &event))
            .unwrap();

        let rm = projection.get(tenant_id, &grade_id).unwrap();
        assert_eq!(rm.code, "G5");
        assert_eq!(rm.limits.max_loan_amount, 20_000_000);
        assert_eq!(rm.compensation.overtime_multiplier_pct, 150);
    }

    #[test]
    fn limits_update_replaces_limits_only() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let grade_id = GradeId::new(AggregateId::new());

        let event = created(tenant_id, grade_id);
        projection
            .apply_envelope(&envelope(tenant_id, grade_id, 1, &event))
            .unwrap();

        let event = GradeEvent::LimitsUpdated(LimitsUpdated {
            tenant_id,
            grade_id,
            limits: GradeLimits {
                max_loan_amount: 30_000_000,
                required_approval_level: 3,
            },
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&envelope(tenant_id, grade_id, 2, &event))
            .unwrap();

        let rm = projection.get(tenant_id, &grade_id).unwrap();
        assert_eq!(rm.limits.max_loan_amount, 30_000_000);
        assert_eq!(rm.compensation, compensation());
    }

    #[test]
    fn search_matches_grade_code() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let grade_id = GradeId::new(AggregateId::new());

        let event = created(tenant_id, grade_id);
        projection
            .apply_envelope(&envelope(tenant_id, grade_id, 1, &event))
            .unwrap();

        assert_eq!(projection.search_by_name(tenant_id, "g5").len(), 1);
        assert!(projection.search_by_name(tenant_id, "g7").is_empty());
    }
}
