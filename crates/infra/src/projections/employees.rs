use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hrims_core::AggregateId;
use hrims_core::TenantId;
use hrims_events::EventEnvelope;
use hrims_people::{ContractType, EmployeeEvent, EmployeeId, EmployeeStatus, RegistrationStatus};

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::projections::{CursorDecision, ProjectionError, StreamCursors, sort_for_replay, tenants_in};
use crate::read_model::TenantStore;

/// Queryable employee read model: the staff directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeReadModel {
    pub employee_id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub contract_type: ContractType,
    pub department_id: Option<AggregateId>,
    pub position_id: Option<AggregateId>,
    pub grade_id: Option<AggregateId>,
    pub status: EmployeeStatus,
    pub registration: RegistrationStatus,
    pub system_username: Option<String>,
    pub system_role: Option<String>,
}

impl EmployeeReadModel {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Onboarding progress view served from the employee read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingReadModel {
    pub employee_id: EmployeeId,
    pub registration: RegistrationStatus,
    pub system_username: Option<String>,
    pub system_role: Option<String>,
}

/// Employee directory projection.
///
/// Consumes published envelopes and maintains a tenant-isolated read model
/// for employees, suitable for lookup, listing and name search.
pub struct EmployeeDirectoryProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<EmployeeId, EmployeeReadModel>,
{
    store: S,
    cursors: StreamCursors<C>,
}

impl<S> EmployeeDirectoryProjection<S>
where
    S: TenantStore<EmployeeId, EmployeeReadModel>,
{
    /// Create a projection with in-memory cursor tracking.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::in_memory("people.employees"),
        }
    }

    /// Attach persistent cursor tracking.
    pub fn with_persistent_cursors<C: ProjectionCursorStore + 'static>(
        self,
        cursor_store: Arc<C>,
    ) -> EmployeeDirectoryProjection<S, C> {
        EmployeeDirectoryProjection {
            store: self.store,
            cursors: StreamCursors::persistent(cursor_store, "people.employees"),
        }
    }
}

impl<S, C> EmployeeDirectoryProjection<S, C>
where
    S: TenantStore<EmployeeId, EmployeeReadModel>,
    C: ProjectionCursorStore + 'static,
{
    pub fn get(&self, tenant_id: TenantId, employee_id: &EmployeeId) -> Option<EmployeeReadModel> {
        self.store.get(tenant_id, employee_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<EmployeeReadModel> {
        self.store.list(tenant_id)
    }

    /// Case-insensitive substring search on the employee's full name.
    pub fn search_by_name(&self, tenant_id: TenantId, query: &str) -> Vec<EmployeeReadModel> {
        let q = query.to_lowercase();
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.full_name().to_lowercase().contains(&q))
            .collect()
    }

    /// Onboarding progress for one employee.
    pub fn onboarding(
        &self,
        tenant_id: TenantId,
        employee_id: &EmployeeId,
    ) -> Option<OnboardingReadModel> {
        self.get(tenant_id, employee_id).map(|rm| OnboardingReadModel {
            employee_id: rm.employee_id,
            registration: rm.registration,
            system_username: rm.system_username,
            system_role: rm.system_role,
        })
    }

    /// Apply a published envelope into the projection.
    ///
    /// Ignores other aggregate types so projections can share one bus,
    /// enforces tenant isolation and monotonic sequences, and is idempotent
    /// for at-least-once delivery.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "people.employee" {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorDecision::Skip => return Ok(()),
            CursorDecision::Apply => {}
        }

        let event: EmployeeEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, employee_id) = match &event {
            EmployeeEvent::EmployeeRegistered(e) => (e.tenant_id, e.employee_id),
            EmployeeEvent::SystemAccessActivated(e) => (e.tenant_id, e.employee_id),
            EmployeeEvent::ProfileVerified(e) => (e.tenant_id, e.employee_id),
            EmployeeEvent::ContactUpdated(e) => (e.tenant_id, e.employee_id),
            EmployeeEvent::EmployeeTerminated(e) => (e.tenant_id, e.employee_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if employee_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event employee_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            EmployeeEvent::EmployeeRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.employee_id,
                    EmployeeReadModel {
                        employee_id: e.employee_id,
                        first_name: e.first_name,
                        last_name: e.last_name,
                        email: e.email,
                        phone: e.contact.phone,
                        contract_type: e.contract_type,
                        department_id: e.department_id,
                        position_id: e.position_id,
                        grade_id: e.grade_id,
                        status: EmployeeStatus::Active,
                        registration: RegistrationStatus::Registered,
                        system_username: None,
                        system_role: None,
                    },
                );
            }
            EmployeeEvent::SystemAccessActivated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.employee_id) {
                    rm.registration = RegistrationStatus::AccessActive;
                    rm.system_username = Some(e.system_username);
                    rm.system_role = Some(e.system_role);
                    self.store.upsert(tenant_id, e.employee_id, rm);
                }
            }
            EmployeeEvent::ProfileVerified(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.employee_id) {
                    rm.registration = RegistrationStatus::Verified;
                    self.store.upsert(tenant_id, e.employee_id, rm);
                }
            }
            EmployeeEvent::ContactUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.employee_id) {
                    rm.phone = e.contact.phone;
                    self.store.upsert(tenant_id, e.employee_id, rm);
                }
            }
            EmployeeEvent::EmployeeTerminated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.employee_id) {
                    rm.status = EmployeeStatus::Terminated;
                    self.store.upsert(tenant_id, e.employee_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
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

    use hrims_people::{ContactInfo, EmployeeRegistered, SystemAccessActivated};

    use crate::read_model::InMemoryTenantStore;

    fn registered(tenant_id: TenantId, employee_id: EmployeeId, name: (&str, &str)) -> EmployeeEvent {
        EmployeeEvent::EmployeeRegistered(EmployeeRegistered {
            tenant_id,
            employee_id,
            first_name: name.0.to_string(),
            last_name: name.1.to_string(),
            email: format!("{}@example.com", name.0.to_lowercase()),
            contact: ContactInfo::default(),
            contract_type: ContractType::Permanent,
            department_id: None,
            position_id: None,
            grade_id: None,
            occurred_at: Utc::now(),
        })
    }

    fn envelope(
        tenant_id: TenantId,
        employee_id: EmployeeId,
        seq: u64,
        event: &EmployeeEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            employee_id.0,
            "people.employee",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn projection() -> EmployeeDirectoryProjection<InMemoryTenantStore<EmployeeId, EmployeeReadModel>>
    {
        EmployeeDirectoryProjection::new(InMemoryTenantStore::new())
    }

    #[test]
    fn registered_event_creates_read_model() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let employee_id = EmployeeId::new(AggregateId::new());
        let event = registered(tenant_id, employee_id, ("Amina", "Yusuf"));

        projection
            .apply_envelope(&envelope(tenant_id, employee_id, 1, &event))
            .unwrap();

        let rm = projection.get(tenant_id, &employee_id).unwrap();
        assert_eq!(rm.full_name(), "Amina Yusuf");
        assert_eq!(rm.registration, RegistrationStatus::Registered);
        assert_eq!(rm.system_username, None);
    }

    #[test]
    fn onboarding_view_tracks_access_activation() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let employee_id = EmployeeId::new(AggregateId::new());

        let event = registered(tenant_id, employee_id, ("Amina", "Yusuf"));
        projection
            .apply_envelope(&envelope(tenant_id, employee_id, 1, &event))
            .unwrap();

        let event = EmployeeEvent::SystemAccessActivated(SystemAccessActivated {
            tenant_id,
            employee_id,
            system_username: "amina".to_string(),
            system_role: "employee".to_string(),
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&envelope(tenant_id, employee_id, 2, &event))
            .unwrap();

        let onboarding = projection.onboarding(tenant_id, &employee_id).unwrap();
        assert_eq!(onboarding.registration, RegistrationStatus::AccessActive);
        assert_eq!(onboarding.system_username.as_deref(), Some("amina"));
    }

    #[test]
    fn replays_are_ignored() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let employee_id = EmployeeId::new(AggregateId::new());
        let event = registered(tenant_id, employee_id, ("Amina", "Yusuf"));
        let env = envelope(tenant_id, employee_id, 1, &event);

        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();

        assert_eq!(projection.list(tenant_id).len(), 1);
    }

    #[test]
    fn sequence_gaps_are_rejected() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let employee_id = EmployeeId::new(AggregateId::new());

        let event = registered(tenant_id, employee_id, ("Amina", "Yusuf"));
        projection
            .apply_envelope(&envelope(tenant_id, employee_id, 1, &event))
            .unwrap();

        let event = EmployeeEvent::ProfileVerified(hrims_people::ProfileVerified {
            tenant_id,
            employee_id,
            occurred_at: Utc::now(),
        });
        let err = projection
            .apply_envelope(&envelope(tenant_id, employee_id, 3, &event))
            .unwrap_err();
        match err {
            ProjectionError::NonMonotonicSequence { last: 1, found: 3 } => {}
            _ => panic!("Expected NonMonotonicSequence error"),
        }
    }

    #[test]
    fn mismatched_event_tenant_is_rejected() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let employee_id = EmployeeId::new(AggregateId::new());
        let event = registered(TenantId::new(), employee_id, ("Amina", "Yusuf"));

        let err = projection
            .apply_envelope(&envelope(tenant_id, employee_id, 1, &event))
            .unwrap_err();
        match err {
            ProjectionError::TenantIsolation(_) => {}
            _ => panic!("Expected TenantIsolation error"),
        }
    }

    #[test]
    fn search_matches_full_name_case_insensitively() {
        let projection = projection();
        let tenant_id = TenantId::new();

        let first = EmployeeId::new(AggregateId::new());
        let event = registered(tenant_id, first, ("Amina", "Yusuf"));
        projection
            .apply_envelope(&envelope(tenant_id, first, 1, &event))
            .unwrap();

        let second = EmployeeId::new(AggregateId::new());
        let event = registered(tenant_id, second, ("Brian", "Otieno"));
        projection
            .apply_envelope(&envelope(tenant_id, second, 1, &event))
            .unwrap();

        let hits = projection.search_by_name(tenant_id, "yus");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].employee_id, first);

        let hits = projection.search_by_name(tenant_id, "AMINA YUS");
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn rebuild_replays_out_of_order_envelopes() {
        let projection = projection();
        let tenant_id = TenantId::new();
        let employee_id = EmployeeId::new(AggregateId::new());

        let registered_event = registered(tenant_id, employee_id, ("Amina", "Yusuf"));
        let activated_event = EmployeeEvent::SystemAccessActivated(SystemAccessActivated {
            tenant_id,
            employee_id,
            system_username: "amina".to_string(),
            system_role: "employee".to_string(),
            occurred_at: Utc::now(),
        });

        projection
            .rebuild_from_scratch(vec![
                envelope(tenant_id, employee_id, 2, &activated_event),
                envelope(tenant_id, employee_id, 1, &registered_event),
            ])
            .unwrap();

        let rm = projection.get(tenant_id, &employee_id).unwrap();
        assert_eq!(rm.registration, RegistrationStatus::AccessActive);
    }
}
