use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hrims_core::{AggregateId, TenantId};
use hrims_events::EventEnvelope;
use hrims_loans::{LoanApplicationId, LoanEvent, LoanStatus};
use hrims_payroll::RepaymentTerms;

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::projections::{CursorDecision, ProjectionError, StreamCursors, sort_for_replay, tenants_in};
use crate::read_model::TenantStore;

/// Queryable loan application read model: the loan book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReadModel {
    pub application_id: LoanApplicationId,
    pub employee_id: AggregateId,
    pub loan_type: String,
    pub principal: u64,
    pub annual_rate_bps: u32,
    pub term_months: u32,
    pub terms: RepaymentTerms,
    pub status: LoanStatus,
    /// Reviewer or approver of the last decision, if any.
    pub decided_by: Option<AggregateId>,
    /// Rejection or cancellation reason, if any.
    pub reason: Option<String>,
}

/// Loan book projection.
pub struct LoanBookProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<LoanApplicationId, LoanReadModel>,
{
    store: S,
    cursors: StreamCursors<C>,
}

impl<S> LoanBookProjection<S>
where
    S: TenantStore<LoanApplicationId, LoanReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::in_memory("loans.book"),
        }
    }

    pub fn with_persistent_cursors<C: ProjectionCursorStore + 'static>(
        self,
        cursor_store: Arc<C>,
    ) -> LoanBookProjection<S, C> {
        LoanBookProjection {
            store: self.store,
            cursors: StreamCursors::persistent(cursor_store, "loans.book"),
        }
    }
}

impl<S, C> LoanBookProjection<S, C>
where
    S: TenantStore<LoanApplicationId, LoanReadModel>,
    C: ProjectionCursorStore + 'static,
{
    pub fn get(
        &self,
        tenant_id: TenantId,
        application_id: &LoanApplicationId,
    ) -> Option<LoanReadModel> {
        self.store.get(tenant_id, application_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<LoanReadModel> {
        self.store.list(tenant_id)
    }

    /// Case-insensitive substring search on the loan type.
    pub fn search_by_name(&self, tenant_id: TenantId, query: &str) -> Vec<LoanReadModel> {
        let q = query.to_lowercase();
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.loan_type.to_lowercase().contains(&q))
            .collect()
    }

    /// All applications opened by one employee.
    pub fn list_for_employee(
        &self,
        tenant_id: TenantId,
        employee_id: AggregateId,
    ) -> Vec<LoanReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.employee_id == employee_id)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "loans.application" {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorDecision::Skip => return Ok(()),
            CursorDecision::Apply => {}
        }

        let event: LoanEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, application_id) = match &event {
            LoanEvent::ApplicationOpened(e) => (e.tenant_id, e.application_id),
            LoanEvent::ApplicationSubmitted(e) => (e.tenant_id, e.application_id),
            LoanEvent::ReviewStarted(e) => (e.tenant_id, e.application_id),
            LoanEvent::ApplicationApproved(e) => (e.tenant_id, e.application_id),
            LoanEvent::ApplicationRejected(e) => (e.tenant_id, e.application_id),
            LoanEvent::LoanDisbursed(e) => (e.tenant_id, e.application_id),
            LoanEvent::ApplicationCancelled(e) => (e.tenant_id, e.application_id),
            LoanEvent::LoanDefaulted(e) => (e.tenant_id, e.application_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if application_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event application_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            LoanEvent::ApplicationOpened(e) => {
                self.store.upsert(
                    tenant_id,
                    e.application_id,
                    LoanReadModel {
                        application_id: e.application_id,
                        employee_id: e.employee_id,
                        loan_type: e.loan_type,
                        principal: e.principal,
                        annual_rate_bps: e.annual_rate_bps,
                        term_months: e.term_months,
                        terms: e.terms,
                        status: LoanStatus::Draft,
                        decided_by: None,
                        reason: None,
                    },
                );
            }
            LoanEvent::ApplicationSubmitted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.application_id) {
                    rm.status = LoanStatus::Submitted;
                    self.store.upsert(tenant_id, e.application_id, rm);
                }
            }
            LoanEvent::ReviewStarted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.application_id) {
                    rm.status = LoanStatus::UnderReview;
                    rm.decided_by = Some(e.reviewer_id);
                    self.store.upsert(tenant_id, e.application_id, rm);
                }
            }
            LoanEvent::ApplicationApproved(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.application_id) {
                    rm.status = LoanStatus::Approved;
                    rm.decided_by = Some(e.approver_id);
                    self.store.upsert(tenant_id, e.application_id, rm);
                }
            }
            LoanEvent::ApplicationRejected(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.application_id) {
                    rm.status = LoanStatus::Rejected;
                    rm.decided_by = Some(e.reviewer_id);
                    rm.reason = e.reason;
                    self.store.upsert(tenant_id, e.application_id, rm);
                }
            }
            LoanEvent::LoanDisbursed(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.application_id) {
                    rm.status = LoanStatus::Disbursed;
                    self.store.upsert(tenant_id, e.application_id, rm);
                }
            }
            LoanEvent::ApplicationCancelled(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.application_id) {
                    rm.status = LoanStatus::Cancelled;
                    rm.reason = e.reason;
                    self.store.upsert(tenant_id, e.application_id, rm);
                }
            }
            LoanEvent::LoanDefaulted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.application_id) {
                    rm.status = LoanStatus::Defaulted;
                    self.store.upsert(tenant_id, e.application_id, rm);
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
