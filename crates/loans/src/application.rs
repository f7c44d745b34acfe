use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hrims_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use hrims_events::Event;
use hrims_payroll::{RepaymentTerms, amortize};

/// Loan application identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanApplicationId(pub AggregateId);

impl LoanApplicationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LoanApplicationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Loan workflow status. Advanced only by explicit commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Disbursed,
    Defaulted,
    Cancelled,
}

impl LoanStatus {
    /// Cancellation is only allowed before a decision is made.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            LoanStatus::Draft | LoanStatus::Submitted | LoanStatus::UnderReview
        )
    }
}

/// Aggregate root: LoanApplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanApplication {
    id: LoanApplicationId,
    tenant_id: Option<TenantId>,
    employee_id: Option<AggregateId>,
    loan_type: String,
    principal: u64,
    /// Annual interest rate in basis points.
    annual_rate_bps: u32,
    term_months: u32,
    terms: Option<RepaymentTerms>,
    status: LoanStatus,
    version: u64,
    created: bool,
}

impl LoanApplication {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: LoanApplicationId) -> Self {
        Self {
            id,
            tenant_id: None,
            employee_id: None,
            loan_type: String::new(),
            principal: 0,
            annual_rate_bps: 0,
            term_months: 0,
            terms: None,
            status: LoanStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LoanApplicationId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn employee_id(&self) -> Option<AggregateId> {
        self.employee_id
    }

    pub fn loan_type(&self) -> &str {
        &self.loan_type
    }

    pub fn principal(&self) -> u64 {
        self.principal
    }

    pub fn annual_rate_bps(&self) -> u32 {
        self.annual_rate_bps
    }

    pub fn term_months(&self) -> u32 {
        self.term_months
    }

    pub fn terms(&self) -> Option<&RepaymentTerms> {
        self.terms.as_ref()
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_application_id(&self, application_id: LoanApplicationId) -> Result<(), DomainError> {
        if self.id != application_id {
            return Err(DomainError::invariant("application_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: LoanStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::conflict(format!(
                "cannot {action} an application in its current status"
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for LoanApplication {
    type Id = LoanApplicationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenApplication. Computes repayment terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenApplication {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub employee_id: AggregateId,
    pub loan_type: String,
    pub principal: u64,
    pub annual_rate_bps: u32,
    pub term_months: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitApplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitApplication {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartReview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReview {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub reviewer_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveApplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveApplication {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub approver_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectApplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectApplication {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub reviewer_id: AggregateId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DisburseLoan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisburseLoan {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelApplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelApplication {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDefaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDefaulted {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanCommand {
    OpenApplication(OpenApplication),
    SubmitApplication(SubmitApplication),
    StartReview(StartReview),
    ApproveApplication(ApproveApplication),
    RejectApplication(RejectApplication),
    DisburseLoan(DisburseLoan),
    CancelApplication(CancelApplication),
    MarkDefaulted(MarkDefaulted),
}

/// Event: ApplicationOpened. Carries the computed repayment terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationOpened {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub employee_id: AggregateId,
    pub loan_type: String,
    pub principal: u64,
    pub annual_rate_bps: u32,
    pub term_months: u32,
    pub terms: RepaymentTerms,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ApplicationSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmitted {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReviewStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStarted {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub reviewer_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ApplicationApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationApproved {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub approver_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ApplicationRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRejected {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub reviewer_id: AggregateId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoanDisbursed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDisbursed {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ApplicationCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationCancelled {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoanDefaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDefaulted {
    pub tenant_id: TenantId,
    pub application_id: LoanApplicationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanEvent {
    ApplicationOpened(ApplicationOpened),
    ApplicationSubmitted(ApplicationSubmitted),
    ReviewStarted(ReviewStarted),
    ApplicationApproved(ApplicationApproved),
    ApplicationRejected(ApplicationRejected),
    LoanDisbursed(LoanDisbursed),
    ApplicationCancelled(ApplicationCancelled),
    LoanDefaulted(LoanDefaulted),
}

impl Event for LoanEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoanEvent::ApplicationOpened(_) => "loans.application.opened",
            LoanEvent::ApplicationSubmitted(_) => "loans.application.submitted",
            LoanEvent::ReviewStarted(_) => "loans.application.review_started",
            LoanEvent::ApplicationApproved(_) => "loans.application.approved",
            LoanEvent::ApplicationRejected(_) => "loans.application.rejected",
            LoanEvent::LoanDisbursed(_) => "loans.application.disbursed",
            LoanEvent::ApplicationCancelled(_) => "loans.application.cancelled",
            LoanEvent::LoanDefaulted(_) => "loans.application.defaulted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LoanEvent::ApplicationOpened(e) => e.occurred_at,
            LoanEvent::ApplicationSubmitted(e) => e.occurred_at,
            LoanEvent::ReviewStarted(e) => e.occurred_at,
            LoanEvent::ApplicationApproved(e) => e.occurred_at,
            LoanEvent::ApplicationRejected(e) => e.occurred_at,
            LoanEvent::LoanDisbursed(e) => e.occurred_at,
            LoanEvent::ApplicationCancelled(e) => e.occurred_at,
            LoanEvent::LoanDefaulted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for LoanApplication {
    type Command = LoanCommand;
    type Event = LoanEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LoanEvent::ApplicationOpened(e) => {
                self.id = e.application_id;
                self.tenant_id = Some(e.tenant_id);
                self.employee_id = Some(e.employee_id);
                self.loan_type = e.loan_type.clone();
                self.principal = e.principal;
                self.annual_rate_bps = e.annual_rate_bps;
                self.term_months = e.term_months;
                self.terms = Some(e.terms);
                self.status = LoanStatus::Draft;
                self.created = true;
            }
            LoanEvent::ApplicationSubmitted(_) => {
                self.status = LoanStatus::Submitted;
            }
            LoanEvent::ReviewStarted(_) => {
                self.status = LoanStatus::UnderReview;
            }
            LoanEvent::ApplicationApproved(_) => {
                self.status = LoanStatus::Approved;
            }
            LoanEvent::ApplicationRejected(_) => {
                self.status = LoanStatus::Rejected;
            }
            LoanEvent::LoanDisbursed(_) => {
                self.status = LoanStatus::Disbursed;
            }
            LoanEvent::ApplicationCancelled(_) => {
                self.status = LoanStatus::Cancelled;
            }
            LoanEvent::LoanDefaulted(_) => {
                self.status = LoanStatus::Defaulted;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LoanCommand::OpenApplication(cmd) => self.handle_open(cmd),
            LoanCommand::SubmitApplication(cmd) => self.handle_submit(cmd),
            LoanCommand::StartReview(cmd) => self.handle_start_review(cmd),
            LoanCommand::ApproveApplication(cmd) => self.handle_approve(cmd),
            LoanCommand::RejectApplication(cmd) => self.handle_reject(cmd),
            LoanCommand::DisburseLoan(cmd) => self.handle_disburse(cmd),
            LoanCommand::CancelApplication(cmd) => self.handle_cancel(cmd),
            LoanCommand::MarkDefaulted(cmd) => self.handle_default(cmd),
        }
    }
}

impl LoanApplication {
    fn handle_open(&self, cmd: &OpenApplication) -> Result<Vec<LoanEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("application already exists"));
        }
        if cmd.loan_type.trim().is_empty() {
            return Err(DomainError::validation("loan type cannot be empty"));
        }

        let terms = amortize(
            cmd.principal,
            cmd.annual_rate_bps as f64 / 100.0,
            cmd.term_months,
        )?;

        Ok(vec![LoanEvent::ApplicationOpened(ApplicationOpened {
            tenant_id: cmd.tenant_id,
            application_id: cmd.application_id,
            employee_id: cmd.employee_id,
            loan_type: cmd.loan_type.clone(),
            principal: cmd.principal,
            annual_rate_bps: cmd.annual_rate_bps,
            term_months: cmd.term_months,
            terms,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitApplication) -> Result<Vec<LoanEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_application_id(cmd.application_id)?;
        self.ensure_status(LoanStatus::Draft, "submit")?;

        Ok(vec![LoanEvent::ApplicationSubmitted(ApplicationSubmitted {
            tenant_id: cmd.tenant_id,
            application_id: cmd.application_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_review(&self, cmd: &StartReview) -> Result<Vec<LoanEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_application_id(cmd.application_id)?;
        self.ensure_status(LoanStatus::Submitted, "review")?;

        Ok(vec![LoanEvent::ReviewStarted(ReviewStarted {
            tenant_id: cmd.tenant_id,
            application_id: cmd.application_id,
            reviewer_id: cmd.reviewer_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveApplication) -> Result<Vec<LoanEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_application_id(cmd.application_id)?;
        self.ensure_status(LoanStatus::UnderReview, "approve")?;

        Ok(vec![LoanEvent::ApplicationApproved(ApplicationApproved {
            tenant_id: cmd.tenant_id,
            application_id: cmd.application_id,
            approver_id: cmd.approver_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectApplication) -> Result<Vec<LoanEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_application_id(cmd.application_id)?;
        self.ensure_status(LoanStatus::UnderReview, "reject")?;

        Ok(vec![LoanEvent::ApplicationRejected(ApplicationRejected {
            tenant_id: cmd.tenant_id,
            application_id: cmd.application_id,
            reviewer_id: cmd.reviewer_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_disburse(&self, cmd: &DisburseLoan) -> Result<Vec<LoanEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_application_id(cmd.application_id)?;
        self.ensure_status(LoanStatus::Approved, "disburse")?;

        Ok(vec![LoanEvent::LoanDisbursed(LoanDisbursed {
            tenant_id: cmd.tenant_id,
            application_id: cmd.application_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelApplication) -> Result<Vec<LoanEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_application_id(cmd.application_id)?;

        if !self.status.is_cancellable() {
            return Err(DomainError::conflict(
                "cannot cancel an application after a decision",
            ));
        }

        Ok(vec![LoanEvent::ApplicationCancelled(ApplicationCancelled {
            tenant_id: cmd.tenant_id,
            application_id: cmd.application_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_default(&self, cmd: &MarkDefaulted) -> Result<Vec<LoanEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_application_id(cmd.application_id)?;
        self.ensure_status(LoanStatus::Disbursed, "default")?;

        Ok(vec![LoanEvent::LoanDefaulted(LoanDefaulted {
            tenant_id: cmd.tenant_id,
            application_id: cmd.application_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrims_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_application_id() -> LoanApplicationId {
        LoanApplicationId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn open_cmd(tenant_id: TenantId, application_id: LoanApplicationId) -> OpenApplication {
        OpenApplication {
            tenant_id,
            application_id,
            employee_id: AggregateId::new(),
            loan_type: "personal".to_string(),
            principal: 10_000_000,
            annual_rate_bps: 1_200,
            term_months: 12,
            occurred_at: test_time(),
        }
    }

    fn opened(tenant_id: TenantId, application_id: LoanApplicationId) -> LoanApplication {
        let mut app = LoanApplication::empty(application_id);
        let events = app
            .handle(&LoanCommand::OpenApplication(open_cmd(
                tenant_id,
                application_id,
            )))
            .unwrap();
        app.apply(&events[0]);
        app
    }

    fn advance(app: &mut LoanApplication, cmd: LoanCommand) {
        let events = app.handle(&cmd).unwrap();
        app.apply(&events[0]);
    }

    fn submitted(tenant_id: TenantId, application_id: LoanApplicationId) -> LoanApplication {
        let mut app = opened(tenant_id, application_id);
        advance(
            &mut app,
            LoanCommand::SubmitApplication(SubmitApplication {
                tenant_id,
                application_id,
                occurred_at: test_time(),
            }),
        );
        app
    }

    fn under_review(tenant_id: TenantId, application_id: LoanApplicationId) -> LoanApplication {
        let mut app = submitted(tenant_id, application_id);
        advance(
            &mut app,
            LoanCommand::StartReview(StartReview {
                tenant_id,
                application_id,
                reviewer_id: AggregateId::new(),
                occurred_at: test_time(),
            }),
        );
        app
    }

    #[test]
    fn open_computes_repayment_terms() {
        let tenant_id = test_tenant_id();
        let application_id = test_application_id();
        let app = opened(tenant_id, application_id);

        assert_eq!(app.status(), LoanStatus::Draft);
        let terms = app.terms().unwrap();
        assert_eq!(terms.monthly_payment, 888_488);
        assert_eq!(terms.total_payment, 888_488 * 12);
        assert_eq!(terms.total_interest, terms.total_payment - 10_000_000);
    }

    #[test]
    fn open_rejects_zero_principal() {
        let app = LoanApplication::empty(test_application_id());
        let mut cmd = open_cmd(test_tenant_id(), test_application_id());
        cmd.principal = 0;

        let err = app.handle(&LoanCommand::OpenApplication(cmd)).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero principal"),
        }
    }

    #[test]
    fn reopen_is_a_conflict() {
        let tenant_id = test_tenant_id();
        let application_id = test_application_id();
        let app = opened(tenant_id, application_id);

        let err = app
            .handle(&LoanCommand::OpenApplication(open_cmd(
                tenant_id,
                application_id,
            )))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for re-opening an application"),
        }
    }

    #[test]
    fn happy_path_runs_to_disbursed() {
        let tenant_id = test_tenant_id();
        let application_id = test_application_id();
        let mut app = under_review(tenant_id, application_id);

        advance(
            &mut app,
            LoanCommand::ApproveApplication(ApproveApplication {
                tenant_id,
                application_id,
                approver_id: AggregateId::new(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(app.status(), LoanStatus::Approved);

        advance(
            &mut app,
            LoanCommand::DisburseLoan(DisburseLoan {
                tenant_id,
                application_id,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(app.status(), LoanStatus::Disbursed);

        advance(
            &mut app,
            LoanCommand::MarkDefaulted(MarkDefaulted {
                tenant_id,
                application_id,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(app.status(), LoanStatus::Defaulted);
    }

    #[test]
    fn approve_requires_review() {
        let tenant_id = test_tenant_id();
        let application_id = test_application_id();
        let app = submitted(tenant_id, application_id);

        let err = app
            .handle(&LoanCommand::ApproveApplication(ApproveApplication {
                tenant_id,
                application_id,
                approver_id: AggregateId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for approving before review"),
        }
    }

    #[test]
    fn reject_ends_the_workflow() {
        let tenant_id = test_tenant_id();
        let application_id = test_application_id();
        let mut app = under_review(tenant_id, application_id);

        advance(
            &mut app,
            LoanCommand::RejectApplication(RejectApplication {
                tenant_id,
                application_id,
                reviewer_id: AggregateId::new(),
                reason: Some("Exceeds debt ratio".to_string()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(app.status(), LoanStatus::Rejected);

        let err = app
            .handle(&LoanCommand::DisburseLoan(DisburseLoan {
                tenant_id,
                application_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for disbursing a rejected loan"),
        }
    }

    #[test]
    fn cancel_is_allowed_before_decision_only() {
        let tenant_id = test_tenant_id();
        let application_id = test_application_id();

        for make in [opened, submitted, under_review] {
            let app = make(tenant_id, application_id);
            assert!(app.status().is_cancellable());
            let events = app
                .handle(&LoanCommand::CancelApplication(CancelApplication {
                    tenant_id,
                    application_id,
                    reason: None,
                    occurred_at: test_time(),
                }))
                .unwrap();
            assert_eq!(events.len(), 1);
        }

        let mut app = under_review(tenant_id, application_id);
        advance(
            &mut app,
            LoanCommand::ApproveApplication(ApproveApplication {
                tenant_id,
                application_id,
                approver_id: AggregateId::new(),
                occurred_at: test_time(),
            }),
        );

        let err = app
            .handle(&LoanCommand::CancelApplication(CancelApplication {
                tenant_id,
                application_id,
                reason: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for cancelling an approved loan"),
        }
    }

    #[test]
    fn default_requires_disbursement() {
        let tenant_id = test_tenant_id();
        let application_id = test_application_id();
        let app = under_review(tenant_id, application_id);

        let err = app
            .handle(&LoanCommand::MarkDefaulted(MarkDefaulted {
                tenant_id,
                application_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for defaulting an undisbursed loan"),
        }
    }

    #[test]
    fn terms_are_fixed_at_open() {
        let tenant_id = test_tenant_id();
        let application_id = test_application_id();
        let mut app = opened(tenant_id, application_id);
        let terms = *app.terms().unwrap();

        advance(
            &mut app,
            LoanCommand::SubmitApplication(SubmitApplication {
                tenant_id,
                application_id,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(app.terms(), Some(&terms));
    }
}
