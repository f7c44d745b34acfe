use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hrims_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use hrims_events::Event;

/// Grade identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeId(pub AggregateId);

impl GradeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GradeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Broad classification a grade belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    Junior,
    Operational,
    Supervisory,
    Managerial,
    Executive,
}

/// Salary structure for a grade. All amounts are integer cents.
///
/// Invariant: `basic_min <= basic_mid <= basic_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationStructure {
    pub basic_min: u64,
    pub basic_mid: u64,
    pub basic_max: u64,
    pub house_allowance: u64,
    pub car_allowance: u64,
    pub travel_allowance: u64,
    /// Overtime multiplier in percent (e.g. 150 for time-and-a-half).
    pub overtime_multiplier_pct: u32,
}

impl CompensationStructure {
    fn validate(&self) -> Result<(), DomainError> {
        if self.basic_min > self.basic_mid || self.basic_mid > self.basic_max {
            return Err(DomainError::invariant(
                "basic salary must satisfy min <= mid <= max",
            ));
        }
        Ok(())
    }
}

/// Benefit limits for a grade. Read verbatim by the loans layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeLimits {
    /// Largest loan principal a member of this grade may apply for, in cents.
    pub max_loan_amount: u64,
    /// Approval level required for this grade's loan applications.
    pub required_approval_level: u32,
}

/// Aggregate root: Grade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    id: GradeId,
    tenant_id: Option<TenantId>,
    code: String,
    level: u32,
    band: GradeBand,
    compensation: CompensationStructure,
    limits: GradeLimits,
    version: u64,
    created: bool,
}

impl Grade {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: GradeId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            level: 0,
            band: GradeBand::Junior,
            compensation: CompensationStructure {
                basic_min: 0,
                basic_mid: 0,
                basic_max: 0,
                house_allowance: 0,
                car_allowance: 0,
                travel_allowance: 0,
                overtime_multiplier_pct: 100,
            },
            limits: GradeLimits {
                max_loan_amount: 0,
                required_approval_level: 1,
            },
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GradeId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn band(&self) -> GradeBand {
        self.band
    }

    pub fn compensation(&self) -> &CompensationStructure {
        &self.compensation
    }

    pub fn limits(&self) -> &GradeLimits {
        &self.limits
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

    fn ensure_grade_id(&self, grade_id: GradeId) -> Result<(), DomainError> {
        if self.id != grade_id {
            return Err(DomainError::invariant("grade_id mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for Grade {
    type Id = GradeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateGrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGrade {
    pub tenant_id: TenantId,
    pub grade_id: GradeId,
    pub code: String,
    pub level: u32,
    pub band: GradeBand,
    pub compensation: CompensationStructure,
    pub limits: GradeLimits,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateCompensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCompensation {
    pub tenant_id: TenantId,
    pub grade_id: GradeId,
    pub compensation: CompensationStructure,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLimits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLimits {
    pub tenant_id: TenantId,
    pub grade_id: GradeId,
    pub limits: GradeLimits,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeCommand {
    CreateGrade(CreateGrade),
    UpdateCompensation(UpdateCompensation),
    UpdateLimits(UpdateLimits),
}

/// Event: GradeCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeCreated {
    pub tenant_id: TenantId,
    pub grade_id: GradeId,
    pub code: String,
    pub level: u32,
    pub band: GradeBand,
    pub compensation: CompensationStructure,
    pub limits: GradeLimits,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CompensationUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationUpdated {
    pub tenant_id: TenantId,
    pub grade_id: GradeId,
    pub compensation: CompensationStructure,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LimitsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsUpdated {
    pub tenant_id: TenantId,
    pub grade_id: GradeId,
    pub limits: GradeLimits,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeEvent {
    GradeCreated(GradeCreated),
    CompensationUpdated(CompensationUpdated),
    LimitsUpdated(LimitsUpdated),
}

impl Event for GradeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GradeEvent::GradeCreated(_) => "org.grade.created",
            GradeEvent::CompensationUpdated(_) => "org.grade.compensation_updated",
            GradeEvent::LimitsUpdated(_) => "org.grade.limits_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GradeEvent::GradeCreated(e) => e.occurred_at,
            GradeEvent::CompensationUpdated(e) => e.occurred_at,
            GradeEvent::LimitsUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Grade {
    type Command = GradeCommand;
    type Event = GradeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GradeEvent::GradeCreated(e) => {
                self.id = e.grade_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.level = e.level;
                self.band = e.band;
                self.compensation = e.compensation;
                self.limits = e.limits;
                self.created = true;
            }
            GradeEvent::CompensationUpdated(e) => {
                self.compensation = e.compensation;
            }
            GradeEvent::LimitsUpdated(e) => {
                self.limits = e.limits;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GradeCommand::CreateGrade(cmd) => self.handle_create(cmd),
            GradeCommand::UpdateCompensation(cmd) => self.handle_update_compensation(cmd),
            GradeCommand::UpdateLimits(cmd) => self.handle_update_limits(cmd),
        }
    }
}

impl Grade {
    fn handle_create(&self, cmd: &CreateGrade) -> Result<Vec<GradeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("grade already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        cmd.compensation.validate()?;

        Ok(vec![GradeEvent::GradeCreated(GradeCreated {
            tenant_id: cmd.tenant_id,
            grade_id: cmd.grade_id,
            code: cmd.code.clone(),
            level: cmd.level,
            band: cmd.band,
            compensation: cmd.compensation,
            limits: cmd.limits,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_compensation(
        &self,
        cmd: &UpdateCompensation,
    ) -> Result<Vec<GradeEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_grade_id(cmd.grade_id)?;
        cmd.compensation.validate()?;

        Ok(vec![GradeEvent::CompensationUpdated(CompensationUpdated {
            tenant_id: cmd.tenant_id,
            grade_id: cmd.grade_id,
            compensation: cmd.compensation,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_limits(&self, cmd: &UpdateLimits) -> Result<Vec<GradeEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_grade_id(cmd.grade_id)?;

        Ok(vec![GradeEvent::LimitsUpdated(LimitsUpdated {
            tenant_id: cmd.tenant_id,
            grade_id: cmd.grade_id,
            limits: cmd.limits,
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

    fn test_grade_id() -> GradeId {
        GradeId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_compensation() -> CompensationStructure {
        CompensationStructure {
            basic_min: 4_000_000,
            basic_mid: 5_000_000,
            basic_max: 6_000_000,
            house_allowance: 1_500_000,
            car_allowance: 800_000,
            travel_allowance: 500_000,
            overtime_multiplier_pct: 150,
        }
    }

    fn test_limits() -> GradeLimits {
        GradeLimits {
            max_loan_amount: 20_000_000,
            required_approval_level: 2,
        }
    }

    fn created_grade(tenant_id: TenantId, grade_id: GradeId) -> Grade {
        let mut grade = Grade::empty(grade_id);
        let events = grade
            .handle(&GradeCommand::CreateGrade(CreateGrade {
                tenant_id,
                grade_id,
                code: "G5".to_string(),
                level: 5,
                band: GradeBand::Supervisory,
                compensation: test_compensation(),
                limits: test_limits(),
                occurred_at: test_time(),
            }))
            .unwrap();
        grade.apply(&events[0]);
        grade
    }

    #[test]
    fn create_grade_records_structures() {
        let tenant_id = test_tenant_id();
        let grade_id = test_grade_id();
        let grade = created_grade(tenant_id, grade_id);

        assert_eq!(grade.code(), "G5");
        assert_eq!(grade.level(), 5);
        assert_eq!(grade.band(), GradeBand::Supervisory);
        assert_eq!(grade.compensation(), &test_compensation());
        assert_eq!(grade.limits(), &test_limits());
    }

    #[test]
    fn create_grade_rejects_unordered_salary_band() {
        let grade = Grade::empty(test_grade_id());
        let mut compensation = test_compensation();
        compensation.basic_mid = compensation.basic_max + 1;

        let err = grade
            .handle(&GradeCommand::CreateGrade(CreateGrade {
                tenant_id: test_tenant_id(),
                grade_id: test_grade_id(),
                code: "G1".to_string(),
                level: 1,
                band: GradeBand::Junior,
                compensation,
                limits: test_limits(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation for unordered salary band"),
        }
    }

    #[test]
    fn update_compensation_revalidates_ordering() {
        let tenant_id = test_tenant_id();
        let grade_id = test_grade_id();
        let mut grade = created_grade(tenant_id, grade_id);

        let mut compensation = test_compensation();
        compensation.basic_min = 4_500_000;
        let events = grade
            .handle(&GradeCommand::UpdateCompensation(UpdateCompensation {
                tenant_id,
                grade_id,
                compensation,
                occurred_at: test_time(),
            }))
            .unwrap();
        grade.apply(&events[0]);
        assert_eq!(grade.compensation().basic_min, 4_500_000);

        compensation.basic_min = 7_000_000;
        let err = grade
            .handle(&GradeCommand::UpdateCompensation(UpdateCompensation {
                tenant_id,
                grade_id,
                compensation,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation for unordered salary band"),
        }
    }

    #[test]
    fn update_limits_replaces_limits() {
        let tenant_id = test_tenant_id();
        let grade_id = test_grade_id();
        let mut grade = created_grade(tenant_id, grade_id);

        let limits = GradeLimits {
            max_loan_amount: 50_000_000,
            required_approval_level: 3,
        };
        let events = grade
            .handle(&GradeCommand::UpdateLimits(UpdateLimits {
                tenant_id,
                grade_id,
                limits,
                occurred_at: test_time(),
            }))
            .unwrap();
        grade.apply(&events[0]);

        assert_eq!(grade.limits(), &limits);
    }

    #[test]
    fn update_missing_grade_is_not_found() {
        let grade = Grade::empty(test_grade_id());
        let err = grade
            .handle(&GradeCommand::UpdateLimits(UpdateLimits {
                tenant_id: test_tenant_id(),
                grade_id: test_grade_id(),
                limits: test_limits(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::NotFound => {}
            _ => panic!("Expected NotFound for non-existent grade"),
        }
    }
}
