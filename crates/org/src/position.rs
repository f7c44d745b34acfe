use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hrims_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use hrims_events::Event;

use crate::department::DepartmentId;
use crate::grade::GradeId;

/// Position identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub AggregateId);

impl PositionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PositionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Organizational role flags carried by a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFlags {
    pub is_supervisor: bool,
    pub is_manager: bool,
    pub is_director: bool,
    pub is_head_of_department: bool,
}

/// Aggregate root: Position.
///
/// Tracks headcount capacity. `currently_filled <= number_of_positions`
/// holds at all times; available headcount is derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    id: PositionId,
    tenant_id: Option<TenantId>,
    title: String,
    code: String,
    department_id: Option<DepartmentId>,
    grade_id: Option<GradeId>,
    reports_to: Option<PositionId>,
    flags: RoleFlags,
    number_of_positions: u32,
    currently_filled: u32,
    version: u64,
    created: bool,
}

impl Position {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PositionId) -> Self {
        Self {
            id,
            tenant_id: None,
            title: String::new(),
            code: String::new(),
            department_id: None,
            grade_id: None,
            reports_to: None,
            flags: RoleFlags::default(),
            number_of_positions: 0,
            currently_filled: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PositionId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn department_id(&self) -> Option<DepartmentId> {
        self.department_id
    }

    pub fn grade_id(&self) -> Option<GradeId> {
        self.grade_id
    }

    pub fn reports_to(&self) -> Option<PositionId> {
        self.reports_to
    }

    pub fn flags(&self) -> RoleFlags {
        self.flags
    }

    pub fn number_of_positions(&self) -> u32 {
        self.number_of_positions
    }

    pub fn currently_filled(&self) -> u32 {
        self.currently_filled
    }

    /// Derived headcount still open on this position.
    pub fn available(&self) -> u32 {
        self.number_of_positions - self.currently_filled
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

    fn ensure_position_id(&self, position_id: PositionId) -> Result<(), DomainError> {
        if self.id != position_id {
            return Err(DomainError::invariant("position_id mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for Position {
    type Id = PositionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePosition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePosition {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub title: String,
    pub code: String,
    pub department_id: Option<DepartmentId>,
    pub grade_id: Option<GradeId>,
    pub reports_to: Option<PositionId>,
    pub flags: Option<RoleFlags>,
    pub number_of_positions: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdatePosition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePosition {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    /// Optional new title (if None, keep existing).
    pub title: Option<String>,
    /// Optional new reporting line (if None, keep existing).
    pub reports_to: Option<PositionId>,
    /// Optional new role flags (if None, keep existing).
    pub flags: Option<RoleFlags>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FillPosition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillPosition {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub employee_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VacatePosition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacatePosition {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub employee_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResizePosition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizePosition {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub number_of_positions: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionCommand {
    CreatePosition(CreatePosition),
    UpdatePosition(UpdatePosition),
    FillPosition(FillPosition),
    VacatePosition(VacatePosition),
    ResizePosition(ResizePosition),
}

/// Event: PositionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCreated {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub title: String,
    pub code: String,
    pub department_id: Option<DepartmentId>,
    pub grade_id: Option<GradeId>,
    pub reports_to: Option<PositionId>,
    pub flags: RoleFlags,
    pub number_of_positions: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PositionUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdated {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub title: String,
    pub reports_to: Option<PositionId>,
    pub flags: RoleFlags,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PositionFilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFilled {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub employee_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PositionVacated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionVacated {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub employee_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PositionResized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResized {
    pub tenant_id: TenantId,
    pub position_id: PositionId,
    pub number_of_positions: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionEvent {
    PositionCreated(PositionCreated),
    PositionUpdated(PositionUpdated),
    PositionFilled(PositionFilled),
    PositionVacated(PositionVacated),
    PositionResized(PositionResized),
}

impl Event for PositionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PositionEvent::PositionCreated(_) => "org.position.created",
            PositionEvent::PositionUpdated(_) => "org.position.updated",
            PositionEvent::PositionFilled(_) => "org.position.filled",
            PositionEvent::PositionVacated(_) => "org.position.vacated",
            PositionEvent::PositionResized(_) => "org.position.resized",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PositionEvent::PositionCreated(e) => e.occurred_at,
            PositionEvent::PositionUpdated(e) => e.occurred_at,
            PositionEvent::PositionFilled(e) => e.occurred_at,
            PositionEvent::PositionVacated(e) => e.occurred_at,
            PositionEvent::PositionResized(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Position {
    type Command = PositionCommand;
    type Event = PositionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PositionEvent::PositionCreated(e) => {
                self.id = e.position_id;
                self.tenant_id = Some(e.tenant_id);
                self.title = e.title.clone();
                self.code = e.code.clone();
                self.department_id = e.department_id;
                self.grade_id = e.grade_id;
                self.reports_to = e.reports_to;
                self.flags = e.flags;
                self.number_of_positions = e.number_of_positions;
                self.currently_filled = 0;
                self.created = true;
            }
            PositionEvent::PositionUpdated(e) => {
                self.title = e.title.clone();
                self.reports_to = e.reports_to;
                self.flags = e.flags;
            }
            PositionEvent::PositionFilled(_) => {
                self.currently_filled += 1;
            }
            PositionEvent::PositionVacated(_) => {
                self.currently_filled = self.currently_filled.saturating_sub(1);
            }
            PositionEvent::PositionResized(e) => {
                self.number_of_positions = e.number_of_positions;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PositionCommand::CreatePosition(cmd) => self.handle_create(cmd),
            PositionCommand::UpdatePosition(cmd) => self.handle_update(cmd),
            PositionCommand::FillPosition(cmd) => self.handle_fill(cmd),
            PositionCommand::VacatePosition(cmd) => self.handle_vacate(cmd),
            PositionCommand::ResizePosition(cmd) => self.handle_resize(cmd),
        }
    }
}

impl Position {
    fn handle_create(&self, cmd: &CreatePosition) -> Result<Vec<PositionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("position already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        if cmd.number_of_positions == 0 {
            return Err(DomainError::validation(
                "number of positions must be at least 1",
            ));
        }
        if cmd.reports_to == Some(cmd.position_id) {
            return Err(DomainError::invariant("position cannot report to itself"));
        }

        Ok(vec![PositionEvent::PositionCreated(PositionCreated {
            tenant_id: cmd.tenant_id,
            position_id: cmd.position_id,
            title: cmd.title.clone(),
            code: cmd.code.clone(),
            department_id: cmd.department_id,
            grade_id: cmd.grade_id,
            reports_to: cmd.reports_to,
            flags: cmd.flags.unwrap_or_default(),
            number_of_positions: cmd.number_of_positions,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdatePosition) -> Result<Vec<PositionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_position_id(cmd.position_id)?;

        let title = cmd.title.clone().unwrap_or_else(|| self.title.clone());
        if title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        let reports_to = cmd.reports_to.or(self.reports_to);
        if reports_to == Some(cmd.position_id) {
            return Err(DomainError::invariant("position cannot report to itself"));
        }

        Ok(vec![PositionEvent::PositionUpdated(PositionUpdated {
            tenant_id: cmd.tenant_id,
            position_id: cmd.position_id,
            title,
            reports_to,
            flags: cmd.flags.unwrap_or(self.flags),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fill(&self, cmd: &FillPosition) -> Result<Vec<PositionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_position_id(cmd.position_id)?;

        if self.currently_filled >= self.number_of_positions {
            return Err(DomainError::conflict("position has no open headcount"));
        }

        Ok(vec![PositionEvent::PositionFilled(PositionFilled {
            tenant_id: cmd.tenant_id,
            position_id: cmd.position_id,
            employee_id: cmd.employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_vacate(&self, cmd: &VacatePosition) -> Result<Vec<PositionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_position_id(cmd.position_id)?;

        if self.currently_filled == 0 {
            return Err(DomainError::conflict("position has no filled seats"));
        }

        Ok(vec![PositionEvent::PositionVacated(PositionVacated {
            tenant_id: cmd.tenant_id,
            position_id: cmd.position_id,
            employee_id: cmd.employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_resize(&self, cmd: &ResizePosition) -> Result<Vec<PositionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_position_id(cmd.position_id)?;

        if cmd.number_of_positions == 0 {
            return Err(DomainError::validation(
                "number of positions must be at least 1",
            ));
        }
        if cmd.number_of_positions < self.currently_filled {
            return Err(DomainError::invariant(
                "capacity cannot drop below filled headcount",
            ));
        }

        Ok(vec![PositionEvent::PositionResized(PositionResized {
            tenant_id: cmd.tenant_id,
            position_id: cmd.position_id,
            number_of_positions: cmd.number_of_positions,
            occurred_at: cmd.occurred_at,
        })])
    }
}
