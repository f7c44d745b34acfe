use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hrims_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use hrims_events::Event;

/// Department identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(pub AggregateId);

impl DepartmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DepartmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Department.
///
/// The aggregate enforces that a department never parents itself; cycle
/// detection across the whole hierarchy happens against the read model
/// before a reparent command is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Department {
    id: DepartmentId,
    tenant_id: Option<TenantId>,
    name: String,
    parent_id: Option<DepartmentId>,
    head_employee_id: Option<AggregateId>,
    active: bool,
    version: u64,
    created: bool,
}

impl Department {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DepartmentId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            parent_id: None,
            head_employee_id: None,
            active: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DepartmentId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<DepartmentId> {
        self.parent_id
    }

    pub fn head_employee_id(&self) -> Option<AggregateId> {
        self.head_employee_id
    }

    pub fn is_active(&self) -> bool {
        self.active
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

    fn ensure_department_id(&self, department_id: DepartmentId) -> Result<(), DomainError> {
        if self.id != department_id {
            return Err(DomainError::invariant("department_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.active {
            return Err(DomainError::invariant("department is deactivated"));
        }
        Ok(())
    }
}

impl AggregateRoot for Department {
    type Id = DepartmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDepartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDepartment {
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    pub name: String,
    pub parent_id: Option<DepartmentId>,
    pub head_employee_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDepartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDepartment {
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    /// Optional new name (if None, keep existing).
    pub name: Option<String>,
    /// Optional new head (if None, keep existing).
    pub head_employee_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReparentDepartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReparentDepartment {
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    /// New parent, or None to make the department top-level.
    pub parent_id: Option<DepartmentId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateDepartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateDepartment {
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepartmentCommand {
    CreateDepartment(CreateDepartment),
    UpdateDepartment(UpdateDepartment),
    ReparentDepartment(ReparentDepartment),
    DeactivateDepartment(DeactivateDepartment),
}

/// Event: DepartmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentCreated {
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    pub name: String,
    pub parent_id: Option<DepartmentId>,
    pub head_employee_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DepartmentUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentUpdated {
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    pub name: String,
    pub head_employee_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DepartmentReparented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentReparented {
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    pub parent_id: Option<DepartmentId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DepartmentDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentDeactivated {
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepartmentEvent {
    DepartmentCreated(DepartmentCreated),
    DepartmentUpdated(DepartmentUpdated),
    DepartmentReparented(DepartmentReparented),
    DepartmentDeactivated(DepartmentDeactivated),
}

impl Event for DepartmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DepartmentEvent::DepartmentCreated(_) => "org.department.created",
            DepartmentEvent::DepartmentUpdated(_) => "org.department.updated",
            DepartmentEvent::DepartmentReparented(_) => "org.department.reparented",
            DepartmentEvent::DepartmentDeactivated(_) => "org.department.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DepartmentEvent::DepartmentCreated(e) => e.occurred_at,
            DepartmentEvent::DepartmentUpdated(e) => e.occurred_at,
            DepartmentEvent::DepartmentReparented(e) => e.occurred_at,
            DepartmentEvent::DepartmentDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Department {
    type Command = DepartmentCommand;
    type Event = DepartmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DepartmentEvent::DepartmentCreated(e) => {
                self.id = e.department_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.parent_id = e.parent_id;
                self.head_employee_id = e.head_employee_id;
                self.active = true;
                self.created = true;
            }
            DepartmentEvent::DepartmentUpdated(e) => {
                self.name = e.name.clone();
                self.head_employee_id = e.head_employee_id;
            }
            DepartmentEvent::DepartmentReparented(e) => {
                self.parent_id = e.parent_id;
            }
            DepartmentEvent::DepartmentDeactivated(_) => {
                self.active = false;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DepartmentCommand::CreateDepartment(cmd) => self.handle_create(cmd),
            DepartmentCommand::UpdateDepartment(cmd) => self.handle_update(cmd),
            DepartmentCommand::ReparentDepartment(cmd) => self.handle_reparent(cmd),
            DepartmentCommand::DeactivateDepartment(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl Department {
    fn handle_create(&self, cmd: &CreateDepartment) -> Result<Vec<DepartmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("department already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.parent_id == Some(cmd.department_id) {
            return Err(DomainError::invariant("department cannot parent itself"));
        }

        Ok(vec![DepartmentEvent::DepartmentCreated(DepartmentCreated {
            tenant_id: cmd.tenant_id,
            department_id: cmd.department_id,
            name: cmd.name.clone(),
            parent_id: cmd.parent_id,
            head_employee_id: cmd.head_employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDepartment) -> Result<Vec<DepartmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_department_id(cmd.department_id)?;
        self.ensure_active()?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let head_employee_id = cmd.head_employee_id.or(self.head_employee_id);

        Ok(vec![DepartmentEvent::DepartmentUpdated(DepartmentUpdated {
            tenant_id: cmd.tenant_id,
            department_id: cmd.department_id,
            name,
            head_employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reparent(
        &self,
        cmd: &ReparentDepartment,
    ) -> Result<Vec<DepartmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_department_id(cmd.department_id)?;
        self.ensure_active()?;

        if cmd.parent_id == Some(cmd.department_id) {
            return Err(DomainError::invariant("department cannot parent itself"));
        }

        Ok(vec![DepartmentEvent::DepartmentReparented(
            DepartmentReparented {
                tenant_id: cmd.tenant_id,
                department_id: cmd.department_id,
                parent_id: cmd.parent_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_deactivate(
        &self,
        cmd: &DeactivateDepartment,
    ) -> Result<Vec<DepartmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_department_id(cmd.department_id)?;

        if !self.active {
            return Err(DomainError::conflict("department is already deactivated"));
        }

        Ok(vec![DepartmentEvent::DepartmentDeactivated(
            DepartmentDeactivated {
                tenant_id: cmd.tenant_id,
                department_id: cmd.department_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrims_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_department_id() -> DepartmentId {
        DepartmentId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_department(tenant_id: TenantId, department_id: DepartmentId) -> Department {
        let mut dept = Department::empty(department_id);
        let events = dept
            .handle(&DepartmentCommand::CreateDepartment(CreateDepartment {
                tenant_id,
                department_id,
                name: "Engineering".to_string(),
                parent_id: None,
                head_employee_id: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        dept.apply(&events[0]);
        dept
    }

    #[test]
    fn create_department_starts_active() {
        let tenant_id = test_tenant_id();
        let department_id = test_department_id();
        let dept = created_department(tenant_id, department_id);

        assert_eq!(dept.name(), "Engineering");
        assert_eq!(dept.tenant_id(), Some(tenant_id));
        assert_eq!(dept.parent_id(), None);
        assert!(dept.is_active());
        assert_eq!(dept.version(), 1);
    }

    #[test]
    fn create_department_rejects_self_parent() {
        let department_id = test_department_id();
        let dept = Department::empty(department_id);

        let err = dept
            .handle(&DepartmentCommand::CreateDepartment(CreateDepartment {
                tenant_id: test_tenant_id(),
                department_id,
                name: "Ops".to_string(),
                parent_id: Some(department_id),
                head_employee_id: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation for self-parenting"),
        }
    }

    #[test]
    fn update_department_changes_name_and_head() {
        let tenant_id = test_tenant_id();
        let department_id = test_department_id();
        let mut dept = created_department(tenant_id, department_id);
        let head = AggregateId::new();

        let events = dept
            .handle(&DepartmentCommand::UpdateDepartment(UpdateDepartment {
                tenant_id,
                department_id,
                name: Some("Platform Engineering".to_string()),
                head_employee_id: Some(head),
                occurred_at: test_time(),
            }))
            .unwrap();
        dept.apply(&events[0]);

        assert_eq!(dept.name(), "Platform Engineering");
        assert_eq!(dept.head_employee_id(), Some(head));
    }

    #[test]
    fn reparent_rejects_self_parent() {
        let tenant_id = test_tenant_id();
        let department_id = test_department_id();
        let dept = created_department(tenant_id, department_id);

        let err = dept
            .handle(&DepartmentCommand::ReparentDepartment(ReparentDepartment {
                tenant_id,
                department_id,
                parent_id: Some(department_id),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation for self-parenting"),
        }
    }

    #[test]
    fn reparent_to_none_makes_top_level() {
        let tenant_id = test_tenant_id();
        let department_id = test_department_id();
        let parent_id = test_department_id();
        let mut dept = Department::empty(department_id);

        let events = dept
            .handle(&DepartmentCommand::CreateDepartment(CreateDepartment {
                tenant_id,
                department_id,
                name: "QA".to_string(),
                parent_id: Some(parent_id),
                head_employee_id: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        dept.apply(&events[0]);
        assert_eq!(dept.parent_id(), Some(parent_id));

        let events = dept
            .handle(&DepartmentCommand::ReparentDepartment(ReparentDepartment {
                tenant_id,
                department_id,
                parent_id: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        dept.apply(&events[0]);
        assert_eq!(dept.parent_id(), None);
    }

    #[test]
    fn deactivate_blocks_updates() {
        let tenant_id = test_tenant_id();
        let department_id = test_department_id();
        let mut dept = created_department(tenant_id, department_id);

        let events = dept
            .handle(&DepartmentCommand::DeactivateDepartment(
                DeactivateDepartment {
                    tenant_id,
                    department_id,
                    occurred_at: test_time(),
                },
            ))
            .unwrap();
        dept.apply(&events[0]);
        assert!(!dept.is_active());

        let err = dept
            .handle(&DepartmentCommand::UpdateDepartment(UpdateDepartment {
                tenant_id,
                department_id,
                name: Some("Renamed".to_string()),
                head_employee_id: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation for deactivated department"),
        }

        let err = dept
            .handle(&DepartmentCommand::DeactivateDepartment(
                DeactivateDepartment {
                    tenant_id,
                    department_id,
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for repeated deactivation"),
        }
    }

    #[test]
    fn update_missing_department_is_not_found() {
        let dept = Department::empty(test_department_id());
        let err = dept
            .handle(&DepartmentCommand::UpdateDepartment(UpdateDepartment {
                tenant_id: test_tenant_id(),
                department_id: test_department_id(),
                name: Some("X".to_string()),
                head_employee_id: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::NotFound => {}
            _ => panic!("Expected NotFound for non-existent department"),
        }
    }
}
