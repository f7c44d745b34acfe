use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hrims_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use hrims_events::Event;

/// Employee identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub AggregateId);

impl EmployeeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Employment contract type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Permanent,
    Contract,
    Temporary,
    Intern,
}

/// Employment status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Suspended,
    Terminated,
}

/// Onboarding progression. Strictly linear:
/// registered -> access_active -> verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    AccessActive,
    Verified,
}

/// Contact information for an employee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Aggregate root: Employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    id: EmployeeId,
    tenant_id: Option<TenantId>,
    first_name: String,
    last_name: String,
    email: String,
    contact: ContactInfo,
    contract_type: ContractType,
    department_id: Option<AggregateId>,
    position_id: Option<AggregateId>,
    grade_id: Option<AggregateId>,
    status: EmployeeStatus,
    registration: RegistrationStatus,
    system_username: Option<String>,
    system_role: Option<String>,
    version: u64,
    created: bool,
}

impl Employee {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: EmployeeId) -> Self {
        Self {
            id,
            tenant_id: None,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            contact: ContactInfo::default(),
            contract_type: ContractType::Permanent,
            department_id: None,
            position_id: None,
            grade_id: None,
            status: EmployeeStatus::Active,
            registration: RegistrationStatus::Registered,
            system_username: None,
            system_role: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> EmployeeId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn contract_type(&self) -> ContractType {
        self.contract_type
    }

    pub fn department_id(&self) -> Option<AggregateId> {
        self.department_id
    }

    pub fn position_id(&self) -> Option<AggregateId> {
        self.position_id
    }

    pub fn grade_id(&self) -> Option<AggregateId> {
        self.grade_id
    }

    pub fn status(&self) -> EmployeeStatus {
        self.status
    }

    pub fn registration(&self) -> RegistrationStatus {
        self.registration
    }

    pub fn system_username(&self) -> Option<&str> {
        self.system_username.as_deref()
    }

    pub fn system_role(&self) -> Option<&str> {
        self.system_role.as_deref()
    }

    /// Invariant helper: a granted system account always carries a username.
    pub fn has_system_access(&self) -> bool {
        self.registration != RegistrationStatus::Registered
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

    fn ensure_employee_id(&self, employee_id: EmployeeId) -> Result<(), DomainError> {
        if self.id != employee_id {
            return Err(DomainError::invariant("employee_id mismatch"));
        }
        Ok(())
    }

    fn ensure_not_terminated(&self) -> Result<(), DomainError> {
        if self.status == EmployeeStatus::Terminated {
            return Err(DomainError::invariant("employee is terminated"));
        }
        Ok(())
    }
}

impl AggregateRoot for Employee {
    type Id = EmployeeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterEmployee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterEmployee {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact: Option<ContactInfo>,
    pub contract_type: ContractType,
    pub department_id: Option<AggregateId>,
    pub position_id: Option<AggregateId>,
    pub grade_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateSystemAccess.
///
/// `system_username: None` derives the username from the employee's
/// email local part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateSystemAccess {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub system_username: Option<String>,
    pub system_role: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VerifyProfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyProfile {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateContact {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TerminateEmployee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateEmployee {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    /// Optional human-readable reason for termination.
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeCommand {
    RegisterEmployee(RegisterEmployee),
    ActivateSystemAccess(ActivateSystemAccess),
    VerifyProfile(VerifyProfile),
    UpdateContact(UpdateContact),
    TerminateEmployee(TerminateEmployee),
}

/// Event: EmployeeRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRegistered {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact: ContactInfo,
    pub contract_type: ContractType,
    pub department_id: Option<AggregateId>,
    pub position_id: Option<AggregateId>,
    pub grade_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SystemAccessActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAccessActivated {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub system_username: String,
    pub system_role: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProfileVerified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileVerified {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContactUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdated {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EmployeeTerminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeTerminated {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeEvent {
    EmployeeRegistered(EmployeeRegistered),
    SystemAccessActivated(SystemAccessActivated),
    ProfileVerified(ProfileVerified),
    ContactUpdated(ContactUpdated),
    EmployeeTerminated(EmployeeTerminated),
}

impl Event for EmployeeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EmployeeEvent::EmployeeRegistered(_) => "people.employee.registered",
            EmployeeEvent::SystemAccessActivated(_) => "people.employee.access_activated",
            EmployeeEvent::ProfileVerified(_) => "people.employee.profile_verified",
            EmployeeEvent::ContactUpdated(_) => "people.employee.contact_updated",
            EmployeeEvent::EmployeeTerminated(_) => "people.employee.terminated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EmployeeEvent::EmployeeRegistered(e) => e.occurred_at,
            EmployeeEvent::SystemAccessActivated(e) => e.occurred_at,
            EmployeeEvent::ProfileVerified(e) => e.occurred_at,
            EmployeeEvent::ContactUpdated(e) => e.occurred_at,
            EmployeeEvent::EmployeeTerminated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Employee {
    type Command = EmployeeCommand;
    type Event = EmployeeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EmployeeEvent::EmployeeRegistered(e) => {
                self.id = e.employee_id;
                self.tenant_id = Some(e.tenant_id);
                self.first_name = e.first_name.clone();
                self.last_name = e.last_name.clone();
                self.email = e.email.clone();
                self.contact = e.contact.clone();
                self.contract_type = e.contract_type;
                self.department_id = e.department_id;
                self.position_id = e.position_id;
                self.grade_id = e.grade_id;
                self.status = EmployeeStatus::Active;
                self.registration = RegistrationStatus::Registered;
                self.created = true;
            }
            EmployeeEvent::SystemAccessActivated(e) => {
                self.registration = RegistrationStatus::AccessActive;
                self.system_username = Some(e.system_username.clone());
                self.system_role = Some(e.system_role.clone());
            }
            EmployeeEvent::ProfileVerified(_) => {
                self.registration = RegistrationStatus::Verified;
            }
            EmployeeEvent::ContactUpdated(e) => {
                self.contact = e.contact.clone();
            }
            EmployeeEvent::EmployeeTerminated(_) => {
                self.status = EmployeeStatus::Terminated;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EmployeeCommand::RegisterEmployee(cmd) => self.handle_register(cmd),
            EmployeeCommand::ActivateSystemAccess(cmd) => self.handle_activate(cmd),
            EmployeeCommand::VerifyProfile(cmd) => self.handle_verify(cmd),
            EmployeeCommand::UpdateContact(cmd) => self.handle_update_contact(cmd),
            EmployeeCommand::TerminateEmployee(cmd) => self.handle_terminate(cmd),
        }
    }
}

impl Employee {
    fn handle_register(&self, cmd: &RegisterEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("employee already exists"));
        }

        if cmd.first_name.trim().is_empty() || cmd.last_name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("email must be a valid address"));
        }

        let contact = cmd.contact.clone().unwrap_or_default();

        Ok(vec![EmployeeEvent::EmployeeRegistered(EmployeeRegistered {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            first_name: cmd.first_name.clone(),
            last_name: cmd.last_name.clone(),
            email: cmd.email.clone(),
            contact,
            contract_type: cmd.contract_type,
            department_id: cmd.department_id,
            position_id: cmd.position_id,
            grade_id: cmd.grade_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(
        &self,
        cmd: &ActivateSystemAccess,
    ) -> Result<Vec<EmployeeEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_employee_id(cmd.employee_id)?;
        self.ensure_not_terminated()?;

        // Re-activation is a conflict, not a silent no-op.
        if self.registration != RegistrationStatus::Registered {
            return Err(DomainError::conflict("system access is already active"));
        }

        let system_username = match &cmd.system_username {
            Some(username) => username.clone(),
            None => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        if system_username.trim().is_empty() {
            return Err(DomainError::validation("system username cannot be empty"));
        }
        if cmd.system_role.trim().is_empty() {
            return Err(DomainError::validation("system role cannot be empty"));
        }

        Ok(vec![EmployeeEvent::SystemAccessActivated(
            SystemAccessActivated {
                tenant_id: cmd.tenant_id,
                employee_id: cmd.employee_id,
                system_username,
                system_role: cmd.system_role.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_verify(&self, cmd: &VerifyProfile) -> Result<Vec<EmployeeEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_employee_id(cmd.employee_id)?;
        self.ensure_not_terminated()?;

        match self.registration {
            RegistrationStatus::Registered => Err(DomainError::invariant(
                "system access must be activated before verification",
            )),
            RegistrationStatus::Verified => {
                Err(DomainError::conflict("profile is already verified"))
            }
            RegistrationStatus::AccessActive => {
                Ok(vec![EmployeeEvent::ProfileVerified(ProfileVerified {
                    tenant_id: cmd.tenant_id,
                    employee_id: cmd.employee_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }

    fn handle_update_contact(
        &self,
        cmd: &UpdateContact,
    ) -> Result<Vec<EmployeeEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_employee_id(cmd.employee_id)?;
        self.ensure_not_terminated()?;

        Ok(vec![EmployeeEvent::ContactUpdated(ContactUpdated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            contact: cmd.contact.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_terminate(
        &self,
        cmd: &TerminateEmployee,
    ) -> Result<Vec<EmployeeEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_employee_id(cmd.employee_id)?;

        if self.status == EmployeeStatus::Terminated {
            return Err(DomainError::conflict("employee is already terminated"));
        }

        Ok(vec![EmployeeEvent::EmployeeTerminated(EmployeeTerminated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
