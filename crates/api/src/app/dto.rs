use serde::Deserialize;

use hrims_infra::projections::{
    DepartmentReadModel, EmployeeReadModel, GradeReadModel, LoanReadModel, OnboardingReadModel,
    PositionReadModel,
};
use hrims_org::{CompensationStructure, GradeBand, GradeLimits, RoleFlags};
use hrims_people::ContractType;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterEmployeeRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact: Option<hrims_people::ContactInfo>,
    pub contract_type: ContractType,
    pub department_id: Option<String>,
    pub position_id: Option<String>,
    pub grade_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivateAccessRequest {
    pub system_username: Option<String>,
    pub system_role: String,
}

#[derive(Debug, Deserialize)]
pub struct TerminateEmployeeRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub parent_id: Option<String>,
    pub head_employee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    pub head_employee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReparentDepartmentRequest {
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePositionRequest {
    pub title: String,
    pub code: String,
    pub department_id: Option<String>,
    pub grade_id: Option<String>,
    pub reports_to: Option<String>,
    pub flags: Option<RoleFlags>,
    pub number_of_positions: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePositionRequest {
    pub title: Option<String>,
    pub reports_to: Option<String>,
    pub flags: Option<RoleFlags>,
}

#[derive(Debug, Deserialize)]
pub struct ResizePositionRequest {
    pub number_of_positions: u32,
}

#[derive(Debug, Deserialize)]
pub struct PositionOccupancyRequest {
    pub employee_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGradeRequest {
    pub code: String,
    pub level: u32,
    pub band: GradeBand,
    pub compensation: CompensationStructure,
    pub limits: GradeLimits,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCompensationRequest {
    pub compensation: CompensationStructure,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLimitsRequest {
    pub limits: GradeLimits,
}

#[derive(Debug, Deserialize)]
pub struct OpenLoanApplicationRequest {
    pub employee_id: String,
    pub loan_type: String,
    pub principal: u64,
    pub annual_rate_bps: u32,
    pub term_months: u32,
}

#[derive(Debug, Deserialize)]
pub struct RejectLoanApplicationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelLoanApplicationRequest {
    pub reason: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn employee_to_json(rm: EmployeeReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.employee_id.0.to_string(),
        "first_name": rm.first_name,
        "last_name": rm.last_name,
        "email": rm.email,
        "phone": rm.phone,
        "contract_type": rm.contract_type,
        "department_id": rm.department_id.map(|id| id.to_string()),
        "position_id": rm.position_id.map(|id| id.to_string()),
        "grade_id": rm.grade_id.map(|id| id.to_string()),
        "status": rm.status,
        "registration": rm.registration,
        "system_username": rm.system_username,
        "system_role": rm.system_role,
    })
}

pub fn onboarding_to_json(rm: OnboardingReadModel) -> serde_json::Value {
    serde_json::json!({
        "employee_id": rm.employee_id.0.to_string(),
        "registration": rm.registration,
        "system_username": rm.system_username,
        "system_role": rm.system_role,
    })
}

pub fn department_to_json(rm: DepartmentReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.department_id.0.to_string(),
        "name": rm.name,
        "parent_id": rm.parent_id.map(|id| id.0.to_string()),
        "head_employee_id": rm.head_employee_id.map(|id| id.to_string()),
        "active": rm.active,
    })
}

pub fn position_to_json(rm: PositionReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.position_id.0.to_string(),
        "title": rm.title,
        "code": rm.code,
        "department_id": rm.department_id.map(|id| id.0.to_string()),
        "grade_id": rm.grade_id.map(|id| id.0.to_string()),
        "reports_to": rm.reports_to.map(|id| id.0.to_string()),
        "flags": rm.flags,
        "number_of_positions": rm.number_of_positions,
        "currently_filled": rm.currently_filled,
        "available": rm.available(),
    })
}

pub fn grade_to_json(rm: GradeReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.grade_id.0.to_string(),
        "code": rm.code,
        "level": rm.level,
        "band": rm.band,
        "compensation": rm.compensation,
        "limits": rm.limits,
    })
}

pub fn loan_to_json(rm: LoanReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.application_id.0.to_string(),
        "employee_id": rm.employee_id.to_string(),
        "loan_type": rm.loan_type,
        "principal": rm.principal,
        "annual_rate_bps": rm.annual_rate_bps,
        "term_months": rm.term_months,
        "terms": rm.terms,
        "status": rm.status,
        "decided_by": rm.decided_by.map(|id| id.to_string()),
        "reason": rm.reason,
    })
}
