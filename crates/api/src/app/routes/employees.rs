use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use hrims_auth::Permission;
use hrims_core::AggregateId;
use hrims_people::{
    ActivateSystemAccess, ContactInfo, Employee, EmployeeCommand, EmployeeId, RegisterEmployee,
    TerminateEmployee, UpdateContact, VerifyProfile,
};

use crate::app::routes::common::{self, CmdAuth, ListQuery};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_employee).get(list_employees))
        .route("/:id", get(get_employee).patch(update_contact))
        .route("/:id/onboarding", get(get_onboarding))
        .route("/:id/activate-access", post(activate_access))
        .route("/:id/verify-profile", post(verify_profile))
        .route("/:id/terminate", post(terminate_employee))
}

pub async fn register_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::RegisterEmployeeRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let employee_id = EmployeeId::new(agg);

    let department_id = match parse_optional_id(body.department_id, "department_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let position_id = match parse_optional_id(body.position_id, "position_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let grade_id = match parse_optional_id(body.grade_id, "grade_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = EmployeeCommand::RegisterEmployee(RegisterEmployee {
        tenant_id: tenant.tenant_id(),
        employee_id,
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        contact: body.contact,
        contract_type: body.contract_type,
        department_id,
        position_id,
        grade_id,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("people.register")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Employee>(
        tenant.tenant_id(),
        agg,
        "people.employee",
        cmd_auth.inner,
        |_t, aggregate_id| Employee::empty(EmployeeId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn list_employees(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "people.read") {
        return resp;
    }

    let items = match query.search.as_deref() {
        Some(q) => services.employees_search(tenant.tenant_id(), q),
        None => services.employees_list(tenant.tenant_id()),
    };
    (
        StatusCode::OK,
        Json(common::paginate(items, &query, dto::employee_to_json)),
    )
        .into_response()
}

pub async fn get_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "people.read") {
        return resp;
    }

    let employee_id = match parse_employee_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.employees_get(tenant.tenant_id(), &employee_id) {
        Some(rm) => (StatusCode::OK, Json(dto::employee_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "employee not found"),
    }
}

pub async fn get_onboarding(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "people.read") {
        return resp;
    }

    let employee_id = match parse_employee_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.employees_onboarding(tenant.tenant_id(), &employee_id) {
        Some(rm) => (StatusCode::OK, Json(dto::onboarding_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "employee not found"),
    }
}

pub async fn update_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateContactRequest>,
) -> axum::response::Response {
    let employee_id = match parse_employee_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = EmployeeCommand::UpdateContact(UpdateContact {
        tenant_id: tenant.tenant_id(),
        employee_id,
        contact: ContactInfo {
            phone: body.phone,
            address: body.address,
            emergency_contact: body.emergency_contact,
        },
        occurred_at: Utc::now(),
    });

    dispatch_employee(services, tenant, principal, employee_id, cmd, "people.register").await
}

pub async fn activate_access(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ActivateAccessRequest>,
) -> axum::response::Response {
    let employee_id = match parse_employee_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = EmployeeCommand::ActivateSystemAccess(ActivateSystemAccess {
        tenant_id: tenant.tenant_id(),
        employee_id,
        system_username: body.system_username,
        system_role: body.system_role,
        occurred_at: Utc::now(),
    });

    dispatch_employee(services, tenant, principal, employee_id, cmd, "people.activate").await
}

pub async fn verify_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let employee_id = match parse_employee_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = EmployeeCommand::VerifyProfile(VerifyProfile {
        tenant_id: tenant.tenant_id(),
        employee_id,
        occurred_at: Utc::now(),
    });

    dispatch_employee(services, tenant, principal, employee_id, cmd, "people.verify").await
}

pub async fn terminate_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TerminateEmployeeRequest>,
) -> axum::response::Response {
    let employee_id = match parse_employee_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = EmployeeCommand::TerminateEmployee(TerminateEmployee {
        tenant_id: tenant.tenant_id(),
        employee_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    dispatch_employee(services, tenant, principal, employee_id, cmd, "people.register").await
}

async fn dispatch_employee(
    services: Arc<AppServices>,
    tenant: crate::context::TenantContext,
    principal: crate::context::PrincipalContext,
    employee_id: EmployeeId,
    cmd: EmployeeCommand,
    perm: &'static str,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new(perm)],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Employee>(
        tenant.tenant_id(),
        employee_id.0,
        "people.employee",
        cmd_auth.inner,
        |_t, aggregate_id| Employee::empty(EmployeeId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": employee_id.0.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

fn parse_employee_id(id: &str) -> Result<EmployeeId, axum::response::Response> {
    id.parse::<AggregateId>().map(EmployeeId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id")
    })
}

fn parse_optional_id(
    id: Option<String>,
    field: &str,
) -> Result<Option<AggregateId>, axum::response::Response> {
    match id {
        None => Ok(None),
        Some(raw) => raw.parse::<AggregateId>().map(Some).map_err(|_| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {field}"))
        }),
    }
}
