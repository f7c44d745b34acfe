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
use hrims_org::{
    CreateDepartment, DeactivateDepartment, Department, DepartmentCommand, DepartmentId,
    ReparentDepartment, UpdateDepartment,
};

use crate::app::routes::common::{self, CmdAuth, ListQuery};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_department).get(list_departments))
        .route("/:id", get(get_department).patch(update_department))
        .route("/:id/reparent", post(reparent_department))
        .route("/:id/deactivate", post(deactivate_department))
}

pub async fn create_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateDepartmentRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let parent_id = match parse_optional_department_id(body.parent_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let head_employee_id = match parse_optional_aggregate_id(body.head_employee_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = DepartmentCommand::CreateDepartment(CreateDepartment {
        tenant_id: tenant.tenant_id(),
        department_id: DepartmentId::new(agg),
        name: body.name,
        parent_id,
        head_employee_id,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("org.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Department>(
        tenant.tenant_id(),
        agg,
        "org.department",
        cmd_auth.inner,
        |_t, aggregate_id| Department::empty(DepartmentId::new(aggregate_id)),
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

pub async fn list_departments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "org.read") {
        return resp;
    }

    let items = match query.search.as_deref() {
        Some(q) => services.departments_search(tenant.tenant_id(), q),
        None => services.departments_list(tenant.tenant_id()),
    };
    (
        StatusCode::OK,
        Json(common::paginate(items, &query, dto::department_to_json)),
    )
        .into_response()
}

pub async fn get_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "org.read") {
        return resp;
    }

    let department_id = match parse_department_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.departments_get(tenant.tenant_id(), &department_id) {
        Some(rm) => (StatusCode::OK, Json(dto::department_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "department not found"),
    }
}

pub async fn update_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateDepartmentRequest>,
) -> axum::response::Response {
    let department_id = match parse_department_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let head_employee_id = match parse_optional_aggregate_id(body.head_employee_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = DepartmentCommand::UpdateDepartment(UpdateDepartment {
        tenant_id: tenant.tenant_id(),
        department_id,
        name: body.name,
        head_employee_id,
        occurred_at: Utc::now(),
    });

    dispatch_department(services, tenant, principal, department_id, cmd).await
}

pub async fn reparent_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReparentDepartmentRequest>,
) -> axum::response::Response {
    let department_id = match parse_department_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let parent_id = match parse_optional_department_id(body.parent_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Self-parenting is refused by the aggregate; longer cycles are only
    // visible across aggregates, so walk the projected hierarchy here.
    if let Some(proposed) = parent_id {
        if services.departments_would_create_cycle(tenant.tenant_id(), department_id, proposed) {
            return errors::json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invariant_violation",
                "reparenting would create a cycle in the department hierarchy",
            );
        }
    }

    let cmd = DepartmentCommand::ReparentDepartment(ReparentDepartment {
        tenant_id: tenant.tenant_id(),
        department_id,
        parent_id,
        occurred_at: Utc::now(),
    });

    dispatch_department(services, tenant, principal, department_id, cmd).await
}

pub async fn deactivate_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let department_id = match parse_department_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = DepartmentCommand::DeactivateDepartment(DeactivateDepartment {
        tenant_id: tenant.tenant_id(),
        department_id,
        occurred_at: Utc::now(),
    });

    dispatch_department(services, tenant, principal, department_id, cmd).await
}

async fn dispatch_department(
    services: Arc<AppServices>,
    tenant: crate::context::TenantContext,
    principal: crate::context::PrincipalContext,
    department_id: DepartmentId,
    cmd: DepartmentCommand,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("org.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Department>(
        tenant.tenant_id(),
        department_id.0,
        "org.department",
        cmd_auth.inner,
        |_t, aggregate_id| Department::empty(DepartmentId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": department_id.0.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

fn parse_department_id(id: &str) -> Result<DepartmentId, axum::response::Response> {
    id.parse::<AggregateId>().map(DepartmentId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid department id")
    })
}

fn parse_optional_department_id(
    id: Option<String>,
) -> Result<Option<DepartmentId>, axum::response::Response> {
    match id {
        None => Ok(None),
        Some(raw) => raw.parse::<AggregateId>().map(|v| Some(DepartmentId::new(v))).map_err(|_| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid department id")
        }),
    }
}

fn parse_optional_aggregate_id(
    id: Option<String>,
) -> Result<Option<AggregateId>, axum::response::Response> {
    match id {
        None => Ok(None),
        Some(raw) => raw.parse::<AggregateId>().map(Some).map_err(|_| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id")
        }),
    }
}
