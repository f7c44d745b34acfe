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
    CreatePosition, DepartmentId, FillPosition, GradeId, Position, PositionCommand, PositionId,
    ResizePosition, UpdatePosition, VacatePosition,
};

use crate::app::routes::common::{self, CmdAuth, ListQuery};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_position).get(list_positions))
        .route("/:id", get(get_position).patch(update_position))
        .route("/:id/resize", post(resize_position))
        .route("/:id/fill", post(fill_position))
        .route("/:id/vacate", post(vacate_position))
}

pub async fn create_position(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreatePositionRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let department_id = match parse_optional(body.department_id, "department id") {
        Ok(v) => v.map(DepartmentId::new),
        Err(resp) => return resp,
    };
    let grade_id = match parse_optional(body.grade_id, "grade id") {
        Ok(v) => v.map(GradeId::new),
        Err(resp) => return resp,
    };
    let reports_to = match parse_optional(body.reports_to, "position id") {
        Ok(v) => v.map(PositionId::new),
        Err(resp) => return resp,
    };

    let cmd = PositionCommand::CreatePosition(CreatePosition {
        tenant_id: tenant.tenant_id(),
        position_id: PositionId::new(agg),
        title: body.title,
        code: body.code,
        department_id,
        grade_id,
        reports_to,
        flags: body.flags,
        number_of_positions: body.number_of_positions.unwrap_or(1),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("org.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Position>(
        tenant.tenant_id(),
        agg,
        "org.position",
        cmd_auth.inner,
        |_t, aggregate_id| Position::empty(PositionId::new(aggregate_id)),
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

pub async fn list_positions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "org.read") {
        return resp;
    }

    let items = match query.search.as_deref() {
        Some(q) => services.positions_search(tenant.tenant_id(), q),
        None => services.positions_list(tenant.tenant_id()),
    };
    (
        StatusCode::OK,
        Json(common::paginate(items, &query, dto::position_to_json)),
    )
        .into_response()
}

pub async fn get_position(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "org.read") {
        return resp;
    }

    let position_id = match parse_position_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.positions_get(tenant.tenant_id(), &position_id) {
        Some(rm) => (StatusCode::OK, Json(dto::position_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "position not found"),
    }
}

pub async fn update_position(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePositionRequest>,
) -> axum::response::Response {
    let position_id = match parse_position_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reports_to = match parse_optional(body.reports_to, "position id") {
        Ok(v) => v.map(PositionId::new),
        Err(resp) => return resp,
    };

    let cmd = PositionCommand::UpdatePosition(UpdatePosition {
        tenant_id: tenant.tenant_id(),
        position_id,
        title: body.title,
        reports_to,
        flags: body.flags,
        occurred_at: Utc::now(),
    });

    dispatch_position(services, tenant, principal, position_id, cmd).await
}

pub async fn resize_position(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ResizePositionRequest>,
) -> axum::response::Response {
    let position_id = match parse_position_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PositionCommand::ResizePosition(ResizePosition {
        tenant_id: tenant.tenant_id(),
        position_id,
        number_of_positions: body.number_of_positions,
        occurred_at: Utc::now(),
    });

    dispatch_position(services, tenant, principal, position_id, cmd).await
}

pub async fn fill_position(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PositionOccupancyRequest>,
) -> axum::response::Response {
    let position_id = match parse_position_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let employee_id: AggregateId = match body.employee_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id");
        }
    };

    let cmd = PositionCommand::FillPosition(FillPosition {
        tenant_id: tenant.tenant_id(),
        position_id,
        employee_id,
        occurred_at: Utc::now(),
    });

    dispatch_position(services, tenant, principal, position_id, cmd).await
}

pub async fn vacate_position(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PositionOccupancyRequest>,
) -> axum::response::Response {
    let position_id = match parse_position_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let employee_id: AggregateId = match body.employee_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id");
        }
    };

    let cmd = PositionCommand::VacatePosition(VacatePosition {
        tenant_id: tenant.tenant_id(),
        position_id,
        employee_id,
        occurred_at: Utc::now(),
    });

    dispatch_position(services, tenant, principal, position_id, cmd).await
}

async fn dispatch_position(
    services: Arc<AppServices>,
    tenant: crate::context::TenantContext,
    principal: crate::context::PrincipalContext,
    position_id: PositionId,
    cmd: PositionCommand,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("org.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Position>(
        tenant.tenant_id(),
        position_id.0,
        "org.position",
        cmd_auth.inner,
        |_t, aggregate_id| Position::empty(PositionId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": position_id.0.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

fn parse_position_id(id: &str) -> Result<PositionId, axum::response::Response> {
    id.parse::<AggregateId>().map(PositionId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid position id")
    })
}

fn parse_optional(
    id: Option<String>,
    label: &str,
) -> Result<Option<AggregateId>, axum::response::Response> {
    match id {
        None => Ok(None),
        Some(raw) => raw.parse::<AggregateId>().map(Some).map_err(|_| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {label}"))
        }),
    }
}
