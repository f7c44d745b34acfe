use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;

use hrims_auth::Permission;
use hrims_core::AggregateId;
use hrims_org::{CreateGrade, Grade, GradeCommand, GradeId, UpdateCompensation, UpdateLimits};

use crate::app::routes::common::{self, CmdAuth, ListQuery};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_grade).get(list_grades))
        .route("/:id", get(get_grade))
        .route("/:id/compensation", patch(update_compensation))
        .route("/:id/limits", patch(update_limits))
}

pub async fn create_grade(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateGradeRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = GradeCommand::CreateGrade(CreateGrade {
        tenant_id: tenant.tenant_id(),
        grade_id: GradeId::new(agg),
        code: body.code,
        level: body.level,
        band: body.band,
        compensation: body.compensation,
        limits: body.limits,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("grades.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Grade>(
        tenant.tenant_id(),
        agg,
        "org.grade",
        cmd_auth.inner,
        |_t, aggregate_id| Grade::empty(GradeId::new(aggregate_id)),
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

pub async fn list_grades(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "grades.read") {
        return resp;
    }

    let items = match query.search.as_deref() {
        Some(q) => services.grades_search(tenant.tenant_id(), q),
        None => services.grades_list(tenant.tenant_id()),
    };
    (
        StatusCode::OK,
        Json(common::paginate(items, &query, dto::grade_to_json)),
    )
        .into_response()
}

pub async fn get_grade(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "grades.read") {
        return resp;
    }

    let grade_id = match parse_grade_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.grades_get(tenant.tenant_id(), &grade_id) {
        Some(rm) => (StatusCode::OK, Json(dto::grade_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "grade not found"),
    }
}

pub async fn update_compensation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateCompensationRequest>,
) -> axum::response::Response {
    let grade_id = match parse_grade_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = GradeCommand::UpdateCompensation(UpdateCompensation {
        tenant_id: tenant.tenant_id(),
        grade_id,
        compensation: body.compensation,
        occurred_at: Utc::now(),
    });

    dispatch_grade(services, tenant, principal, grade_id, cmd).await
}

pub async fn update_limits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateLimitsRequest>,
) -> axum::response::Response {
    let grade_id = match parse_grade_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = GradeCommand::UpdateLimits(UpdateLimits {
        tenant_id: tenant.tenant_id(),
        grade_id,
        limits: body.limits,
        occurred_at: Utc::now(),
    });

    dispatch_grade(services, tenant, principal, grade_id, cmd).await
}

async fn dispatch_grade(
    services: Arc<AppServices>,
    tenant: crate::context::TenantContext,
    principal: crate::context::PrincipalContext,
    grade_id: GradeId,
    cmd: GradeCommand,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("grades.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Grade>(
        tenant.tenant_id(),
        grade_id.0,
        "org.grade",
        cmd_auth.inner,
        |_t, aggregate_id| Grade::empty(GradeId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": grade_id.0.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

fn parse_grade_id(id: &str) -> Result<GradeId, axum::response::Response> {
    id.parse::<AggregateId>()
        .map(GradeId::new)
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid grade id"))
}
