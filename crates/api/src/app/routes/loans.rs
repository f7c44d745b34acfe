use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use hrims_auth::Permission;
use hrims_core::AggregateId;
use hrims_loans::{
    ApproveApplication, CancelApplication, DisburseLoan, LoanApplication, LoanApplicationId,
    LoanCommand, MarkDefaulted, OpenApplication, RejectApplication, StartReview, SubmitApplication,
};
use hrims_org::GradeId;
use hrims_people::EmployeeId;

use crate::app::routes::common::{self, CmdAuth, ListQuery};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_application).get(list_applications))
        .route("/:id", get(get_application))
        .route("/:id/submit", post(submit_application))
        .route("/:id/review", post(start_review))
        .route("/:id/approve", post(approve_application))
        .route("/:id/reject", post(reject_application))
        .route("/:id/disburse", post(disburse_loan))
        .route("/:id/cancel", post(cancel_application))
        .route("/:id/default", post(mark_defaulted))
}

pub async fn open_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::OpenLoanApplicationRequest>,
) -> axum::response::Response {
    let employee_agg: AggregateId = match body.employee_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id");
        }
    };

    // The applicant must exist, and the principal must fit the grade's
    // loan cap when the employee is assigned a grade.
    let employee = match services.employees_get(tenant.tenant_id(), &EmployeeId::new(employee_agg)) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "employee not found"),
    };
    if let Some(grade_agg) = employee.grade_id {
        if let Some(grade) = services.grades_get(tenant.tenant_id(), &GradeId::new(grade_agg)) {
            if body.principal > grade.limits.max_loan_amount {
                return errors::json_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invariant_violation",
                    format!(
                        "principal exceeds the grade loan cap of {}",
                        grade.limits.max_loan_amount
                    ),
                );
            }
        }
    }

    let agg = AggregateId::new();
    let cmd = LoanCommand::OpenApplication(OpenApplication {
        tenant_id: tenant.tenant_id(),
        application_id: LoanApplicationId::new(agg),
        employee_id: employee_agg,
        loan_type: body.loan_type,
        principal: body.principal,
        annual_rate_bps: body.annual_rate_bps,
        term_months: body.term_months,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("loans.apply")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<LoanApplication>(
        tenant.tenant_id(),
        agg,
        "loans.application",
        cmd_auth.inner,
        |_t, aggregate_id| LoanApplication::empty(LoanApplicationId::new(aggregate_id)),
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

#[derive(Debug, Deserialize)]
pub struct LoanListQuery {
    pub employee_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

pub async fn list_applications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<LoanListQuery>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "loans.read") {
        return resp;
    }

    let items = match &query.employee_id {
        Some(raw) => {
            let employee_agg: AggregateId = match raw.parse() {
                Ok(v) => v,
                Err(_) => {
                    return errors::json_error(
                        StatusCode::BAD_REQUEST,
                        "invalid_id",
                        "invalid employee id",
                    );
                }
            };
            services.loans_list_for_employee(tenant.tenant_id(), employee_agg)
        }
        None => match query.search.as_deref() {
            Some(q) => services.loans_search(tenant.tenant_id(), q),
            None => services.loans_list(tenant.tenant_id()),
        },
    };

    let list_query = ListQuery {
        search: query.search,
        page: query.page,
        per_page: query.per_page,
    };
    (
        StatusCode::OK,
        Json(common::paginate(items, &list_query, dto::loan_to_json)),
    )
        .into_response()
}

pub async fn get_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&tenant, &principal, "loans.read") {
        return resp;
    }

    let application_id = match parse_application_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.loans_get(tenant.tenant_id(), &application_id) {
        Some(rm) => (StatusCode::OK, Json(dto::loan_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "loan application not found"),
    }
}

pub async fn submit_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let application_id = match parse_application_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = LoanCommand::SubmitApplication(SubmitApplication {
        tenant_id: tenant.tenant_id(),
        application_id,
        occurred_at: Utc::now(),
    });

    dispatch_loan(services, tenant, principal, application_id, cmd, "loans.apply").await
}

pub async fn start_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let application_id = match parse_application_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = LoanCommand::StartReview(StartReview {
        tenant_id: tenant.tenant_id(),
        application_id,
        reviewer_id: principal_aggregate_id(&principal),
        occurred_at: Utc::now(),
    });

    dispatch_loan(services, tenant, principal, application_id, cmd, "loans.review").await
}

pub async fn approve_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let application_id = match parse_application_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = LoanCommand::ApproveApplication(ApproveApplication {
        tenant_id: tenant.tenant_id(),
        application_id,
        approver_id: principal_aggregate_id(&principal),
        occurred_at: Utc::now(),
    });

    dispatch_loan(services, tenant, principal, application_id, cmd, "loans.approve").await
}

pub async fn reject_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectLoanApplicationRequest>,
) -> axum::response::Response {
    let application_id = match parse_application_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = LoanCommand::RejectApplication(RejectApplication {
        tenant_id: tenant.tenant_id(),
        application_id,
        reviewer_id: principal_aggregate_id(&principal),
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    dispatch_loan(services, tenant, principal, application_id, cmd, "loans.review").await
}

pub async fn disburse_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let application_id = match parse_application_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = LoanCommand::DisburseLoan(DisburseLoan {
        tenant_id: tenant.tenant_id(),
        application_id,
        occurred_at: Utc::now(),
    });

    dispatch_loan(services, tenant, principal, application_id, cmd, "loans.disburse").await
}

pub async fn cancel_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelLoanApplicationRequest>,
) -> axum::response::Response {
    let application_id = match parse_application_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = LoanCommand::CancelApplication(CancelApplication {
        tenant_id: tenant.tenant_id(),
        application_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    dispatch_loan(services, tenant, principal, application_id, cmd, "loans.apply").await
}

pub async fn mark_defaulted(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let application_id = match parse_application_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = LoanCommand::MarkDefaulted(MarkDefaulted {
        tenant_id: tenant.tenant_id(),
        application_id,
        occurred_at: Utc::now(),
    });

    dispatch_loan(services, tenant, principal, application_id, cmd, "loans.review").await
}

async fn dispatch_loan(
    services: Arc<AppServices>,
    tenant: crate::context::TenantContext,
    principal: crate::context::PrincipalContext,
    application_id: LoanApplicationId,
    cmd: LoanCommand,
    perm: &'static str,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new(perm)],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<LoanApplication>(
        tenant.tenant_id(),
        application_id.0,
        "loans.application",
        cmd_auth.inner,
        |_t, aggregate_id| LoanApplication::empty(LoanApplicationId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": application_id.0.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

fn principal_aggregate_id(principal: &crate::context::PrincipalContext) -> AggregateId {
    AggregateId::from_uuid(*principal.principal_id().as_uuid())
}

fn parse_application_id(id: &str) -> Result<LoanApplicationId, axum::response::Response> {
    id.parse::<AggregateId>().map(LoanApplicationId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid application id")
    })
}
