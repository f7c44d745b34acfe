use axum::{Json, http::StatusCode, response::IntoResponse};

use hrims_auth::visible_nav_items;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    axum::extract::Extension(tenant): axum::extract::Extension<crate::context::TenantContext>,
    axum::extract::Extension(principal): axum::extract::Extension<crate::context::PrincipalContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": tenant.tenant_id().to_string(),
        "principal_id": principal.principal_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}

/// Navigation entries visible to the caller's roles.
pub async fn nav(
    axum::extract::Extension(principal): axum::extract::Extension<crate::context::PrincipalContext>,
) -> impl IntoResponse {
    let items = visible_nav_items(principal.roles())
        .into_iter()
        .map(|item| {
            serde_json::json!({
                "key": item.key,
                "label": item.label,
                "path": item.path,
            })
        })
        .collect::<Vec<_>>();

    Json(serde_json::json!({ "items": items }))
}
