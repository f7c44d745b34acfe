use axum::{Router, routing::get};

pub mod common;
pub mod departments;
pub mod employees;
pub mod grades;
pub mod loans;
pub mod positions;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/nav", get(system::nav))
        .nest("/employees", employees::router())
        .nest("/departments", departments::router())
        .nest("/positions", positions::router())
        .nest("/grades", grades::router())
        .nest("/loan-applications", loans::router())
}
