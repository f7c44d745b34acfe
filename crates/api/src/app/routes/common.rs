use axum::http::StatusCode;
use serde::Deserialize;

use hrims_auth::{CommandAuthorization, Permission};

use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Permission guard for read endpoints (no command to wrap).
pub fn require(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    perm: &'static str,
) -> Result<(), axum::response::Response> {
    let guard = CmdAuth {
        inner: (),
        required: vec![Permission::new(perm)],
    };
    crate::authz::authorize_command(tenant, principal, &guard)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

const DEFAULT_PER_PAGE: usize = 20;
const MAX_PER_PAGE: usize = 100;

/// Query string for list endpoints: optional search plus pagination.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// Apply 1-based pagination and wrap the page in the standard list body.
pub fn paginate<T>(
    items: Vec<T>,
    query: &ListQuery,
    to_json: impl Fn(T) -> serde_json::Value,
) -> serde_json::Value {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let total = items.len();

    let page_items = items
        .into_iter()
        .skip(page.saturating_sub(1).saturating_mul(per_page))
        .take(per_page)
        .map(to_json)
        .collect::<Vec<_>>();

    serde_json::json!({
        "items": page_items,
        "page": page,
        "per_page": per_page,
        "total": total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<usize>, per_page: Option<usize>) -> ListQuery {
        ListQuery {
            search: None,
            page,
            per_page,
        }
    }

    #[test]
    fn paginate_defaults_to_first_page() {
        let body = paginate(vec![1, 2, 3], &query(None, Some(2)), |n| n.into());

        assert_eq!(body["items"], serde_json::json!([1, 2]));
        assert_eq!(body["page"], 1);
        assert_eq!(body["total"], 3);
    }

    #[test]
    fn paginate_tolerates_huge_page_numbers() {
        let body = paginate(vec![1, 2, 3], &query(Some(usize::MAX), Some(MAX_PER_PAGE)), |n| {
            n.into()
        });

        assert_eq!(body["items"], serde_json::json!([]));
        assert_eq!(body["total"], 3);
    }
}
