use std::collections::HashSet;

use thiserror::Error;

use hrims_core::TenantId;

use crate::{Permission, PrincipalId, TenantMembership};

/// A fully resolved principal for authorization decisions.
///
/// Construction is decoupled from storage and transport: the API derives
/// memberships from token claims plus the static policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract (checked at the command boundary).
///
/// Implement this on commands that require permissions; the API layer
/// enforces the requirements before dispatching.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal within its active tenant context.
///
/// Pure set-membership policy check: no IO, no panics, no business logic.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let perms: HashSet<&str> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn principal(tenant: TenantId, membership_tenant: TenantId, perms: Vec<&'static str>) -> Principal {
        Principal {
            principal_id: PrincipalId::new(),
            active_tenant_id: tenant,
            membership: TenantMembership {
                tenant_id: membership_tenant,
                roles: vec![Role::new("hr_officer")],
                permissions: perms.into_iter().map(Permission::new).collect(),
            },
        }
    }

    #[test]
    fn explicit_permission_is_granted() {
        let t = TenantId::new();
        let p = principal(t, t, vec!["people.read"]);
        assert!(authorize(&p, &Permission::new("people.read")).is_ok());
    }

    #[test]
    fn wildcard_grants_everything() {
        let t = TenantId::new();
        let p = principal(t, t, vec!["*"]);
        assert!(authorize(&p, &Permission::new("loans.disburse")).is_ok());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let t = TenantId::new();
        let p = principal(t, t, vec!["people.read"]);
        let err = authorize(&p, &Permission::new("loans.approve")).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("loans.approve".to_string()));
    }

    #[test]
    fn tenant_mismatch_is_rejected() {
        let p = principal(TenantId::new(), TenantId::new(), vec!["*"]);
        assert_eq!(
            authorize(&p, &Permission::new("people.read")),
            Err(AuthzError::TenantMismatch)
        );
    }
}
