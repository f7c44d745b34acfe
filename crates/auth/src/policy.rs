//! Static role→permission policy and navigation gating.
//!
//! The policy is a fixed table: no hierarchy resolution, no delegation,
//! no caching. Unknown roles grant nothing.

use std::collections::HashSet;

use crate::{Permission, Role};

/// Permissions granted by a role.
pub fn permissions_for_role(role: &str) -> &'static [&'static str] {
    match role {
        "admin" => &["*"],
        "hr_manager" => &[
            "people.read",
            "people.register",
            "people.activate",
            "people.verify",
            "org.read",
            "org.manage",
            "grades.read",
            "grades.manage",
            "loans.read",
            "loans.review",
            "loans.approve",
            "payroll.read",
        ],
        "hr_officer" => &[
            "people.read",
            "people.register",
            "people.activate",
            "people.verify",
            "org.read",
            "grades.read",
            "loans.read",
            "loans.review",
            "payroll.read",
        ],
        "finance_officer" => &["people.read", "loans.read", "loans.disburse", "payroll.read"],
        "department_head" => &["people.read", "org.read", "grades.read", "loans.read"],
        "supervisor" => &["people.read", "org.read", "loans.read"],
        "employee" => &["loans.apply", "loans.read", "payroll.read"],
        _ => &[],
    }
}

/// Union of all permissions granted by a set of roles.
pub fn effective_permissions(roles: &[Role]) -> Vec<Permission> {
    let mut seen: HashSet<&'static str> = HashSet::new();
    for role in roles {
        for perm in permissions_for_role(role.as_str()) {
            seen.insert(perm);
        }
    }
    let mut perms: Vec<&'static str> = seen.into_iter().collect();
    perms.sort_unstable();
    perms.into_iter().map(Permission::new).collect()
}

/// A navigation entry gated by a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub key: &'static str,
    pub label: &'static str,
    pub path: &'static str,
    pub required: &'static str,
}

const NAV: &[NavItem] = &[
    NavItem { key: "employees", label: "Employees", path: "/employees", required: "people.read" },
    NavItem { key: "departments", label: "Departments", path: "/departments", required: "org.read" },
    NavItem { key: "positions", label: "Positions", path: "/positions", required: "org.read" },
    NavItem { key: "grades", label: "Grades", path: "/grades", required: "grades.read" },
    NavItem { key: "loans", label: "Loan Applications", path: "/loan-applications", required: "loans.read" },
    NavItem { key: "payroll", label: "Payroll", path: "/payroll", required: "payroll.read" },
];

/// Navigation entries visible to a set of roles (pure membership check).
pub fn visible_nav_items(roles: &[Role]) -> Vec<NavItem> {
    let perms: HashSet<String> = effective_permissions(roles)
        .into_iter()
        .map(|p| p.as_str().to_string())
        .collect();
    let wildcard = perms.contains("*");

    NAV.iter()
        .filter(|item| wildcard || perms.contains(item.required))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_sees_all_nav_items() {
        let items = visible_nav_items(&[Role::new("admin")]);
        assert_eq!(items.len(), NAV.len());
    }

    #[test]
    fn employee_does_not_see_org_items() {
        let items = visible_nav_items(&[Role::new("employee")]);
        assert!(items.iter().any(|i| i.key == "loans"));
        assert!(items.iter().all(|i| i.key != "departments"));
        assert!(items.iter().all(|i| i.key != "employees"));
    }

    #[test]
    fn roles_lacking_a_permission_cannot_see_its_item() {
        // supervisor has org.read but not grades.read
        let items = visible_nav_items(&[Role::new("supervisor")]);
        assert!(items.iter().any(|i| i.key == "positions"));
        assert!(items.iter().all(|i| i.key != "grades"));
    }

    #[test]
    fn unknown_role_grants_nothing() {
        assert!(permissions_for_role("intern").is_empty());
        assert!(visible_nav_items(&[Role::new("intern")]).is_empty());
    }

    #[test]
    fn effective_permissions_union_roles() {
        let perms = effective_permissions(&[Role::new("supervisor"), Role::new("employee")]);
        let as_strs: Vec<&str> = perms.iter().map(|p| p.as_str()).collect();
        assert!(as_strs.contains(&"org.read"));
        assert!(as_strs.contains(&"loans.apply"));
    }
}
