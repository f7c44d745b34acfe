//! `hrims-auth` — pure authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: token decoding, claim validation,
//! the static role→permission policy, and navigation gating.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use policy::{NavItem, effective_permissions, permissions_for_role, visible_nav_items};
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
