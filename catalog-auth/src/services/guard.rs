//! The choke point every protected operation passes through.
//!
//! Pure policy: no I/O and no mutation. Callers verify the access token first
//! and hand over the claims, or `None` when verification failed.

use serde::Serialize;

use crate::models::{Permission, Role, ShopId, TokenClaims};
use crate::services::catalog::effective_permissions_for_claims;
use crate::services::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Unauthenticated,
    InsufficientPermission,
    TenantMismatch,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::InsufficientPermission => "insufficient_permission",
            DenyReason::TenantMismatch => "tenant_mismatch",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// `Ok(())` on allow, otherwise the matching error.
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

impl From<DenyReason> for AuthError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => AuthError::Malformed,
            DenyReason::InsufficientPermission => AuthError::InsufficientPermission,
            DenyReason::TenantMismatch => AuthError::TenantMismatch,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    pub fn new() -> Self {
        Self
    }

    /// Permission is checked before tenant, so a caller lacking the
    /// capability learns nothing about which shops exist.
    pub fn authorize(
        &self,
        claims: Option<&TokenClaims>,
        required: &Permission,
        requested_shop: &ShopId,
    ) -> Decision {
        let Some(claims) = claims else {
            return Decision::Deny(DenyReason::Unauthenticated);
        };

        if !effective_permissions_for_claims(claims).contains(required) {
            tracing::debug!(
                subject = %claims.sub,
                permission = %required,
                "Denied: insufficient permission"
            );
            return Decision::Deny(DenyReason::InsufficientPermission);
        }

        // SuperAdmin is the only cross-shop role.
        if claims.shop != *requested_shop && claims.role != Role::SuperAdmin {
            tracing::warn!(
                subject = %claims.sub,
                shop = %claims.shop,
                requested_shop = %requested_shop,
                permission = %required,
                "Denied: cross-shop access attempt"
            );
            return Decision::Deny(DenyReason::TenantMismatch);
        }

        Decision::Allow
    }

    /// Hierarchical role check: `Customer < Admin < SuperAdmin`.
    pub fn require_role(&self, claims: &TokenClaims, minimum: Role) -> Result<(), AuthError> {
        if claims.role >= minimum {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermission)
        }
    }
}
