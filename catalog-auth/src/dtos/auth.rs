use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CredentialPair, Identity, Role, ShopId};
use crate::services::{effective_permissions, Decision, DenyReason, PermissionSet};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AuthorizeRequest {
    #[validate(length(min = 1, message = "Permission is required"))]
    pub permission: String,

    #[validate(length(min = 1, message = "Shop is required"))]
    pub shop: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

impl From<Decision> for AuthorizeResponse {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Self {
                allowed: true,
                reason: None,
            },
            Decision::Deny(reason) => Self {
                allowed: false,
                reason: Some(reason),
            },
        }
    }
}

/// Public view of an identity. Never carries the secret hash.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub shop: ShopId,
    pub permissions: PermissionSet,
}

impl From<&Identity> for UserSummary {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            shop: identity.shop.clone(),
            permissions: effective_permissions(identity),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

impl TokenResponse {
    pub fn new(pair: CredentialPair, user: Option<UserSummary>) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
            user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserSummary,
    pub active: bool,
    pub verified: bool,
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked_sessions: usize,
}
