use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{
    models::{Permission, Role, ShopId, TokenClaims},
    services::{AuthError, AuthorizationGuard},
    AppState,
};

/// Pull the bearer token out of an `Authorization` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware to require a valid, unrevoked access token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.tokens.verify_access(token).await.map_err(|e| {
        if !matches!(e, AuthError::Internal(_)) {
            tracing::debug!(reason = e.code(), "Rejected bearer token");
        }
        AppError::from(e)
    })?;

    // Store claims in request extensions so handlers can access them
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Verified access-token claims of the caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub TokenClaims);

impl AuthUser {
    pub fn subject(&self) -> &str {
        &self.0.sub
    }

    /// Run the guard for `permission` on `shop`, mapping a denial to an error.
    pub fn authorize(&self, permission: &Permission, shop: &ShopId) -> Result<(), AppError> {
        AuthorizationGuard
            .authorize(Some(&self.0), permission, shop)
            .into_result()
            .map_err(AppError::from)
    }

    pub fn require_role(&self, minimum: Role) -> Result<(), AppError> {
        AuthorizationGuard
            .require_role(&self.0, minimum)
            .map_err(AppError::from)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<TokenClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth claims missing from request extensions"
            ))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }

    fn admin_of(shop: &str) -> AuthUser {
        AuthUser(TokenClaims {
            sub: "user-1".to_string(),
            iss: "catalog-auth".to_string(),
            shop: ShopId::from(shop),
            role: Role::Admin,
            iat: 0,
            exp: i64::MAX,
            fam: "family".to_string(),
            seq: 0,
            typ: crate::models::TokenKind::Access,
            jti: "jti".to_string(),
            perms: Default::default(),
        })
    }

    #[test]
    fn test_auth_user_denials_become_forbidden() {
        let user = admin_of("tinashop");
        assert!(user
            .authorize(&Permission::PRODUCT_WRITE, &ShopId::from("tinashop"))
            .is_ok());
        assert!(matches!(
            user.authorize(&Permission::PRODUCT_WRITE, &ShopId::from("othershop")),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            user.require_role(Role::SuperAdmin),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(user.subject(), "user-1");
    }
}
