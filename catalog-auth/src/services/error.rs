use service_core::error::AppError;
use thiserror::Error;

/// Outcomes of the authentication core.
///
/// Every variant except `Internal` is a terminal, request-scoped security
/// outcome. None of them is retried by the core.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Malformed token")]
    Malformed,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Refresh token replay detected")]
    ReplayDetected,

    #[error("Insufficient permission")]
    InsufficientPermission,

    #[error("Tenant mismatch")]
    TenantMismatch,

    #[error("Concurrent refresh conflict")]
    Conflict,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable machine-readable code for logs and API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountInactive => "account_inactive",
            AuthError::Expired => "expired",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Malformed => "malformed",
            AuthError::Revoked => "revoked",
            AuthError::ReplayDetected => "replay_detected",
            AuthError::InsufficientPermission => "insufficient_permission",
            AuthError::TenantMismatch => "tenant_mismatch",
            AuthError::Conflict => "conflict",
            AuthError::Internal(_) => "internal",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Internal(e) => AppError::InternalError(e),
            AuthError::InvalidCredentials
            | AuthError::Expired
            | AuthError::InvalidSignature
            | AuthError::Malformed
            | AuthError::Revoked
            | AuthError::ReplayDetected => AppError::Unauthorized(anyhow::anyhow!(err.to_string())),
            AuthError::AccountInactive
            | AuthError::InsufficientPermission
            | AuthError::TenantMismatch => AppError::Forbidden(anyhow::anyhow!(err.to_string())),
            AuthError::Conflict => AppError::Conflict(anyhow::anyhow!(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::{http::StatusCode, response::IntoResponse};

    fn status_of(err: AuthError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn authentication_failures_are_401() {
        assert_eq!(status_of(AuthError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::ReplayDetected), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn authorization_failures_are_403() {
        assert_eq!(status_of(AuthError::TenantMismatch), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AuthError::InsufficientPermission), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AuthError::AccountInactive), StatusCode::FORBIDDEN);
    }

    #[test]
    fn lost_race_is_409() {
        assert_eq!(status_of(AuthError::Conflict), StatusCode::CONFLICT);
    }
}
