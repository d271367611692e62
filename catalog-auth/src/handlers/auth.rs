//! Session handlers: login, token rotation, logout and the caller's profile.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{
            LoginRequest, LogoutAllResponse, LogoutRequest, MeResponse, RefreshRequest,
            TokenResponse, UserSummary,
        },
        MessageResponse,
    },
    middleware::AuthUser,
    models::RevocationReason,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .auth_service
        .login(&req.email, &Password::new(req.password))
        .await?;

    let user = UserSummary::from(&session.identity);
    Ok((
        StatusCode::OK,
        Json(TokenResponse::new(session.tokens, Some(user))),
    ))
}

/// Rotate a refresh token into a new pair
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state.auth_service.refresh(&req.refresh_token).await?;
    Ok((StatusCode::OK, Json(TokenResponse::new(pair, None))))
}

/// Revoke the session behind a refresh token. Succeeds for any token.
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.logout(&req.refresh_token).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

/// Revoke every session of the caller
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let revoked_sessions = state
        .auth_service
        .revoke_all_sessions(user.subject(), RevocationReason::Logout)
        .await?;
    Ok((StatusCode::OK, Json(LogoutAllResponse { revoked_sessions })))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.auth_service.current_identity(&user.0).await?;

    Ok(Json(MeResponse {
        user: UserSummary::from(&identity),
        active: identity.active,
        verified: identity.verified,
    }))
}
