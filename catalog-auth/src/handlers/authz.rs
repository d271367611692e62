use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::auth::{AuthorizeRequest, AuthorizeResponse},
    middleware::bearer_token,
    models::{Permission, ShopId},
    services::{Decision, DenyReason},
    utils::ValidatedJson,
    AppState,
};

/// Decide whether the bearer may exercise `permission` on `shop`.
///
/// Denials are answered with 200 and `allowed: false`; a missing or
/// unusable token is the `unauthenticated` denial.
pub async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    let decision = match token {
        Some(token) => {
            state
                .auth_service
                .authorize(
                    token,
                    &Permission::new(req.permission),
                    &ShopId::new(req.shop),
                )
                .await?
        }
        None => Decision::Deny(DenyReason::Unauthenticated),
    };

    Ok(Json(AuthorizeResponse::from(decision)))
}
