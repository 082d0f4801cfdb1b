//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
use crate::services::auth;

/// `POST /auth/register`: create an account and return a bearer token.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(body) = body?;
    let token = auth::register(
        state.store.as_ref(),
        state.hasher,
        &state.tokens,
        &body.email,
        &body.name,
        &body.password,
    )
    .await?;
    Ok(Json(AuthResponse { token }))
}

/// `POST /auth/login`: exchange email + password for a bearer token.
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(body) = body?;
    let token = auth::login(
        state.store.as_ref(),
        state.hasher,
        &state.tokens,
        &body.email,
        &body.password,
    )
    .await?;
    Ok(Json(AuthResponse { token }))
}

/// `GET /auth/me`
pub async fn me_handler(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}
