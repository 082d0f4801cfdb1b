//! User lookup handler.

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::UserResponse;

/// `GET /user/{id}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<UserResponse>> {
    let Path(id) = id?;
    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
    Ok(Json(UserResponse::from(&user)))
}
