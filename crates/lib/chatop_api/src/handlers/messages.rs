//! Message handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreateMessageRequest, MessageResponse};
use crate::services::messages;

/// `POST /messages`: send a message about a rental as the current user.
pub async fn create_message_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(body) = body?;
    messages::send(
        state.store.as_ref(),
        &user,
        body.rental_id,
        body.user_id,
        &body.message,
    )
    .await?;
    Ok(Json(MessageResponse::new("Message send with success")))
}
