//! Messages sent to rental owners.

use chatop_core::models::auth::User;
use chatop_core::models::rental::{Message, NewMessage};
use chatop_core::store::Store;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// Longest accepted message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Record a message from `author` about rental `rental_id`.
///
/// `claimed_user_id` is what the client sent; the author is always the
/// authenticated user.
pub async fn send(
    store: &dyn Store,
    author: &User,
    rental_id: i64,
    claimed_user_id: Option<i64>,
    text: &str,
) -> AppResult<Message> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Message is required".into()));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    if let Some(claimed) = claimed_user_id
        && claimed != author.id
    {
        debug!(claimed, author = author.id, "ignoring client supplied user_id");
    }

    if store.get_rental(rental_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Rental {rental_id} not found")));
    }

    let message = store
        .create_message(NewMessage {
            rental_id,
            user_id: author.id,
            message: text.to_string(),
        })
        .await?;

    info!(message_id = message.id, rental_id, "message recorded");
    Ok(message)
}
