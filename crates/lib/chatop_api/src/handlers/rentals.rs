//! Rental handlers.
//!
//! Create and update take `multipart/form-data` with the text fields
//! `name`, `surface`, `price`, `description` and a `picture` file part.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::PathRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use chatop_core::uploads::{UploadArtifact, UploadRejection};
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{MessageResponse, RentalListResponse, RentalResponse};
use crate::services::rentals::{self, RentalForm};

/// A body cut off by the request limit reports the upload ceiling.
fn multipart_error(e: MultipartError, max_bytes: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::InvalidUpload(UploadRejection::TooLarge { max_bytes }.to_string())
    } else {
        AppError::from(e)
    }
}

/// Collect the rental form fields. An empty, unnamed file part counts as no picture.
async fn read_form(mut multipart: Multipart, max_bytes: u64) -> AppResult<RentalForm> {
    let mut form = RentalForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "picture" => {
                let original_filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
                if bytes.is_empty() && original_filename.as_deref().is_none_or(str::is_empty) {
                    continue;
                }
                form.picture = Some(UploadArtifact {
                    original_filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "name" | "surface" | "price" | "description" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
                let slot = match name.as_str() {
                    "name" => &mut form.name,
                    "surface" => &mut form.surface,
                    "price" => &mut form.price,
                    _ => &mut form.description,
                };
                *slot = Some(value);
            }
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// `GET /rentals`
pub async fn list_rentals_handler(
    State(state): State<AppState>,
) -> AppResult<Json<RentalListResponse>> {
    let rentals = rentals::list(state.store.as_ref()).await?;
    Ok(Json(RentalListResponse {
        rentals: rentals.into_iter().map(RentalResponse::from).collect(),
    }))
}

/// `GET /rentals/{id}`
pub async fn get_rental_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<RentalResponse>> {
    let Path(id) = id?;
    let rental = rentals::get(state.store.as_ref(), id).await?;
    Ok(Json(RentalResponse::from(rental)))
}

/// `POST /rentals`: create a listing owned by the current user.
pub async fn create_rental_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<MessageResponse>> {
    let form = read_form(multipart?, state.files.policy().max_bytes).await?;
    rentals::create(state.store.as_ref(), &state.files, &user, form).await?;
    Ok(Json(MessageResponse::new("Rental created !")))
}

/// `PUT /rentals/{id}`: update the given fields of a listing.
pub async fn update_rental_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Path(id) = id?;
    let form = read_form(multipart?, state.files.policy().max_bytes).await?;
    rentals::update(state.store.as_ref(), &state.files, id, form).await?;
    Ok(Json(MessageResponse::new("Rental updated !")))
}
