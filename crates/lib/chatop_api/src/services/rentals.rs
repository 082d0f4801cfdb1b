//! Rental listing service.
//!
//! Text fields are validated before the picture is written, and a picture
//! whose rental row could not be saved is deleted again, so a failed request
//! never leaves a stray file behind.

use chatop_core::models::auth::User;
use chatop_core::models::rental::{NewRental, Rental, RentalChanges};
use chatop_core::store::RentalStore;
use chatop_core::uploads::{FileStorage, UploadArtifact};
use tracing::info;

use crate::error::{AppError, AppResult};

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Raw multipart fields of a rental create/update form.
#[derive(Debug, Default)]
pub struct RentalForm {
    pub name: Option<String>,
    pub surface: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub picture: Option<UploadArtifact>,
}

/// Parse a strictly positive, finite amount.
fn parse_positive(field: &str, raw: &str) -> AppResult<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{field} must be a number")))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::Validation(format!("{field} must be positive")));
    }
    Ok(value)
}

fn check_description(description: Option<&str>) -> AppResult<()> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_CHARS => Err(AppError::Validation(
            format!("Description must be at most {MAX_DESCRIPTION_CHARS} characters"),
        )),
        _ => Ok(()),
    }
}

/// Treat blank text fields as not provided.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn list(store: &dyn RentalStore) -> AppResult<Vec<Rental>> {
    Ok(store.list_rentals().await?)
}

pub async fn get(store: &dyn RentalStore, id: i64) -> AppResult<Rental> {
    store
        .get_rental(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rental {id} not found")))
}

/// Create a rental owned by `owner`. The picture is mandatory.
pub async fn create(
    store: &dyn RentalStore,
    files: &FileStorage,
    owner: &User,
    form: RentalForm,
) -> AppResult<Rental> {
    let name = non_blank(form.name)
        .ok_or_else(|| AppError::Validation("Name is required".into()))?;
    let surface = match form.surface.as_deref() {
        Some(raw) => parse_positive("Surface", raw)?,
        None => return Err(AppError::Validation("Surface is required".into())),
    };
    let price = match form.price.as_deref() {
        Some(raw) => parse_positive("Price", raw)?,
        None => return Err(AppError::Validation("Price is required".into())),
    };
    let description = non_blank(form.description);
    check_description(description.as_deref())?;

    let picture = files.store(form.picture).await?;

    let created = store
        .create_rental(NewRental {
            name,
            surface,
            price,
            picture: picture.url.clone(),
            description,
            owner_id: owner.id,
        })
        .await;
    let rental = match created {
        Ok(rental) => rental,
        Err(e) => {
            files.discard(&picture).await;
            return Err(e.into());
        }
    };

    info!(rental_id = rental.id, owner_id = owner.id, "rental created");
    Ok(rental)
}

/// Apply the provided fields to rental `id`.
pub async fn update(
    store: &dyn RentalStore,
    files: &FileStorage,
    id: i64,
    form: RentalForm,
) -> AppResult<Rental> {
    let mut changes = RentalChanges {
        name: non_blank(form.name),
        surface: non_blank(form.surface)
            .map(|raw| parse_positive("Surface", &raw))
            .transpose()?,
        price: non_blank(form.price)
            .map(|raw| parse_positive("Price", &raw))
            .transpose()?,
        description: form.description.map(|d| d.trim().to_string()),
        picture: None,
    };
    check_description(changes.description.as_deref())?;

    if changes.is_empty() && form.picture.is_none() {
        return Err(AppError::Validation(
            "At least one field must be provided".into(),
        ));
    }

    // 404 before any file is written
    get(store, id).await?;

    let picture = match form.picture {
        Some(artifact) => Some(files.store(Some(artifact)).await?),
        None => None,
    };
    changes.picture = picture.as_ref().map(|p| p.url.clone());

    let updated = match store.update_rental(id, changes).await {
        Ok(Some(rental)) => Ok(rental),
        Ok(None) => Err(AppError::NotFound(format!("Rental {id} not found"))),
        Err(e) => Err(AppError::from(e)),
    };
    let rental = match updated {
        Ok(rental) => rental,
        Err(e) => {
            if let Some(picture) = &picture {
                files.discard(picture).await;
            }
            return Err(e);
        }
    };

    info!(rental_id = rental.id, "rental updated");
    Ok(rental)
}
