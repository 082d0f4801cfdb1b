//! PostgreSQL-backed store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{MessageStore, RentalStore, StoreError, UserStore};
use crate::models::auth::{Credential, NewUser, User};
use crate::models::rental::{Message, NewMessage, NewRental, Rental, RentalChanges};

const USER_COLUMNS: &str = "id, email, name, created_at, updated_at";
const RENTAL_COLUMNS: &str =
    "id, name, surface, price, picture, description, owner_id, created_at, updated_at";

/// Store over a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations from `chatop_core/migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Map unique-constraint violations to `StoreError::Duplicate`.
fn map_insert_error(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(what.to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(user_id, email, password_hash)| Credential {
            user_id,
            email,
            password_hash,
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &user.email))
    }
}

#[async_trait]
impl RentalStore for PgStore {
    async fn list_rentals(&self) -> Result<Vec<Rental>, StoreError> {
        let rows = sqlx::query_as::<_, Rental>(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_rental(&self, id: i64) -> Result<Option<Rental>, StoreError> {
        let row = sqlx::query_as::<_, Rental>(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_rental(&self, rental: NewRental) -> Result<Rental, StoreError> {
        let row = sqlx::query_as::<_, Rental>(&format!(
            "INSERT INTO rentals (name, surface, price, picture, description, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {RENTAL_COLUMNS}"
        ))
        .bind(&rental.name)
        .bind(rental.surface)
        .bind(rental.price)
        .bind(&rental.picture)
        .bind(&rental.description)
        .bind(rental.owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_rental(
        &self,
        id: i64,
        changes: RentalChanges,
    ) -> Result<Option<Rental>, StoreError> {
        let row = sqlx::query_as::<_, Rental>(&format!(
            "UPDATE rentals SET \
               name = COALESCE($2, name), \
               surface = COALESCE($3, surface), \
               price = COALESCE($4, price), \
               picture = COALESCE($5, picture), \
               description = COALESCE($6, description), \
               updated_at = now() \
             WHERE id = $1 \
             RETURNING {RENTAL_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.surface)
        .bind(changes.price)
        .bind(changes.picture)
        .bind(changes.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let row = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (rental_id, user_id, message) VALUES ($1, $2, $3) \
             RETURNING id, rental_id, user_id, message, created_at",
        )
        .bind(message.rental_id)
        .bind(message.user_id)
        .bind(&message.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
