//! Authentication service: registration, login and current identity.
//!
//! Login never distinguishes an unknown email from a wrong password: both
//! yield `AuthError::InvalidCredentials`, and an unknown email still pays for
//! one bcrypt verification.

use std::sync::OnceLock;

use chatop_core::auth::AuthError;
use chatop_core::auth::jwt::TokenCodec;
use chatop_core::auth::password::PasswordHasher;
use chatop_core::models::auth::{NewUser, User};
use chatop_core::store::{StoreError, UserStore};
use tracing::{info, warn};

use crate::middleware::auth::AuthenticatedUser;

/// Digest verified against when the email is unknown.
static DUMMY_DIGEST: OnceLock<String> = OnceLock::new();

/// Run bcrypt hashing off the async workers.
async fn hash_password(hasher: PasswordHasher, password: &str) -> Result<String, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AuthError::Internal(format!("hash task: {e}")))?
}

/// Run bcrypt verification off the async workers.
async fn verify_password(
    hasher: PasswordHasher,
    password: &str,
    digest: Option<String>,
) -> Result<bool, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || match digest {
        Some(digest) => hasher.verify(&password, &digest),
        None => {
            let dummy = DUMMY_DIGEST.get_or_init(|| hasher.hash("chatop-dummy").unwrap_or_default());
            let _ = hasher.verify(&password, dummy);
            false
        }
    })
    .await
    .map_err(|e| AuthError::Internal(format!("verify task: {e}")))
}

/// Loose shape check: one `@` with something on each side, no whitespace.
fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn validate_registration(email: &str, name: &str, password: &str) -> Result<(), AuthError> {
    let mut problems = Vec::new();
    if email.trim().is_empty() {
        problems.push("Email is required");
    } else if !looks_like_email(email) {
        problems.push("Email must be valid");
    }
    if name.trim().is_empty() {
        problems.push("Name is required");
    }
    if password.trim().is_empty() {
        problems.push("Password is required");
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(problems.join(", ")))
    }
}

/// Register a new account and return a bearer token for it.
pub async fn register(
    store: &dyn UserStore,
    hasher: PasswordHasher,
    tokens: &TokenCodec,
    email: &str,
    name: &str,
    password: &str,
) -> Result<String, AuthError> {
    let email = email.trim();
    validate_registration(email, name, password)?;

    if store.email_exists(email).await? {
        return Err(AuthError::AlreadyExists(email.to_string()));
    }

    let password_hash = hash_password(hasher, password).await?;
    // Issued before the insert so a token failure never leaves an orphaned account.
    let token = tokens.issue_now(email)?;

    // The store's uniqueness constraint settles races with concurrent registrations.
    let user = store
        .create_user(NewUser {
            email: email.to_string(),
            name: name.trim().to_string(),
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => AuthError::AlreadyExists(email.to_string()),
            other => AuthError::Store(other),
        })?;

    info!(user_id = user.id, "user registered");
    Ok(token)
}

/// Authenticate with email + password and return a bearer token.
pub async fn login(
    store: &dyn UserStore,
    hasher: PasswordHasher,
    tokens: &TokenCodec,
    email: &str,
    password: &str,
) -> Result<String, AuthError> {
    let email = email.trim();
    let credential = store.find_credential(email).await?;

    let subject = credential.as_ref().map(|c| c.email.clone());
    let digest = credential.map(|c| c.password_hash);

    if !verify_password(hasher, password, digest).await? {
        warn!("login rejected");
        return Err(AuthError::InvalidCredentials);
    }

    match subject {
        Some(subject) => tokens.issue_now(&subject),
        None => Err(AuthError::InvalidCredentials),
    }
}

/// The identity bound to the current request, or `Unauthenticated`.
pub fn current_identity(bound: Option<&AuthenticatedUser>) -> Result<&User, AuthError> {
    bound.map(|u| &u.0).ok_or(AuthError::Unauthenticated)
}
