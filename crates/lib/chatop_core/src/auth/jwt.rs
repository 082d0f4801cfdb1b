//! JWT token generation and verification.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

use super::AuthError;
use crate::models::auth::TokenClaims;

/// Default bearer token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Longest accepted bearer token lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Signs and verifies HS256 bearer tokens with a server-held secret.
///
/// Built once at startup and shared read-only across requests.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issue a token for `subject`, valid from `issued_at` for `ttl`.
    ///
    /// `ttl` must be positive and `issued_at + ttl` representable.
    pub fn issue(
        &self,
        subject: &str,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        if ttl <= Duration::zero() {
            return Err(AuthError::Internal(format!("non-positive token ttl: {ttl}")));
        }
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal(format!("token ttl overflows: {ttl}")))?;
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Issue a token for `subject` starting now, with the configured lifetime.
    pub fn issue_now(&self, subject: &str) -> Result<String, AuthError> {
        self.issue(subject, Utc::now(), self.ttl)
    }

    /// Verify a token against the current clock.
    pub fn decode(&self, token: &str) -> Option<TokenClaims> {
        self.decode_at(token, Utc::now().timestamp())
    }

    /// Verify a token as of `now` (unix seconds).
    ///
    /// Signature, algorithm, structure and expiry are all re-checked on every
    /// call. Any failure yields `None` so callers cannot tell them apart.
    /// Expiry is strict: the token is valid only while `now < exp`.
    pub fn decode_at(&self, token: &str, now: i64) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)
            .ok()?
            .claims;

        (now < claims.exp && !claims.sub.is_empty()).then_some(claims)
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), "could not create JWT secret directory: {e}");
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(
            path = %secret_path.display(),
            "could not persist generated JWT secret, tokens will not survive a restart: {e}"
        ),
    }
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatop")
        .join("jwt-secret")
}
