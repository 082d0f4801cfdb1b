//! Password hashing via bcrypt.

use tracing::debug;

use super::AuthError;

/// bcrypt cost factor used outside of tests.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Accepted bcrypt cost range.
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// One-way adaptive password hasher.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl PasswordHasher {
    /// Hasher with an explicit bcrypt cost, see [`BCRYPT_COST_RANGE`].
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password with bcrypt. Every call uses a fresh salt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
    }

    /// Verify a password against a bcrypt digest.
    ///
    /// A malformed digest is reported as a plain mismatch.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        match bcrypt::verify(password, digest) {
            Ok(matches) => matches,
            Err(e) => {
                debug!("bcrypt verify rejected digest: {e}");
                false
            }
        }
    }
}
