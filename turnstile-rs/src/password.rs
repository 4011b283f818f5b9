//! Password hashing with bcrypt.
//!
//! Digests are self-describing (`$2b$<cost>$<salt+hash>`), so verification
//! needs no out-of-band parameters. Verification compares full digests, so a
//! mismatch position does not affect timing.

use thiserror::Error;

/// Minimum and maximum bcrypt cost accepted by the crate.
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Hashes and verifies passwords at a fixed cost factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password into a salted bcrypt digest.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    /// Check a plaintext password against a stored digest.
    ///
    /// A malformed digest verifies as `false` rather than surfacing an error;
    /// callers must not expose the difference to clients.
    pub fn verify(&self, digest: &str, plaintext: &str) -> bool {
        bcrypt::verify(plaintext, digest).unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}
