//! Argon2id password hashing.
//!
//! Digests are PHC strings (`$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`), so the cost
//! parameters travel with each digest and verification needs no configuration. Raising the
//! cost later only affects new digests; old ones keep verifying with the cost they embed.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{error, warn};

pub const DEFAULT_ITERATIONS: u32 = 2;
pub const DEFAULT_MEMORY_KIB: u32 = 19 * 1024;
const PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hashing parameters: {0}")]
    Params(argon2::Error),
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Salted, self-describing password hashing with a configurable work factor.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// Build a hasher with the given Argon2 time and memory cost.
    ///
    /// # Errors
    /// Returns an error if Argon2 rejects the parameters (for example zero iterations).
    pub fn new(iterations: u32, memory_kib: u32) -> Result<Self, HashError> {
        let params =
            Params::new(memory_kib, iterations, PARALLELISM, None).map_err(HashError::Params)?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if Argon2 fails to produce a digest.
    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(HashError::Hash)
    }

    /// Check a plaintext password against a stored digest.
    ///
    /// Malformed digests never error; they simply do not match. The digest comparison is
    /// constant-time and uses the cost parameters embedded in `digest`.
    #[must_use]
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Stored password digest is malformed: {err}");
                return false;
            }
        };

        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// [`Self::hash`] on the blocking pool, keeping the async workers free.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the blocking task panics.
    pub async fn hash_blocking(&self, plaintext: String) -> Result<String, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await?
    }

    /// [`Self::verify`] on the blocking pool. A failed task counts as a mismatch.
    pub async fn verify_blocking(&self, plaintext: String, digest: String) -> bool {
        let hasher = self.clone();
        match tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest)).await {
            Ok(matches) => matches,
            Err(err) => {
                error!("Password verification task failed: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn fast_hasher() -> PasswordHasher {
    PasswordHasher {
        params: Params::new(64, 1, 1, None).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_matches_only_the_original_password() -> anyhow::Result<()> {
        let hasher = fast_hasher();
        let digest = hasher.hash("Secret123")?;

        assert!(hasher.verify("Secret123", &digest));
        assert!(!hasher.verify("Secret124", &digest));
        assert!(!hasher.verify("", &digest));
        Ok(())
    }

    #[test]
    fn same_password_hashes_to_distinct_digests() -> anyhow::Result<()> {
        let hasher = fast_hasher();
        let first = hasher.hash("Secret123")?;
        let second = hasher.hash("Secret123")?;

        assert_ne!(first, second);
        assert!(hasher.verify("Secret123", &first));
        assert!(hasher.verify("Secret123", &second));
        Ok(())
    }

    #[test]
    fn digest_embeds_cost_parameters() -> anyhow::Result<()> {
        let digest = fast_hasher().hash("Secret123")?;
        assert!(digest.starts_with("$argon2id$v=19$"));
        assert!(digest.contains("m=64,t=1,p=1"));

        // A hasher with a different configured cost still verifies the older digest.
        let stronger = PasswordHasher::new(3, 128)?;
        assert!(stronger.verify("Secret123", &digest));
        Ok(())
    }

    #[test]
    fn malformed_digest_is_a_mismatch() {
        let hasher = fast_hasher();
        assert!(!hasher.verify("Secret123", "not-a-digest"));
        assert!(!hasher.verify("Secret123", ""));
        assert!(!hasher.verify("Secret123", "$argon2id$v=19$m=64,t=1,p=1$tooshort"));
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            PasswordHasher::new(0, DEFAULT_MEMORY_KIB),
            Err(HashError::Params(_))
        ));
    }

    #[tokio::test]
    async fn blocking_wrappers_round_trip() -> anyhow::Result<()> {
        let hasher = fast_hasher();
        let digest = hasher.hash_blocking("Secret123".to_string()).await?;

        assert!(
            hasher
                .verify_blocking("Secret123".to_string(), digest.clone())
                .await
        );
        assert!(!hasher.verify_blocking("nope".to_string(), digest).await);
        Ok(())
    }
}
