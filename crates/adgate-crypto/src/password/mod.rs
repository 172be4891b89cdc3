//! Local credential hashing
//!
//! Credentials are stored as Argon2id PHC strings. The hasher also keeps a
//! placeholder hash computed at construction, so a lookup for an unknown user
//! can spend the same verification cost as a wrong password for a known one.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::RngCore;
use thiserror::Error;

const SALT_LEN: usize = 16;
const PLACEHOLDER_SECRET: &str = "adgate-placeholder-credential";

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Hashing failed: {0}")]
    HashingFailed(String),

    #[error("Malformed credential hash: {0}")]
    MalformedHash(String),

    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),
}

/// Argon2id hasher for local credentials
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    placeholder: String,
}

impl CredentialHasher {
    /// Hasher with the library's recommended Argon2id cost
    pub fn new() -> Result<Self, PasswordError> {
        Self::from_params(Params::DEFAULT)
    }

    /// Hasher with explicit memory (KiB), iteration and parallelism cost
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        Self::from_params(params)
    }

    fn from_params(params: Params) -> Result<Self, PasswordError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let placeholder = hash_with(&argon2, PLACEHOLDER_SECRET)?;
        Ok(Self {
            argon2,
            placeholder,
        })
    }

    /// Hash a secret into a PHC string with a fresh random salt
    pub fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, secret)
    }

    /// Verify a secret against a stored PHC string.
    ///
    /// A mismatch is `Ok(false)`; only unparseable hashes are errors.
    pub fn verify(&self, secret: &str, stored: &str) -> Result<bool, PasswordError> {
        let parsed =
            PasswordHash::new(stored).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        match self.argon2.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::HashingFailed(e.to_string())),
        }
    }

    /// Spend one verification against the placeholder hash. Always false.
    pub fn verify_placeholder(&self, secret: &str) -> bool {
        // The placeholder secret is public, so a match must not count
        let _ = self.verify(secret, &self.placeholder);
        false
    }
}

fn hash_with(argon2: &Argon2<'_>, secret: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let salt =
        SaltString::encode_b64(&salt).map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_hasher() -> CredentialHasher {
        CredentialHasher::with_cost(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash).unwrap());
        assert!(!hasher.verify("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let hasher = cheap_hasher();
        let first = hasher.hash("secret").unwrap();
        let second = hasher.hash("secret").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_hash() {
        let hasher = cheap_hasher();
        assert!(matches!(
            hasher.verify("secret", "not-a-phc-string"),
            Err(PasswordError::MalformedHash(_))
        ));
    }

    #[test]
    fn test_placeholder_never_matches() {
        let hasher = cheap_hasher();
        assert!(!hasher.verify_placeholder(PLACEHOLDER_SECRET));
        assert!(!hasher.verify_placeholder("anything"));
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            CredentialHasher::with_cost(1, 0, 0),
            Err(PasswordError::InvalidParams(_))
        ));
    }
}
