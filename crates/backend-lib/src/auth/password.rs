// ============================
// backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};

use crate::error::AppError;

/// Salt size in bytes
const SALT_BYTES: usize = 16;

/// Hashed once at construction; unknown-user logins are verified against it
const DUMMY_PASSWORD: &str = "timing-equaliser";

/// Salted one-way hashing of passwords with a fixed scrypt cost
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    dummy_hash: String,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("log_n", &self.params.log_n())
            .finish_non_exhaustive()
    }
}

impl CredentialHasher {
    /// Create a hasher with cost `2^log_n`
    pub fn new(log_n: u8) -> Result<Self, AppError> {
        let params = Params::new(
            log_n,
            Params::RECOMMENDED_R,
            Params::RECOMMENDED_P,
            Params::RECOMMENDED_LEN,
        )
        .map_err(|e| AppError::Internal(format!("invalid scrypt parameters: {e}")))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(hasher)
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, plain: &str) -> Result<String, AppError> {
        let salt_bytes: [u8; SALT_BYTES] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Internal(format!("salt encoding failed: {e}")))?;
        let hash = Scrypt
            .hash_password_customized(plain.as_bytes(), None, None, self.params, &salt)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
            .to_string();
        Ok(hash)
    }

    /// Verify a password against a stored hash. Malformed hashes never match.
    pub fn verify(&self, plain: &str, secret: &str) -> bool {
        let parsed_hash = match PasswordHash::new(secret) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
    }

    /// Spend the same work as a real verification and report a mismatch
    pub fn verify_unknown_user(&self, plain: &str) -> bool {
        let _ = self.verify(plain, &self.dummy_hash);
        false
    }

    /// [`Self::hash`] on the blocking pool
    pub async fn hash_blocking(&self, plain: String) -> Result<String, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain)).await?
    }

    /// [`Self::verify`] on the blocking pool
    pub async fn verify_blocking(&self, plain: String, secret: String) -> Result<bool, AppError> {
        let hasher = self.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&plain, &secret)).await?)
    }

    /// [`Self::verify_unknown_user`] on the blocking pool
    pub async fn verify_unknown_user_blocking(&self, plain: String) -> Result<bool, AppError> {
        let hasher = self.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.verify_unknown_user(&plain)).await?)
    }
}
