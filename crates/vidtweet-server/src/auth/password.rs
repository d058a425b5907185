use std::fmt;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

/// Salted Argon2id hash in PHC format. Not interchangeable with bcrypt hashes.
///
/// Runs on the blocking pool so request workers are not held up.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| AppError::Unexpected(e.into()))?
}

/// `false` on mismatch; an error only for a malformed stored hash.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    tokio::task::spawn_blocking(move || verify_blocking(&password, &password_hash))
        .await
        .map_err(|e| AppError::Unexpected(e.into()))?
}

fn hash_blocking(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Unexpected(anyhow::anyhow!("Failed to hash password: {}", e)))
}

fn verify_blocking(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Unexpected(anyhow::anyhow!("Invalid password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Unexpected(anyhow::anyhow!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Password field of a user record.
///
/// Loaded records carry `Hashed`; registration and password changes set
/// `Changed`. Every write path calls [`Password::hash_for_storage`], which
/// hashes only a changed password, so a saved hash is never hashed twice.
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    Hashed(String),
    Changed(String),
}

impl Password {
    pub fn is_changed(&self) -> bool {
        matches!(self, Password::Changed(_))
    }

    /// Returns the value to persist, hashing (and remembering) a changed password.
    pub async fn hash_for_storage(&mut self) -> Result<String, AppError> {
        let hash = match self {
            Password::Hashed(hash) => return Ok(hash.clone()),
            Password::Changed(plain) => hash_password(plain).await?,
        };
        *self = Password::Hashed(hash.clone());
        Ok(hash)
    }

    pub async fn verify(&self, candidate: &str) -> Result<bool, AppError> {
        match self {
            Password::Hashed(hash) => verify_password(candidate, hash).await,
            Password::Changed(plain) => Ok(plain == candidate),
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Password::Hashed(_) => f.write_str("Password::Hashed(..)"),
            Password::Changed(_) => f.write_str("Password::Changed(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_round_trip() {
        let hash = hash_password("secret").await.unwrap();
        assert_ne!(hash, "secret");
        assert!(verify_password("secret", &hash).await.unwrap());
        assert!(!verify_password("Secret", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn hashes_are_salted() {
        let a = hash_password("secret").await.unwrap();
        let b = hash_password("secret").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        assert!(verify_password("secret", "not-a-phc-string").await.is_err());
    }

    #[tokio::test]
    async fn changed_password_is_hashed_once() {
        let mut password = Password::Changed("secret".to_string());
        let stored = password.hash_for_storage().await.unwrap();
        assert!(!password.is_changed());
        assert_ne!(stored, "secret");

        // A second save must keep the existing hash untouched.
        let again = password.hash_for_storage().await.unwrap();
        assert_eq!(stored, again);
        assert!(password.verify("secret").await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_leaves_the_runtime_free() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        tokio::spawn(async move {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        });

        hash_password("secret").await.unwrap();
        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn debug_output_is_redacted() {
        let password = Password::Changed("hunter2".to_string());
        assert!(!format!("{password:?}").contains("hunter2"));
    }
}
