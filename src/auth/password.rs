use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use super::AuthError;

/// Argon2id PHC string. CPU-heavy; runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(e.to_string()))?
}

/// False for a wrong password and for an unparseable stored hash.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&hash) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| AuthError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("Str0ng!Pass".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Str0ng!Pass".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_never_verifies() {
        assert!(!verify_password("x".to_string(), "not-a-hash".to_string())
            .await
            .unwrap());
    }
}
