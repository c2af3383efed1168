//! Bearer tokens and password hashing.

pub mod jwt;
pub mod password;

use thiserror::Error;

pub use jwt::{Claims, JwtKeys};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authorized, no token")]
    MissingToken,
    #[error("Not authorized, invalid token")]
    InvalidToken,
    #[error("Not authorized, token expired")]
    ExpiredToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is deactivated")]
    Deactivated,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("token encoding failed: {0}")]
    Encoding(String),
}
