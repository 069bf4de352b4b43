//! Customer and staff authentication.
//!
//! Passwords are hashed with Argon2id. Sessions are stateless bearer
//! tokens (see [`TokenSigner`]); the role is read from the database on
//! every request so demoting an admin takes effect immediately.

mod extract;
mod token;

pub use extract::{AdminUser, CurrentUser};
pub use token::{IssuedToken, TokenSigner, DEFAULT_TOKEN_TTL_DAYS};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::{RepositoryError, UserRepository};
use crate::domain::aggregates::user::normalize_email;
use crate::domain::aggregates::{User, UserRole};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Registration and login on top of [`UserRepository`].
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: &'a TokenSigner,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, tokens: &'a TokenSigner) -> Self {
        Self { users: UserRepository::new(pool), tokens }
    }

    pub async fn register(&self, email: &str, name: &str, password: &str) -> Result<(User, IssuedToken), AuthError> {
        let user = self.create_user(email, name, password, UserRole::Customer).await?;
        tracing::info!(user_id = %user.id, "Customer registered");
        let token = self.tokens.issue(user.id, Utc::now());
        Ok((user, token))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(User, IssuedToken), AuthError> {
        let (user, hash) = self
            .users
            .get_with_password(&normalize_email(email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &hash)?;
        let token = self.tokens.issue(user.id, Utc::now());
        Ok((user, token))
    }

    /// Creates the configured admin account on first start; an existing
    /// account with that email is left untouched.
    pub async fn ensure_admin(&self, email: &str, name: &str, password: &str) -> Result<(), AuthError> {
        if self.users.get_with_password(&normalize_email(email)).await?.is_some() {
            return Ok(());
        }
        let user = self.create_user(email, name, password, UserRole::Admin).await?;
        tracing::info!(user_id = %user.id, "Bootstrap admin created");
        Ok(())
    }

    async fn create_user(&self, email: &str, name: &str, password: &str, role: UserRole) -> Result<User, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }
        let hash = hash_password(password)?;
        self.users
            .create(&normalize_email(email), name.trim(), &hash, role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })
    }
}
