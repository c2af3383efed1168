//! User and admin accounts: registration, login, profile, principal lookup.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthError, JwtKeys};
use crate::domain::{Admin, NewUser, Principal, ProfileUpdate, Role, User};
use crate::error::AppError;
use crate::ports::{AccountRepository, RepositoryError};

/// Verified when the email is unknown so both failure paths cost a hash.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$kLq3W3bXbmqzxj2OZ4zqsHmpw+C7HYk1q7cPiAzU6nE";

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub asset_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Session<T: Serialize> {
    pub token: String,
    pub account: T,
}

#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
    keys: JwtKeys,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>, keys: JwtKeys) -> Self {
        Self { repo, keys }
    }

    /// Inputs are expected to be validated already.
    pub async fn register(&self, input: Registration) -> Result<Session<User>, AppError> {
        if self.repo.find_user_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(input.password).await?;
        let user = self
            .repo
            .insert_user(&NewUser {
                email: input.email,
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                asset_address: input.asset_address,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AppError::Conflict("User already exists".to_string()),
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        let token = self.keys.issue(user.id, Role::User)?;
        Ok(Session { token, account: user })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session<User>, AppError> {
        let user = self.repo.find_user_by_email(email).await?;
        let hash = user
            .as_ref()
            .map(|u| u.password_hash.clone())
            .unwrap_or_else(|| DUMMY_HASH.to_string());

        let valid = verify_password(password.to_string(), hash).await?;
        match user {
            Some(user) if valid => {
                let token = self.keys.issue(user.id, Role::User)?;
                Ok(Session { token, account: user })
            }
            _ => {
                tracing::warn!("User login rejected");
                Err(AuthError::InvalidCredentials.into())
            }
        }
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AppError> {
        self.repo
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<User, AppError> {
        if update.is_empty() {
            return self.profile(user_id).await;
        }
        self.repo
            .update_user(user_id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => AppError::NotFound("User not found".to_string()),
                other => other.into(),
            })
    }

    /// Bootstraps the first admin. Refused once any admin exists; the store
    /// decides atomically, so concurrent calls yield exactly one admin.
    pub async fn initialize_admin(
        &self,
        email: String,
        password: String,
    ) -> Result<Session<Admin>, AppError> {
        let password_hash = hash_password(password).await?;
        let admin = self
            .repo
            .insert_first_admin(&Admin::new(email, password_hash))
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    AppError::Conflict("Admin already initialized".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(admin_id = %admin.id, "Admin account initialized");
        let token = self.keys.issue(admin.id, Role::Admin)?;
        Ok(Session { token, account: admin })
    }

    pub async fn admin_login(&self, email: &str, password: &str) -> Result<Session<Admin>, AppError> {
        let admin = self.repo.find_admin_by_email(email).await?;
        let hash = admin
            .as_ref()
            .map(|a| a.password_hash.clone())
            .unwrap_or_else(|| DUMMY_HASH.to_string());

        let valid = verify_password(password.to_string(), hash).await?;
        let mut admin = match admin {
            Some(admin) if valid => admin,
            _ => {
                tracing::warn!("Admin login rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
        };
        if !admin.is_active {
            tracing::warn!(admin_id = %admin.id, "Deactivated admin attempted login");
            return Err(AuthError::Deactivated.into());
        }

        let now = Utc::now();
        self.repo.record_admin_login(admin.id, now).await?;
        admin.last_login = Some(now);
        admin.updated_at = now;

        let token = self.keys.issue(admin.id, Role::Admin)?;
        Ok(Session { token, account: admin })
    }

    /// Resolves a bearer token to a principal whose backing account still
    /// exists (and, for admins, is still active).
    pub async fn authenticate(&self, token: &str) -> Result<Principal, AppError> {
        let principal = self.keys.verify(token)?;

        let live = match principal.role {
            Role::User => self.repo.find_user_by_id(principal.id).await?.is_some(),
            Role::Admin => self
                .repo
                .find_admin_by_id(principal.id)
                .await?
                .map_or(false, |admin| admin.is_active),
        };

        if !live {
            return Err(AppError::Unauthorized(
                "Not authorized, account not found".to_string(),
            ));
        }
        Ok(principal)
    }
}
