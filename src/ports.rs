//! Repository ports. Adapters in `crate::adapters` implement these against
//! Postgres or process memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Admin, CryptoPrice, NewTransaction, NewUser, Page, PageRequest, ProfileUpdate, StatusEntry,
    Transaction, TransactionFilter, TransactionStatus, User,
};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("stored data is invalid: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Assigns id, payment reference and deadline, and seeds the status
    /// history. A reference collision is reported as `Conflict`.
    async fn create(&self, input: &NewTransaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    /// Newest first.
    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Transaction>>;

    /// Compare-and-set on the status: applies only while the stored status is
    /// still `expected`, otherwise `Conflict`. Appends exactly one entry.
    async fn append_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        entry: StatusEntry,
    ) -> RepositoryResult<Transaction>;

    /// Overwrites any earlier proof. Does not touch the status history.
    async fn attach_proof(&self, id: Uuid, proof_url: &str) -> RepositoryResult<Transaction>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<()>;
}

#[async_trait]
pub trait PriceRepository: Send + Sync {
    async fn insert(&self, snapshot: &CryptoPrice) -> RepositoryResult<CryptoPrice>;

    /// Newest first.
    async fn latest(&self, limit: u32) -> RepositoryResult<Vec<CryptoPrice>>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Duplicate email is `Conflict`.
    async fn insert_user(&self, input: &NewUser) -> RepositoryResult<User>;

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>>;

    async fn update_user(&self, id: Uuid, update: &ProfileUpdate) -> RepositoryResult<User>;

    /// Inserts only while no admin exists. Otherwise `Conflict`, also when
    /// another bootstrap wins a concurrent race.
    async fn insert_first_admin(&self, admin: &Admin) -> RepositoryResult<Admin>;

    async fn find_admin_by_email(&self, email: &str) -> RepositoryResult<Option<Admin>>;

    async fn find_admin_by_id(&self, id: Uuid) -> RepositoryResult<Option<Admin>>;

    async fn record_admin_login(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<()>;
}
