//! In-process implementations of the repository ports.
//!
//! Same contract as the Postgres adapters; each mutation runs under a single
//! write lock, so status and proof updates are atomic per record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Admin, CryptoPrice, NewTransaction, NewUser, Page, PageRequest, ProfileUpdate, StatusEntry,
    Transaction, TransactionFilter, TransactionStatus, User,
};
use crate::ports::{
    AccountRepository, PriceRepository, RepositoryError, RepositoryResult, TransactionRepository,
};

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    // insertion order; newest last
    records: RwLock<Vec<Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

fn not_found(id: Uuid) -> RepositoryError {
    RepositoryError::NotFound(format!("transaction {}", id))
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn create(&self, input: &NewTransaction) -> RepositoryResult<Transaction> {
        let tx = Transaction::new(input.clone());
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|existing| existing.payment_reference == tx.payment_reference)
        {
            return Err(RepositoryError::Conflict(format!(
                "payment reference {} already exists",
                tx.payment_reference
            )));
        }
        records.push(tx.clone());
        Ok(tx)
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.records
            .read()
            .await
            .iter()
            .find(|tx| tx.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Transaction>> {
        let records = self.records.read().await;
        let mut matching: Vec<&Transaction> =
            records.iter().rev().filter(|tx| filter.matches(tx)).collect();
        // stable: equal timestamps keep newest-inserted first
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(Page { items, total })
    }

    async fn append_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        entry: StatusEntry,
    ) -> RepositoryResult<Transaction> {
        let mut records = self.records.write().await;
        let tx = records
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or_else(|| not_found(id))?;

        if tx.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "transaction {} is {}, expected {}",
                id, tx.status, expected
            )));
        }

        tx.apply_status(entry);
        Ok(tx.clone())
    }

    async fn attach_proof(&self, id: Uuid, proof_url: &str) -> RepositoryResult<Transaction> {
        let mut records = self.records.write().await;
        let tx = records
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or_else(|| not_found(id))?;

        tx.payment_proof = Some(proof_url.to_string());
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|tx| tx.id != id);
        if records.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPriceRepository {
    snapshots: RwLock<Vec<CryptoPrice>>,
}

impl InMemoryPriceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl PriceRepository for InMemoryPriceRepository {
    async fn insert(&self, snapshot: &CryptoPrice) -> RepositoryResult<CryptoPrice> {
        self.snapshots.write().await.push(snapshot.clone());
        Ok(snapshot.clone())
    }

    async fn latest(&self, limit: u32) -> RepositoryResult<Vec<CryptoPrice>> {
        Ok(self
            .snapshots
            .read()
            .await
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryAccountRepository {
    users: RwLock<HashMap<Uuid, User>>,
    admins: RwLock<HashMap<Uuid, Admin>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook for the deactivated-admin path; there is no API for it.
    pub async fn set_admin_active(&self, id: Uuid, active: bool) -> RepositoryResult<()> {
        let mut admins = self.admins.write().await;
        let admin = admins
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("admin {}", id)))?;
        admin.is_active = active;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn insert_user(&self, input: &NewUser) -> RepositoryResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == input.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} already registered",
                input.email
            )));
        }
        let user = User::new(input.clone());
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn update_user(&self, id: Uuid, update: &ProfileUpdate) -> RepositoryResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
        update.apply(user);
        Ok(user.clone())
    }

    async fn insert_first_admin(&self, admin: &Admin) -> RepositoryResult<Admin> {
        let mut admins = self.admins.write().await;
        if !admins.is_empty() {
            return Err(RepositoryError::Conflict(
                "an admin already exists".to_string(),
            ));
        }
        admins.insert(admin.id, admin.clone());
        Ok(admin.clone())
    }

    async fn find_admin_by_email(&self, email: &str) -> RepositoryResult<Option<Admin>> {
        Ok(self
            .admins
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_admin_by_id(&self, id: Uuid) -> RepositoryResult<Option<Admin>> {
        Ok(self.admins.read().await.get(&id).cloned())
    }

    async fn record_admin_login(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<()> {
        let mut admins = self.admins.write().await;
        let admin = admins
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("admin {}", id)))?;
        admin.last_login = Some(at);
        admin.updated_at = at;
        Ok(())
    }
}
