//! Postgres implementation of AccountRepository (users and admins).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Admin, NewUser, ProfileUpdate, Role, User};
use crate::ports::{AccountRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn insert_user(&self, input: &NewUser) -> RepositoryResult<User> {
        let user = User::new(input.clone());
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, asset_address,
                is_verified, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.asset_address)
        .bind(user.is_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map(UserRow::into_domain)
        .map_err(RepositoryError::from)
    }

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(row.map(UserRow::into_domain))
    }

    async fn find_user_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(row.map(UserRow::into_domain))
    }

    async fn update_user(&self, id: Uuid, update: &ProfileUpdate) -> RepositoryResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                asset_address = COALESCE($4, asset_address),
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.asset_address)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(UserRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    async fn insert_first_admin(&self, admin: &Admin) -> RepositoryResult<Admin> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent bootstraps; readers are not blocked.
        sqlx::query("LOCK TABLE admins IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, AdminRow>(
            r#"
            INSERT INTO admins (id, email, password_hash, is_active, last_login, created_at, updated_at)
            SELECT $1::uuid, $2::varchar, $3::text, $4::boolean, $5::timestamptz, $6::timestamptz, $7::timestamptz
            WHERE NOT EXISTS (SELECT 1 FROM admins)
            RETURNING *
            "#,
        )
        .bind(admin.id)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(admin.is_active)
        .bind(admin.last_login)
        .bind(admin.created_at)
        .bind(admin.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        row.map(AdminRow::into_domain)
            .ok_or_else(|| RepositoryError::Conflict("an admin already exists".to_string()))
    }

    async fn find_admin_by_email(&self, email: &str) -> RepositoryResult<Option<Admin>> {
        let row = sqlx::query_as::<_, AdminRow>("SELECT * FROM admins WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(row.map(AdminRow::into_domain))
    }

    async fn find_admin_by_id(&self, id: Uuid) -> RepositoryResult<Option<Admin>> {
        let row = sqlx::query_as::<_, AdminRow>("SELECT * FROM admins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(row.map(AdminRow::into_domain))
    }

    async fn record_admin_login(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<()> {
        let result =
            sqlx::query("UPDATE admins SET last_login = $2, updated_at = $2 WHERE id = $1")
                .bind(id)
                .bind(at)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("admin {}", id)));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    asset_address: Option<String>,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            asset_address: self.asset_address,
            is_verified: self.is_verified,
            role: Role::User,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    id: Uuid,
    email: String,
    password_hash: String,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AdminRow {
    fn into_domain(self) -> Admin {
        Admin {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            role: Role::Admin,
            is_active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
