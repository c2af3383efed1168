//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::{
    BankDetails, CurrencyAmounts, FeeBreakdown, NewTransaction, Page, PageRequest, StatusEntry,
    Transaction, TransactionFilter, TransactionStatus,
};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const COLUMNS: &str = r#"
    id, user_id, tx_type, asset_symbol, asset_amount, fiat_amount, asset_address,
    payment_method, status, bank_account_name, bank_account_number, bank_name,
    bank_branch_code, bank_swift_code, payment_reference, payment_deadline, payment_proof,
    fee_percentage, fee_asset, fee_ngn, fee_usd, fee_eur, fee_gbp, status_history,
    created_at, updated_at
"#;

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(Transaction::try_from).transpose()
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(tx_type) = filter.tx_type {
        builder.push(" AND tx_type = ").push_bind(tx_type.as_str());
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND created_at >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND created_at <= ").push_bind(end);
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn create(&self, input: &NewTransaction) -> RepositoryResult<Transaction> {
        let tx = Transaction::new(input.clone());
        let fees = &tx.fees;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, user_id, tx_type, asset_symbol, asset_amount, fiat_amount, asset_address,
                payment_method, status, bank_account_name, bank_account_number, bank_name,
                bank_branch_code, bank_swift_code, payment_reference, payment_deadline,
                payment_proof, fee_percentage, fee_asset, fee_ngn, fee_usd, fee_eur, fee_gbp,
                status_history, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
            )
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(tx.id)
        .bind(tx.user_id)
        .bind(tx.tx_type.as_str())
        .bind(&tx.asset_symbol)
        .bind(&tx.asset_amount)
        .bind(&tx.fiat_amount)
        .bind(&tx.asset_address)
        .bind(tx.payment_method.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.bank_details.account_name)
        .bind(&tx.bank_details.account_number)
        .bind(&tx.bank_details.bank_name)
        .bind(&tx.bank_details.branch_code)
        .bind(&tx.bank_details.swift_code)
        .bind(&tx.payment_reference)
        .bind(tx.payment_deadline)
        .bind(&tx.payment_proof)
        .bind(&fees.percentage)
        .bind(&fees.amounts.asset)
        .bind(&fees.amounts.ngn)
        .bind(&fees.amounts.usd)
        .bind(&fees.amounts.eur)
        .bind(&fees.amounts.gbp)
        .bind(Json(&tx.status_history))
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Transaction::try_from(row)
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.fetch(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Transaction>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        push_filters(&mut count, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM transactions", COLUMNS));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let items = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn append_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        entry: StatusEntry,
    ) -> RepositoryResult<Transaction> {
        // Single statement: the status guard and the history append commit together.
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $3,
                status_history = status_history || $4::jsonb,
                updated_at = $5
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(entry.status.as_str())
        .bind(Json(vec![&entry]))
        .bind(entry.timestamp)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(row) => Transaction::try_from(row),
            None => match self.fetch(id).await? {
                None => Err(RepositoryError::NotFound(format!("transaction {}", id))),
                Some(current) => Err(RepositoryError::Conflict(format!(
                    "transaction {} is {}, expected {}",
                    id, current.status, expected
                ))),
            },
        }
    }

    async fn attach_proof(&self, id: Uuid, proof_url: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE transactions SET payment_proof = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(proof_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(Transaction::try_from)
            .transpose()?
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    tx_type: String,
    asset_symbol: String,
    asset_amount: BigDecimal,
    fiat_amount: BigDecimal,
    asset_address: String,
    payment_method: String,
    status: String,
    bank_account_name: String,
    bank_account_number: String,
    bank_name: String,
    bank_branch_code: Option<String>,
    bank_swift_code: Option<String>,
    payment_reference: String,
    payment_deadline: DateTime<Utc>,
    payment_proof: Option<String>,
    fee_percentage: BigDecimal,
    fee_asset: BigDecimal,
    fee_ngn: BigDecimal,
    fee_usd: BigDecimal,
    fee_eur: BigDecimal,
    fee_gbp: BigDecimal,
    status_history: Json<Vec<StatusEntry>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |e: String| RepositoryError::Corrupt(format!("transaction {}: {}", id, e));

        let tx_type = row.tx_type.parse().map_err(corrupt)?;
        let status = row.status.parse().map_err(corrupt)?;
        let payment_method = row.payment_method.parse().map_err(corrupt)?;
        let status_history = row.status_history.0;
        if status_history.is_empty() {
            return Err(corrupt("empty status history".to_string()));
        }

        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            tx_type,
            asset_symbol: row.asset_symbol,
            asset_amount: row.asset_amount,
            fiat_amount: row.fiat_amount,
            asset_address: row.asset_address,
            payment_method,
            status,
            bank_details: BankDetails {
                account_name: row.bank_account_name,
                account_number: row.bank_account_number,
                bank_name: row.bank_name,
                branch_code: row.bank_branch_code,
                swift_code: row.bank_swift_code,
            },
            payment_reference: row.payment_reference,
            payment_deadline: row.payment_deadline,
            payment_proof: row.payment_proof,
            fees: FeeBreakdown {
                percentage: row.fee_percentage,
                amounts: CurrencyAmounts {
                    asset: row.fee_asset,
                    ngn: row.fee_ngn,
                    usd: row.fee_usd,
                    eur: row.fee_eur,
                    gbp: row.fee_gbp,
                },
            },
            status_history,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
