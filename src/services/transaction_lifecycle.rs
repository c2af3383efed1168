//! Order lifecycle: quoting and creating orders, proofs, status workflow.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    BankDetails, NewTransaction, Page, PageRequest, PaymentMethod, PriceQuote, Principal, Quote,
    QuoteCalculator, StatusEntry, Transaction, TransactionFilter, TransactionStatus,
    TransactionType,
};
use crate::error::AppError;
use crate::ports::{RepositoryError, TransactionRepository};
use crate::services::pricing::PriceService;
use crate::services::proof_storage::{ProofStorage, ProofUpload};

/// Attempts at inserting an order before a reference collision is reported.
const CREATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub payment_window: Duration,
    /// Where buyers send fiat.
    pub platform_bank: BankDetails,
    /// Where sellers send the asset.
    pub platform_asset_address: String,
    pub strict_transitions: bool,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    Payment,
    Sell,
}

impl ProofKind {
    /// Multipart field carrying the file.
    pub fn field_name(&self) -> &'static str {
        match self {
            ProofKind::Payment => "paymentProof",
            ProofKind::Sell => "sellProof",
        }
    }
}

/// Response to a proof upload: the order plus a block keyed by proof kind.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofReceipt {
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_proof: Option<ProofDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_proof: Option<ProofDetails>,
}

impl ProofReceipt {
    pub fn new(kind: ProofKind, transaction: Transaction) -> Self {
        let url = transaction.payment_proof.clone().unwrap_or_default();
        let details = ProofDetails::for_transaction(kind, &transaction, url);
        let (payment_proof, sell_proof) = match kind {
            ProofKind::Payment => (Some(details), None),
            ProofKind::Sell => (None, Some(details)),
        };
        Self {
            transaction,
            payment_proof,
            sell_proof,
        }
    }
}

/// What the user is told after a proof upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofDetails {
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
    pub message: String,
    pub instructions: Vec<String>,
}

impl ProofDetails {
    pub fn for_transaction(kind: ProofKind, tx: &Transaction, url: String) -> Self {
        let asset = &tx.asset_symbol;
        let (message, instructions) = match kind {
            ProofKind::Payment => (
                format!(
                    "Thank you for uploading your payment receipt. Your payment will be verified and {} will be sent to your address.",
                    asset
                ),
                vec![
                    "Your bank payment will be verified".to_string(),
                    format!("Once verified, we will send {} to your address", asset),
                    "Please ensure the payment reference and amount are clearly visible in the receipt".to_string(),
                    "The receipt should show the bank account details you paid to".to_string(),
                ],
            ),
            ProofKind::Sell => (
                format!(
                    "Thank you for uploading your {} transaction hash. Your transfer will be verified and processed.",
                    asset
                ),
                vec![
                    format!("Your {} transfer will be verified", asset),
                    "Once verified, we will process your bank transfer".to_string(),
                    "You will receive the amount in your bank account after verification".to_string(),
                    "Please ensure the transaction hash is clearly visible in the screenshot".to_string(),
                ],
            ),
        };

        Self {
            url,
            uploaded_at: tx.updated_at,
            message,
            instructions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub payment_reference: String,
    pub payment_deadline: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_details: Option<BankDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_to_address: Option<String>,
    pub amount: BigDecimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_payout: Option<BigDecimal>,
    pub reference: String,
    pub deadline: DateTime<Utc>,
    pub instructions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub transaction: OrderSummary,
    pub amounts: Quote,
    pub current_rates: PriceQuote,
    pub payment_instructions: PaymentInstructions,
}

#[derive(Clone)]
pub struct TransactionLifecycle {
    repo: Arc<dyn TransactionRepository>,
    prices: PriceService,
    quotes: QuoteCalculator,
    storage: Arc<dyn ProofStorage>,
    config: LifecycleConfig,
}

impl TransactionLifecycle {
    pub fn new(
        repo: Arc<dyn TransactionRepository>,
        prices: PriceService,
        quotes: QuoteCalculator,
        storage: Arc<dyn ProofStorage>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            repo,
            prices,
            quotes,
            storage,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// BUY: the user pays fiat into the platform account and receives the
    /// asset at `asset_address`.
    pub async fn create_buy_order(
        &self,
        principal: &Principal,
        amount: BigDecimal,
        asset_address: String,
    ) -> Result<OrderReceipt, AppError> {
        let bank_details = self.config.platform_bank.clone();
        self.create_order(principal, TransactionType::Buy, amount, asset_address, bank_details)
            .await
    }

    /// SELL: the user sends the asset to the platform address and is paid
    /// out to `bank_details`.
    pub async fn create_sell_order(
        &self,
        principal: &Principal,
        amount: BigDecimal,
        bank_details: BankDetails,
    ) -> Result<OrderReceipt, AppError> {
        let address = self.config.platform_asset_address.clone();
        self.create_order(principal, TransactionType::Sell, amount, address, bank_details)
            .await
    }

    async fn create_order(
        &self,
        principal: &Principal,
        tx_type: TransactionType,
        amount: BigDecimal,
        asset_address: String,
        bank_details: BankDetails,
    ) -> Result<OrderReceipt, AppError> {
        if principal.is_admin() {
            return Err(AppError::Forbidden(
                "Only user accounts can place orders".to_string(),
            ));
        }
        // Bounds first: no oracle call for an order that cannot be placed.
        self.quotes.validate_amount(&amount)?;

        let snapshot = self.prices.current_price().await?;
        let quote = self.quotes.quote(&amount, tx_type, &snapshot.quote)?;

        let input = NewTransaction {
            user_id: principal.id,
            tx_type,
            asset_symbol: snapshot.quote.symbol.clone(),
            asset_amount: quote.stored_asset_amount(),
            fiat_amount: quote.stored_fiat_amount(),
            asset_address,
            payment_method: PaymentMethod::BankTransfer,
            bank_details,
            fees: quote.fees.clone(),
            payment_window: self.config.payment_window,
        };
        let tx = self.insert_with_fresh_reference(&input).await?;

        tracing::info!(
            transaction_id = %tx.id,
            user_id = %tx.user_id,
            tx_type = %tx.tx_type,
            reference = %tx.payment_reference,
            fiat_amount = %tx.fiat_amount,
            "Order created"
        );

        let payment_instructions = self.instructions_for(&tx, &quote);
        Ok(OrderReceipt {
            transaction: OrderSummary {
                id: tx.id,
                tx_type: tx.tx_type,
                status: tx.status,
                payment_reference: tx.payment_reference.clone(),
                payment_deadline: tx.payment_deadline,
            },
            amounts: quote,
            current_rates: snapshot.quote,
            payment_instructions,
        })
    }

    async fn insert_with_fresh_reference(
        &self,
        input: &NewTransaction,
    ) -> Result<Transaction, AppError> {
        let mut attempt = 1;
        loop {
            match self.repo.create(input).await {
                Ok(tx) => return Ok(tx),
                Err(RepositoryError::Conflict(msg)) if attempt < CREATE_ATTEMPTS => {
                    tracing::warn!(attempt, error = %msg, "Payment reference collision, regenerating");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn instructions_for(&self, tx: &Transaction, quote: &Quote) -> PaymentInstructions {
        let deadline = tx.payment_deadline.format("%Y-%m-%d %H:%M UTC");
        match tx.tx_type {
            TransactionType::Buy => PaymentInstructions {
                bank_details: Some(tx.bank_details.clone()),
                send_to_address: None,
                amount: quote.total.ngn.clone(),
                currency: "NGN".to_string(),
                expected_payout: None,
                reference: tx.payment_reference.clone(),
                deadline: tx.payment_deadline,
                instructions: vec![
                    format!(
                        "Transfer exactly NGN {} to the bank account above",
                        quote.total.ngn
                    ),
                    format!(
                        "Use {} as the payment reference/narration",
                        tx.payment_reference
                    ),
                    "Upload your payment receipt as proof of payment".to_string(),
                    format!("Complete the payment before {}", deadline),
                ],
            },
            TransactionType::Sell => PaymentInstructions {
                bank_details: None,
                send_to_address: Some(tx.asset_address.clone()),
                amount: quote.base.asset.clone(),
                currency: tx.asset_symbol.clone(),
                expected_payout: Some(quote.total.ngn.clone()),
                reference: tx.payment_reference.clone(),
                deadline: tx.payment_deadline,
                instructions: vec![
                    format!(
                        "Send exactly {} {} to {}",
                        quote.base.asset, tx.asset_symbol, tx.asset_address
                    ),
                    format!(
                        "Include {} in the transaction memo if your wallet supports it",
                        tx.payment_reference
                    ),
                    "Upload a screenshot of the transaction hash as proof".to_string(),
                    format!(
                        "NGN {} will be paid to your bank account once the transfer is confirmed",
                        quote.total.ngn
                    ),
                    format!("Complete the transfer before {}", deadline),
                ],
            },
        }
    }

    /// Admins see every order; users only their own.
    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<Transaction, AppError> {
        let tx = self.repo.get_by_id(id).await.map_err(not_found)?;
        if !principal.is_admin() && !tx.is_owned_by(principal.id) {
            return Err(AppError::Forbidden(
                "Not authorized to access this transaction".to_string(),
            ));
        }
        Ok(tx)
    }

    /// The file is only stored once the order exists, belongs to the caller
    /// and matches the proof kind.
    pub async fn attach_proof(
        &self,
        principal: &Principal,
        id: Uuid,
        kind: ProofKind,
        upload: ProofUpload,
    ) -> Result<Transaction, AppError> {
        upload.check(self.config.max_upload_bytes)?;

        let tx = self.get(principal, id).await?;
        if kind == ProofKind::Sell && tx.tx_type != TransactionType::Sell {
            return Err(AppError::BadRequest(
                "This is not a sell transaction".to_string(),
            ));
        }

        let url = self.storage.store(&upload).await?;
        let updated = match self.repo.attach_proof(id, &url).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_proof(&url).await;
                return Err(not_found(e));
            }
        };

        if let Some(previous) = tx.payment_proof.as_deref().filter(|p| *p != url) {
            self.discard_proof(previous).await;
        }

        tracing::info!(transaction_id = %id, kind = ?kind, "Payment proof attached");
        Ok(updated)
    }

    async fn discard_proof(&self, url: &str) {
        if let Err(e) = self.storage.remove(url).await {
            tracing::warn!(url = %url, error = %e, "Failed to remove payment proof");
        }
    }

    /// Admin operation. With strict transitions on, only moves allowed by
    /// the workflow table are accepted.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
        note: Option<String>,
    ) -> Result<Transaction, AppError> {
        let current = self.repo.get_by_id(id).await.map_err(not_found)?;

        if self.config.strict_transitions && !current.status.can_transition_to(status) {
            return Err(AppError::InvalidTransition {
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        let updated = self
            .repo
            .append_status(id, current.status, StatusEntry::now(status, note))
            .await
            .map_err(not_found)?;

        tracing::info!(
            transaction_id = %id,
            from = %current.status,
            to = %status,
            "Transaction status updated"
        );
        Ok(updated)
    }

    pub async fn list_mine(
        &self,
        principal: &Principal,
        page: PageRequest,
    ) -> Result<Page<Transaction>, AppError> {
        Ok(self
            .repo
            .list(&TransactionFilter::for_user(principal.id), page)
            .await?)
    }

    pub async fn list_all(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<Transaction>, AppError> {
        Ok(self.repo.list(filter, page).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let tx = self.repo.get_by_id(id).await.map_err(not_found)?;
        self.repo.delete(id).await.map_err(not_found)?;
        if let Some(proof) = tx.payment_proof.as_deref() {
            self.discard_proof(proof).await;
        }
        tracing::info!(transaction_id = %id, "Transaction deleted");
        Ok(())
    }
}

fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound(_) => AppError::NotFound("Transaction not found".to_string()),
        other => other.into(),
    }
}
