//! Transaction domain entity.
//! Framework-agnostic representation of a buy/sell order and its status workflow.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::quote::FeeBreakdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingPayment,
    PaymentReceived,
    Processing,
    Completed,
    Cancelled,
    Failed,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::PendingPayment,
        TransactionStatus::PaymentReceived,
        TransactionStatus::Processing,
        TransactionStatus::Completed,
        TransactionStatus::Cancelled,
        TransactionStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::PendingPayment => "pending_payment",
            TransactionStatus::PaymentReceived => "payment_received",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled | TransactionStatus::Failed
        )
    }

    /// Legal successors in the order workflow. Terminal states have none.
    pub fn successors(&self) -> &'static [TransactionStatus] {
        use TransactionStatus::*;
        match self {
            PendingPayment => &[PaymentReceived, Cancelled, Failed],
            PaymentReceived => &[Processing, Failed],
            Processing => &[Completed, Failed],
            Completed | Cancelled | Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        TransactionStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown transaction status '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(format!("unsupported payment method '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swift_code: Option<String>,
}

/// One entry of the append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StatusEntry {
    pub fn now(status: TransactionStatus, note: Option<String>) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            note,
        }
    }
}

/// Human-readable payment reference: `<SYMBOL>-<unix millis>-<9 base36 chars>`.
pub fn generate_payment_reference(symbol: &str, at: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!(
        "{}-{}-{}",
        symbol.to_ascii_uppercase(),
        at.timestamp_millis(),
        suffix
    )
}

/// Everything the lifecycle decides before the store assigns identity.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub asset_symbol: String,
    pub asset_amount: BigDecimal,
    pub fiat_amount: BigDecimal,
    pub asset_address: String,
    pub payment_method: PaymentMethod,
    pub bank_details: BankDetails,
    pub fees: FeeBreakdown,
    pub payment_window: Duration,
}

/// Domain entity representing an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub asset_symbol: String,
    /// BUY: base amount plus fee. SELL: base amount.
    pub asset_amount: BigDecimal,
    /// Settlement-currency amount. BUY: total owed. SELL: net payout.
    pub fiat_amount: BigDecimal,
    pub asset_address: String,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub bank_details: BankDetails,
    pub payment_reference: String,
    pub payment_deadline: DateTime<Utc>,
    pub payment_proof: Option<String>,
    pub fees: FeeBreakdown,
    pub status_history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(input: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            tx_type: input.tx_type,
            payment_reference: generate_payment_reference(&input.asset_symbol, now),
            asset_symbol: input.asset_symbol,
            asset_amount: input.asset_amount,
            fiat_amount: input.fiat_amount,
            asset_address: input.asset_address,
            payment_method: input.payment_method,
            status: TransactionStatus::PendingPayment,
            bank_details: input.bank_details,
            payment_deadline: now + input.payment_window,
            payment_proof: None,
            fees: input.fees,
            status_history: vec![StatusEntry {
                status: TransactionStatus::PendingPayment,
                timestamp: now,
                note: Some("Transaction created".to_string()),
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Status change plus its history entry. Never touches earlier entries.
    pub fn apply_status(&mut self, entry: StatusEntry) {
        self.status = entry.status;
        self.updated_at = entry.timestamp;
        self.status_history.push(entry);
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    pub tx_type: Option<TransactionType>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.user_id.map_or(true, |id| tx.user_id == id)
            && self.status.map_or(true, |s| tx.status == s)
            && self.tx_type.map_or(true, |t| tx.tx_type == t)
            && self.start_date.map_or(true, |d| tx.created_at >= d)
            && self.end_date.map_or(true, |d| tx.created_at <= d)
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
