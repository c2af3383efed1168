//! Quote calculation: base amount + live prices -> amount/fee/total per currency.
//!
//! Pure arithmetic on `BigDecimal`. Products and the `/ 100` are exact, so no
//! rounding happens anywhere in here.

use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;
use thiserror::Error;

use crate::domain::price::PriceQuote;
use crate::domain::transaction::TransactionType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyAmounts {
    /// Units of the base asset.
    pub asset: BigDecimal,
    pub ngn: BigDecimal,
    pub usd: BigDecimal,
    pub eur: BigDecimal,
    pub gbp: BigDecimal,
}

impl CurrencyAmounts {
    pub fn zero() -> Self {
        Self {
            asset: BigDecimal::zero(),
            ngn: BigDecimal::zero(),
            usd: BigDecimal::zero(),
            eur: BigDecimal::zero(),
            gbp: BigDecimal::zero(),
        }
    }

    fn map(&self, f: impl Fn(&BigDecimal) -> BigDecimal) -> Self {
        Self {
            asset: f(&self.asset),
            ngn: f(&self.ngn),
            usd: f(&self.usd),
            eur: f(&self.eur),
            gbp: f(&self.gbp),
        }
    }

    fn zip(&self, other: &Self, f: impl Fn(&BigDecimal, &BigDecimal) -> BigDecimal) -> Self {
        Self {
            asset: f(&self.asset, &other.asset),
            ngn: f(&self.ngn, &other.ngn),
            usd: f(&self.usd, &other.usd),
            eur: f(&self.eur, &other.eur),
            gbp: f(&self.gbp, &other.gbp),
        }
    }
}

/// Fee snapshot. The percentage is copied in at creation so later changes to
/// the configured rate never touch existing orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    pub percentage: BigDecimal,
    #[serde(flatten)]
    pub amounts: CurrencyAmounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    #[serde(skip)]
    pub direction: TransactionType,
    pub base: CurrencyAmounts,
    pub fees: FeeBreakdown,
    pub total: CurrencyAmounts,
}

#[derive(Debug, Clone)]
pub struct QuoteConfig {
    pub fee_percentage: BigDecimal,
    pub min_amount: BigDecimal,
    pub max_amount: BigDecimal,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            fee_percentage: BigDecimal::new(15.into(), 1),
            min_amount: BigDecimal::from(1),
            max_amount: BigDecimal::from(10_000),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("amount must be between {min} and {max}")]
    AmountOutOfRange { min: BigDecimal, max: BigDecimal },
    #[error("price for {0} is missing or not positive")]
    InvalidPrice(&'static str),
}

#[derive(Debug, Clone)]
pub struct QuoteCalculator {
    config: QuoteConfig,
}

impl QuoteCalculator {
    pub fn new(config: QuoteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuoteConfig {
        &self.config
    }

    pub fn validate_amount(&self, amount: &BigDecimal) -> Result<(), QuoteError> {
        if amount < &self.config.min_amount || amount > &self.config.max_amount {
            return Err(QuoteError::AmountOutOfRange {
                min: self.config.min_amount.clone(),
                max: self.config.max_amount.clone(),
            });
        }
        Ok(())
    }

    /// BUY totals are amount + fee (buyer pays more); SELL totals are
    /// amount - fee (seller receives less).
    pub fn quote(
        &self,
        amount: &BigDecimal,
        direction: TransactionType,
        prices: &PriceQuote,
    ) -> Result<Quote, QuoteError> {
        self.validate_amount(amount)?;
        for (currency, price) in prices.quotable_prices() {
            if price <= &BigDecimal::zero() {
                return Err(QuoteError::InvalidPrice(currency));
            }
        }

        let base = CurrencyAmounts {
            asset: amount.clone(),
            ngn: amount * &prices.ngn,
            usd: amount * &prices.usd,
            eur: amount * &prices.eur,
            gbp: amount * &prices.gbp,
        };

        let hundred = BigDecimal::from(100);
        let pct = &self.config.fee_percentage;
        let fee_amounts = base.map(|value| value * pct / &hundred);

        let total = match direction {
            TransactionType::Buy => base.zip(&fee_amounts, |a, f| a + f),
            TransactionType::Sell => base.zip(&fee_amounts, |a, f| a - f),
        };

        Ok(Quote {
            direction,
            base,
            fees: FeeBreakdown {
                percentage: pct.clone(),
                amounts: fee_amounts,
            },
            total,
        })
    }
}

impl Quote {
    /// Asset units persisted on the order: what the buyer receives including
    /// the fee, or what the seller sends.
    pub fn stored_asset_amount(&self) -> BigDecimal {
        match self.direction {
            TransactionType::Buy => self.total.asset.clone(),
            TransactionType::Sell => self.base.asset.clone(),
        }
    }

    /// Settlement-currency amount persisted on the order.
    pub fn stored_fiat_amount(&self) -> BigDecimal {
        self.total.ngn.clone()
    }
}
