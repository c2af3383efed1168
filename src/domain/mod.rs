//! Domain layer: entities and pure rules, no I/O.

pub mod account;
pub mod price;
pub mod quote;
pub mod transaction;

pub use account::{Admin, NewUser, Principal, ProfileUpdate, Role, User};
pub use price::{CryptoPrice, MarketEntry, PriceQuote};
pub use quote::{CurrencyAmounts, FeeBreakdown, Quote, QuoteCalculator, QuoteConfig, QuoteError};
pub use transaction::{
    BankDetails, NewTransaction, Page, PageRequest, PaymentMethod, StatusEntry, Transaction,
    TransactionFilter, TransactionStatus, TransactionType,
};
