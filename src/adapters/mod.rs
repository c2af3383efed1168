//! Adapters implementing the repository ports.

pub mod memory;
pub mod postgres_account_repository;
pub mod postgres_price_repository;
pub mod postgres_transaction_repository;

pub use memory::{InMemoryAccountRepository, InMemoryPriceRepository, InMemoryTransactionRepository};
pub use postgres_account_repository::PostgresAccountRepository;
pub use postgres_price_repository::PostgresPriceRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;
