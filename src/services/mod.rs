pub mod accounts;
pub mod pricing;
pub mod proof_storage;
pub mod transaction_lifecycle;

pub use accounts::{AccountService, Registration, Session};
pub use pricing::PriceService;
pub use proof_storage::{LocalProofStorage, ProofStorage, ProofUpload, StorageError};
pub use transaction_lifecycle::{LifecycleConfig, OrderReceipt, ProofDetails, ProofKind, ProofReceipt, TransactionLifecycle};
