pub mod blockchain_client;
pub mod fee_service;
pub mod notification_service;
pub mod price_service;
pub mod receipt_resolver;
pub mod token_service;
pub mod transaction_signer;
pub mod wallet_service;

pub use blockchain_client::{JsonRpcLedgerClient, LedgerRpc};
pub use receipt_resolver::{FeeReceiptResolver, ReceiptKind, TransactionReceiptSummary};
pub use transaction_signer::{SubmitOutcome, TransactionSigner};
