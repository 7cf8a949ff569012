//! Domain 模块
//!
//! 密钥派生、合约调用编解码与交易签名等纯计算逻辑，不做任何 I/O

pub mod abi;
pub mod derivation;
pub mod derivation_path;
pub mod keystore;
pub mod transaction;
pub mod transaction_status;

// 重新导出常用类型
pub use abi::{AbiType, AbiValue, ContractCallCodec, TokenCallResult, TokenFunction};
pub use derivation::{HdWallet, KeyDerivation, KeyPair};
pub use derivation_path::DerivationPath;
pub use keystore::Keystore;
pub use transaction::{RawTransaction, SignedTransaction};
pub use transaction_status::TransactionState;
