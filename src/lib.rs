//! IronLedger - 以太坊风格账户与交易引擎
//!
//! 本地派生并持有密钥，只有签名完成的交易离开进程

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use engine::Engine;
pub use error::{EngineError, Result};

pub mod prelude {
    pub use crate::{
        config::EngineConfig,
        domain::{ContractCallCodec, DerivationPath, KeyDerivation, KeyPair, Keystore},
        engine::Engine,
        error::{EngineError, Result},
        service::{FeeReceiptResolver, ReceiptKind, SubmitOutcome, TransactionSigner},
    };
}
