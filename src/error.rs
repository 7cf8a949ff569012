//! 引擎错误类型
//!
//! 每个失败只影响产生它的单次操作；校验类错误在任何节点 I/O 之前返回

use ethers::types::U256;

/// 统一结果类型
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 派生路径格式非法
    #[error("Invalid derivation path: {0}")]
    InvalidPath(String),

    /// 密码长度不足
    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Keystore MAC 校验失败
    #[error("Keystore password does not match")]
    BadPassword,

    #[error("Corrupt keystore: {0}")]
    CorruptKeystore(String),

    /// 合约返回数据与期望的 ABI 布局不一致
    #[error("Malformed return data: {0}")]
    MalformedReturnData(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: balance {balance} wei, required {required} wei")]
    InsufficientBalance { balance: U256, required: U256 },

    /// 节点 I/O 失败（超时、连接错误、HTTP 非 2xx、响应无法解析）
    #[error("Ledger node unavailable: {0}")]
    NodeUnavailable(String),

    /// 节点返回 JSON-RPC 错误对象
    #[error("Node RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// 节点明确拒绝交易
    #[error("Transaction rejected ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// 签名、密钥派生或加密原语失败
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// 稳定的错误码，用于回调与日志
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidPath(_) => "invalid_path",
            EngineError::WeakPassword { .. } => "weak_password",
            EngineError::InvalidMnemonic(_) => "invalid_mnemonic",
            EngineError::BadPassword => "bad_password",
            EngineError::CorruptKeystore(_) => "corrupt_keystore",
            EngineError::MalformedReturnData(_) => "malformed_return_data",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::InvalidAddress(_) => "invalid_address",
            EngineError::InvalidAmount(_) => "invalid_amount",
            EngineError::InsufficientBalance { .. } => "insufficient_balance",
            EngineError::NodeUnavailable(_) => "node_unavailable",
            EngineError::Rpc { .. } => "rpc_error",
            EngineError::Rejected { .. } => "rejected",
            EngineError::Crypto(_) => "crypto_failed",
            EngineError::Io(_) => "io_error",
            EngineError::Json(_) => "serialization_error",
        }
    }

    /// 是否为本地校验错误（未发生任何节点 I/O）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidPath(_)
                | EngineError::WeakPassword { .. }
                | EngineError::InvalidMnemonic(_)
                | EngineError::InvalidArgument(_)
                | EngineError::InvalidAddress(_)
                | EngineError::InvalidAmount(_)
        )
    }

    /// 节点侧的错误码（JSON-RPC code），本地错误返回 None
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            EngineError::Rpc { code, .. } | EngineError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EngineError::BadPassword.code(), "bad_password");
        assert_eq!(
            EngineError::Rejected {
                code: -32000,
                message: "nonce too low".into()
            }
            .code(),
            "rejected"
        );
        assert!(EngineError::InvalidPath("x".into()).is_validation());
        assert!(!EngineError::NodeUnavailable("timeout".into()).is_validation());
    }

    #[test]
    fn test_rejected_message_keeps_node_text() {
        let err = EngineError::Rejected {
            code: -32000,
            message: "insufficient funds for gas * price + value".into(),
        };
        assert_eq!(err.rpc_code(), Some(-32000));
        assert!(err.to_string().contains("insufficient funds"));
    }
}
