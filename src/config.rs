//! 配置管理模块
//! 支持从环境变量和配置文件加载配置
//!
//! 所有组件通过构造函数显式接收配置，启动后只读

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 引擎配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub node: NodeConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub price: PriceConfig,
    pub logging: LoggingConfig,
}

/// 账本节点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub rpc_url: String,
    /// 单次请求超时（毫秒）
    pub timeout_ms: u64,
    /// 传输失败时的额外重试次数
    pub retries: usize,
    /// 0 表示未指定（传统签名方案），否则使用 EIP-155
    #[serde(default)]
    pub chain_id: u64,
}

/// 钱包配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub default_password: String,
    pub keystore_dir: String,
    pub kdf_iterations: u32,
}

/// 回调通知配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    pub url: Option<String>,
    /// 设置后对回调正文做 HMAC-SHA256 签名
    pub secret: Option<String>,
    #[serde(default = "default_callback_timeout_ms")]
    pub timeout_ms: u64,
}

/// 价格查询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    pub api_url: String,
    pub currency: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

fn default_callback_timeout_ms() -> u64 {
    5000
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("NODE_RPC_URL")
                .unwrap_or_else(|_| "http://localhost:8545".into()),
            timeout_ms: std::env::var("NODE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
            retries: std::env::var("NODE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            chain_id: std::env::var("CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            default_password: std::env::var("DEFAULT_WALLET_PASSWORD")
                .unwrap_or_else(|_| "123456".into()),
            keystore_dir: std::env::var("KEYSTORE_DIR").unwrap_or_else(|_| "./keystore".into()),
            kdf_iterations: std::env::var("KEYSTORE_KDF_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(crate::infrastructure::pbkdf2::DEFAULT_ITERATIONS),
        }
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("PRICE_API_URL").unwrap_or_else(|_| {
                "https://min-api.cryptocompare.com/data/price?fsym=ETH&tsyms=USD,CNY".into()
            }),
            currency: std::env::var("PRICE_CURRENCY").unwrap_or_else(|_| "CNY".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_TO_FILE")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("CALLBACK_URL").ok().filter(|s| !s.is_empty()),
            secret: std::env::var("CALLBACK_SECRET").ok().filter(|s| !s.is_empty()),
            timeout_ms: std::env::var("CALLBACK_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_callback_timeout_ms),
        }
    }
}

impl EngineConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            node: NodeConfig::default(),
            wallet: WalletConfig::default(),
            callback: CallbackConfig::default(),
            price: PriceConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.node.rpc_url.starts_with("http://") && !self.node.rpc_url.starts_with("https://")
        {
            anyhow::bail!("NODE_RPC_URL must start with http:// or https://");
        }

        if self.node.timeout_ms == 0 {
            anyhow::bail!("NODE_TIMEOUT_MS must be greater than 0");
        }

        let max_iterations = crate::infrastructure::pbkdf2::MAX_ITERATIONS;
        if self.wallet.kdf_iterations == 0 || self.wallet.kdf_iterations > max_iterations {
            anyhow::bail!("KEYSTORE_KDF_ITERATIONS must be between 1 and {}", max_iterations);
        }

        if let Some(url) = &self.callback.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("CALLBACK_URL must start with http:// or https://");
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[node]
rpc_url = "http://127.0.0.1:7545"
timeout_ms = 3000
retries = 1
chain_id = 1337

[wallet]
default_password = "correct horse"
keystore_dir = "/tmp/keys"
kdf_iterations = 4096

[callback]
url = "https://merchant.example/notify"

[logging]
level = "debug"
format = "json"
enable_file_logging = false
"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.node.rpc_url, "http://127.0.0.1:7545");
        assert_eq!(config.node.chain_id, 1337);
        assert_eq!(config.wallet.kdf_iterations, 4096);
        assert_eq!(
            config.callback.url.as_deref(),
            Some("https://merchant.example/notify")
        );
        assert_eq!(config.callback.timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_bad_url() {
        let mut config = EngineConfig::from_env().unwrap();
        config.node.rpc_url = "ws://localhost:8546".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_bad_log_format() {
        let mut config = EngineConfig::from_env().unwrap();
        config.node.rpc_url = "http://localhost:8545".into();
        config.logging.level = "info".into();
        config.logging.format = "yaml".into();
        assert!(config.validate().is_err());
    }
}
