// RPC响应校验模块 - 防止链上数据污染

use anyhow::{Context, Result};
use ethers::types::{H256, U256};

/// 解析 QUANTITY（nonce、区块号等 u64 数值）
pub fn parse_quantity_u64(hex: &str) -> Result<u64> {
    let digits = strip_hex_prefix(hex)?;

    // u64最多16个十六进制字符
    if digits.len() > 16 {
        anyhow::bail!("Quantity hex string too long: {}", digits.len());
    }
    if digits.is_empty() {
        anyhow::bail!("Quantity must have at least one digit");
    }

    u64::from_str_radix(digits, 16).context("Failed to parse quantity from hex")
}

/// 解析 256 位 QUANTITY（余额、gas price 等）
pub fn parse_quantity_u256(hex: &str) -> Result<U256> {
    let digits = strip_hex_prefix(hex)?;

    // 最多32字节 = 64个十六进制字符
    if digits.len() > 64 {
        anyhow::bail!("Quantity hex string too long: {}", digits.len());
    }
    if digits.is_empty() {
        anyhow::bail!("Quantity must have at least one digit");
    }

    U256::from_str_radix(digits, 16).map_err(|e| anyhow::anyhow!("Invalid quantity: {:?}", e))
}

/// 解析 DATA（`eth_call` 返回值等）
pub fn parse_data(hex: &str) -> Result<Vec<u8>> {
    let digits = strip_hex_prefix(hex)?;
    hex::decode(digits).context("Failed to decode data from hex")
}

/// 验证交易哈希格式
pub fn validate_tx_hash(tx_hash: &str) -> Result<H256> {
    let hash = tx_hash.trim();
    let hash = hash.strip_prefix("0x").unwrap_or(hash);

    // 以太坊交易哈希为32字节 = 64个十六进制字符
    if hash.len() != 64 {
        anyhow::bail!(
            "Invalid transaction hash length: expected 64, got {}",
            hash.len()
        );
    }

    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid transaction hash format: contains non-hex characters");
    }

    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hash, &mut bytes).context("Failed to decode transaction hash")?;
    Ok(H256::from(bytes))
}

/// 验证RPC响应格式，返回 error 对象中的 (code, message)
pub fn extract_rpc_error(json: &serde_json::Value) -> Option<(i64, String)> {
    let error = json.get("error").filter(|e| !e.is_null())?;
    let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string();
    Some((code, message))
}

fn strip_hex_prefix(hex: &str) -> Result<&str> {
    hex.strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .with_context(|| format!("Hex value missing 0x prefix: {}", hex))
}
