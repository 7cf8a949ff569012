//! 地址验证模块
//!
//! 账本地址的解析、格式化与 EIP-55 校验

use ethers::types::Address;
use sha3::{Digest, Keccak256};

use crate::error::{EngineError, Result};

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 解析地址（`0x` 前缀可选）
    ///
    /// 全小写或全大写视为无校验和；大小写混合时必须通过 EIP-55 校验
    pub fn parse(address: &str) -> Result<Address> {
        let trimmed = address.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex_part.len() != 40 {
            return Err(EngineError::InvalidAddress(format!(
                "expected 40 hex characters, got {}",
                hex_part.len()
            )));
        }

        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EngineError::InvalidAddress(
                "contains non-hex characters".into(),
            ));
        }

        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower && !Self::verify_eip55_checksum(hex_part) {
            return Err(EngineError::InvalidAddress(format!(
                "checksum mismatch for 0x{}",
                hex_part
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|e| EngineError::InvalidAddress(e.to_string()))?;
        Ok(Address::from(bytes))
    }

    /// 是否为合法地址
    pub fn is_valid(address: &str) -> bool {
        Self::parse(address).is_ok()
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        let hash = Keccak256::digest(hex_part.to_lowercase().as_bytes());

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let hash_byte = hash[i / 2];
            let nibble = if i % 2 == 0 {
                hash_byte >> 4
            } else {
                hash_byte & 0x0f
            };
            ch.is_ascii_uppercase() == (nibble >= 8)
        })
    }
}

/// 小写 `0x` 形式
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// EIP-55 校验和形式
pub fn to_checksum(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_roundtrip() {
        let checksummed = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        let address = AddressValidator::parse(checksummed).unwrap();
        assert_eq!(to_checksum(&address), checksummed);
        assert_eq!(
            format_address(&address),
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
        );
    }

    #[test]
    fn test_bad_checksum_rejected() {
        assert!(!AddressValidator::is_valid(
            "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        ));
    }

    #[test]
    fn test_prefix_optional_and_length_checked() {
        assert!(AddressValidator::is_valid(
            "fb6916095ca1df60bb79ce92ce3ea74c37c5d359"
        ));
        assert!(!AddressValidator::is_valid("0x1234"));
        assert!(!AddressValidator::is_valid(
            "0xzz6916095ca1df60bb79ce92ce3ea74c37c5d359"
        ));
    }
}
