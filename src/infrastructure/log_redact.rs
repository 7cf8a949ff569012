//! 日志脱敏
//! 地址、原始交易等写入日志前统一脱敏；私钥与助记词从不写入日志

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    if hex.len() <= show_chars * 2 {
        return "*".repeat(hex.len());
    }

    let prefix = &hex[..show_chars];
    let suffix = &hex[hex.len() - show_chars..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 {
        return "*".repeat(address.len());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏签名后的原始交易（只保留前 10 个字符与长度）
pub fn redact_raw_transaction(raw_hex: &str) -> String {
    format!(
        "{} ({} bytes)",
        redact_hex_string(raw_hex, 10),
        raw_hex.trim_start_matches("0x").len() / 2
    )
}
