//! 金额单位换算
//!
//! 基于 `ethers::utils::{format_units, parse_units}`，截断而非四舍五入

use std::str::FromStr;

use ethers::{
    types::U256,
    utils::{format_units, parse_units, ParseUnits},
};
use rust_decimal::Decimal;

use crate::error::{EngineError, Result};

/// 以太币精度
pub const ETHER_DECIMALS: u32 = 18;
/// Gwei 精度
pub const GWEI_DECIMALS: u32 = 9;
/// 显示时保留的最大小数位
const MAX_FRACTION_DIGITS: u32 = 18;

/// 将最小单位整数换算为十进制字符串：`raw / 10^decimals`
///
/// 小数部分最多保留 18 位（截断），去掉末尾的 0
///
/// # Examples
/// - `to_decimal(1_500_000_000_000_000_000, 18) == "1.5"`
/// - `to_decimal(1, 0) == "1"`
pub fn to_decimal(raw: U256, decimals: u32) -> String {
    // 先把超出 18 位的小数截掉，format_units 只处理剩余部分
    let (scaled, shown) = if decimals > MAX_FRACTION_DIGITS {
        let divisor = U256::from(10u8).checked_pow(U256::from(decimals - MAX_FRACTION_DIGITS));
        (
            divisor.map(|d| raw / d).unwrap_or_default(),
            MAX_FRACTION_DIGITS,
        )
    } else {
        (raw, decimals)
    };

    match format_units(scaled, shown) {
        Ok(text) => trim_fraction(&text),
        Err(_) => scaled.to_string(),
    }
}

fn trim_fraction(text: &str) -> String {
    match text.split_once('.') {
        Some((integer, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                integer.to_string()
            } else {
                format!("{}.{}", integer, fraction)
            }
        }
        None => text.to_string(),
    }
}

/// 将十进制金额换算为最小单位：`amount * 10^decimals`，多余小数位截断
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256> {
    if amount < Decimal::ZERO {
        return Err(EngineError::InvalidAmount(format!(
            "amount must not be negative: {}",
            amount
        )));
    }

    let parsed = parse_units(amount.to_string(), decimals)
        .map_err(|e| EngineError::InvalidAmount(format!("{}: {}", amount, e)))?;
    match parsed {
        ParseUnits::U256(value) => Ok(value),
        // "-0" 之类的带符号零
        ParseUnits::I256(value) if !value.is_negative() => Ok(value.into_raw()),
        ParseUnits::I256(_) => Err(EngineError::InvalidAmount(format!(
            "amount must not be negative: {}",
            amount
        ))),
    }
}

/// 以太币 → wei
pub fn ether_to_wei(amount: Decimal) -> Result<U256> {
    to_base_units(amount, ETHER_DECIMALS)
}

/// Gwei → wei
pub fn gwei_to_wei(amount: Decimal) -> Result<U256> {
    to_base_units(amount, GWEI_DECIMALS)
}

/// wei → 以太币字符串
pub fn wei_to_ether(wei: U256) -> String {
    to_decimal(wei, ETHER_DECIMALS)
}

/// 解析十进制金额字符串
pub fn parse_amount(text: &str) -> Result<Decimal> {
    Decimal::from_str(text.trim())
        .map_err(|e| EngineError::InvalidAmount(format!("{}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_decimal_basic() {
        let raw = U256::from_dec_str("1500000000000000000").unwrap();
        assert_eq!(to_decimal(raw, 18), "1.5");
        assert_eq!(to_decimal(U256::from(1u64), 0), "1");
        assert_eq!(to_decimal(U256::zero(), 18), "0");
        assert_eq!(to_decimal(U256::from(1u64), 18), "0.000000000000000001");
    }

    #[test]
    fn test_to_decimal_truncates() {
        // 20 位小数截断到 18 位，不进位
        let raw = U256::from(99u64);
        assert_eq!(to_decimal(raw, 20), "0");
        let raw = U256::from_dec_str("199999999999999999999").unwrap();
        assert_eq!(to_decimal(raw, 20), "1.999999999999999999");
    }

    #[test]
    fn test_to_decimal_large_precision() {
        assert_eq!(to_decimal(U256::exp10(77), 77), "1");
        assert_eq!(to_decimal(U256::MAX, 255), "0");
        assert_eq!(to_decimal(U256::from(1u64), 0), "1");
        assert_eq!(to_decimal(U256::from(120u64), 1), "12");
    }

    #[test]
    fn test_to_base_units() {
        let wei = ether_to_wei(parse_amount("0.01").unwrap()).unwrap();
        assert_eq!(wei, U256::from(10_000_000_000_000_000u64));

        let wei = gwei_to_wei(parse_amount("20").unwrap()).unwrap();
        assert_eq!(wei, U256::from(20_000_000_000u64));

        // 超出精度的部分截断
        let units = to_base_units(parse_amount("1.23456").unwrap(), 2).unwrap();
        assert_eq!(units, U256::from(123u64));

        let units = to_base_units(parse_amount("0.5").unwrap(), 0).unwrap();
        assert_eq!(units, U256::zero());
        let units = to_base_units(parse_amount("2.5").unwrap(), 6).unwrap();
        assert_eq!(units, U256::from(2_500_000u64));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = to_base_units(parse_amount("-1").unwrap(), 18).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
        assert!(parse_amount("abc").is_err());
    }
}
