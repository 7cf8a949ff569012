//! 代币转账手续费估算

use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::transaction::GAS_LIMIT_TOKEN_TRANSFER,
    error::Result,
    service::price_service::PriceQuoteSource,
    utils::units,
};

/// 估算结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub gas_limit: u64,
    pub fee_gwei: Decimal,
    pub fee_wei: U256,
    /// 手续费（ether 字符串）
    pub fee_ether: String,
    /// 折合法币，未报价时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiat: Option<FiatAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiatAmount {
    pub currency: String,
    pub amount: Decimal,
}

pub struct FeeEstimator;

impl FeeEstimator {
    /// 按固定 gas 上限 60000 估算：`fee = 60000 * fee_gwei`
    pub fn estimate_token_transfer(fee_gwei: Decimal) -> Result<FeeEstimate> {
        let gas_price = units::gwei_to_wei(fee_gwei)?;
        let fee_wei = gas_price.saturating_mul(U256::from(GAS_LIMIT_TOKEN_TRANSFER));

        Ok(FeeEstimate {
            gas_limit: GAS_LIMIT_TOKEN_TRANSFER,
            fee_gwei,
            fee_wei,
            fee_ether: units::wei_to_ether(fee_wei),
            fiat: None,
        })
    }

    /// 附加法币折算；报价失败只记日志，估算照常返回
    pub async fn with_quote(
        mut estimate: FeeEstimate,
        source: &dyn PriceQuoteSource,
        currency: &str,
    ) -> FeeEstimate {
        match source.quote(currency).await {
            Ok(price) => {
                let fee_ether = units::parse_amount(&estimate.fee_ether).unwrap_or_default();
                estimate.fiat = Some(FiatAmount {
                    currency: currency.to_string(),
                    amount: fee_ether * price,
                });
            }
            Err(e) => {
                tracing::warn!(currency, error = %e, "price quote unavailable");
            }
        }
        estimate
    }
}
