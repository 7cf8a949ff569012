//! 交易回执与手续费解析
//!
//! 交易或回执任一缺失视为 pending，返回 `Ok(None)`；节点错误照常上抛

use std::sync::Arc;

use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        abi::ContractCallCodec,
        transaction::{GAS_LIMIT_TOKEN_TRANSFER, GAS_LIMIT_VALUE_TRANSFER},
    },
    error::Result,
    service::blockchain_client::{LedgerRpc, NodeBlock, NodeReceipt, NodeTransaction},
    utils::{address_validator::format_address, units::ETHER_DECIMALS},
};

/// 回执种类，决定手续费计算时的 gas 上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
    /// 原生币转账，gas 封顶 21000
    Transfer,
    /// 代币合约调用，gas 封顶 60000
    Token,
}

impl ReceiptKind {
    pub fn gas_cap(&self) -> u64 {
        match self {
            ReceiptKind::Transfer => GAS_LIMIT_VALUE_TRANSFER,
            ReceiptKind::Token => GAS_LIMIT_TOKEN_TRANSFER,
        }
    }
}

/// 回执摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceiptSummary {
    pub transaction_hash: String,
    pub transaction_index: Option<u64>,
    pub block_hash: Option<String>,
    pub block_number: Option<u64>,
    pub from: String,
    pub to: Option<String>,
    pub contract_address: Option<String>,
    /// 节点原值透传
    pub status: Option<String>,
    pub root: Option<String>,
    pub logs_bloom: Option<String>,
    /// wei
    pub gas_price: String,
    pub gas_limit: String,
    /// 手续费（ether），`min(gas_limit, cap) * gas_price`
    pub gas_used: String,
    /// 转账金额（ether）
    pub amount: String,
    pub cumulative_gas_used: Option<String>,
    /// 区块时间戳（秒）
    pub timestamp: Option<u64>,
    pub date_time: Option<String>,
}

/// 按种类上限计算手续费（wei）
pub fn capped_fee(gas_limit: U256, gas_price: U256, kind: ReceiptKind) -> U256 {
    let cap = U256::from(kind.gas_cap());
    gas_limit.min(cap).saturating_mul(gas_price)
}

/// 由交易、回执、区块拼出摘要（无 I/O）
pub fn summarize(
    tx: &NodeTransaction,
    receipt: &NodeReceipt,
    block: Option<&NodeBlock>,
    kind: ReceiptKind,
) -> TransactionReceiptSummary {
    let gas_price = tx.gas_price.unwrap_or_default();
    let fee = capped_fee(tx.gas, gas_price, kind);

    let timestamp = block.map(|b| b.timestamp.low_u64());
    let date_time = timestamp
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339());

    TransactionReceiptSummary {
        transaction_hash: format!("{:#x}", tx.hash),
        transaction_index: tx.transaction_index.map(|i| i.as_u64()),
        block_hash: tx.block_hash.map(|h| format!("{:#x}", h)),
        block_number: tx.block_number.map(|n| n.as_u64()),
        from: format_address(&tx.from),
        to: tx.to.as_ref().map(format_address),
        contract_address: receipt.contract_address.as_ref().map(format_address),
        status: receipt.status.clone(),
        root: receipt.root.clone(),
        logs_bloom: receipt.logs_bloom.clone(),
        gas_price: gas_price.to_string(),
        gas_limit: tx.gas.to_string(),
        gas_used: ContractCallCodec::to_decimal(fee, ETHER_DECIMALS),
        amount: ContractCallCodec::to_decimal(tx.value, ETHER_DECIMALS),
        cumulative_gas_used: receipt.cumulative_gas_used.map(|g| g.to_string()),
        timestamp,
        date_time,
    }
}

pub struct FeeReceiptResolver {
    ledger: Arc<dyn LedgerRpc>,
}

impl FeeReceiptResolver {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    pub async fn resolve(
        &self,
        hash: H256,
        kind: ReceiptKind,
    ) -> Result<Option<TransactionReceiptSummary>> {
        let Some(tx) = self.ledger.get_transaction_by_hash(hash).await? else {
            crate::metrics::inc_receipt(false);
            tracing::debug!(tx_hash = %format!("{:#x}", hash), "transaction not found, pending");
            return Ok(None);
        };

        let Some(receipt) = self.ledger.get_transaction_receipt(hash).await? else {
            crate::metrics::inc_receipt(false);
            tracing::debug!(tx_hash = %format!("{:#x}", hash), "receipt not available, pending");
            return Ok(None);
        };

        let block = match tx.block_number {
            Some(number) => self.ledger.get_block_by_number(number.as_u64()).await?,
            None => None,
        };
        if tx.gas_price.is_none() {
            tracing::warn!(tx_hash = %format!("{:#x}", hash), "transaction without gasPrice, fee is zero");
        }

        let summary = summarize(&tx, &receipt, block.as_ref(), kind);
        crate::metrics::inc_receipt(true);
        tracing::info!(
            tx_hash = %summary.transaction_hash,
            kind = ?kind,
            status = summary.status.as_deref().unwrap_or("-"),
            fee = %summary.gas_used,
            "receipt resolved"
        );
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, U64};

    fn sample_tx(gas: u64) -> NodeTransaction {
        NodeTransaction {
            hash: H256::repeat_byte(0x11),
            block_hash: Some(H256::repeat_byte(0x22)),
            block_number: Some(U64::from(16u64)),
            transaction_index: Some(U64::from(3u64)),
            from: Address::repeat_byte(0xaa),
            to: Some(Address::repeat_byte(0xbb)),
            value: U256::from(1_500_000_000_000_000_000u64),
            gas_price: Some(U256::from(20_000_000_000u64)),
            gas: U256::from(gas),
            ..Default::default()
        }
    }

    #[test]
    fn test_capped_fee_by_kind() {
        let price = U256::from(10u64);
        assert_eq!(
            capped_fee(U256::from(100_000u64), price, ReceiptKind::Transfer),
            U256::from(210_000u64)
        );
        assert_eq!(
            capped_fee(U256::from(100_000u64), price, ReceiptKind::Token),
            U256::from(600_000u64)
        );
        // 低于上限时按交易自身 gas 上限
        assert_eq!(
            capped_fee(U256::from(15_000u64), price, ReceiptKind::Token),
            U256::from(150_000u64)
        );
    }

    #[test]
    fn test_summarize_transfer() {
        let tx = sample_tx(21_000);
        let receipt = NodeReceipt {
            transaction_hash: tx.hash,
            status: Some("0x1".into()),
            cumulative_gas_used: Some(U256::from(42_000u64)),
            ..Default::default()
        };
        let block = NodeBlock {
            timestamp: U256::from(1_600_000_000u64),
            ..Default::default()
        };

        let summary = summarize(&tx, &receipt, Some(&block), ReceiptKind::Transfer);
        assert_eq!(summary.gas_used, "0.00042");
        assert_eq!(summary.amount, "1.5");
        assert_eq!(summary.gas_price, "20000000000");
        assert_eq!(summary.status.as_deref(), Some("0x1"));
        assert_eq!(summary.block_number, Some(16));
        assert_eq!(summary.transaction_index, Some(3));
        assert_eq!(summary.timestamp, Some(1_600_000_000));
        assert_eq!(
            summary.date_time.as_deref(),
            Some("2020-09-13T12:26:40+00:00")
        );
        assert_eq!(summary.cumulative_gas_used.as_deref(), Some("42000"));
    }

    #[test]
    fn test_summarize_token_uses_larger_cap() {
        let tx = sample_tx(90_000);
        let receipt = NodeReceipt::default();

        let token = summarize(&tx, &receipt, None, ReceiptKind::Token);
        let transfer = summarize(&tx, &receipt, None, ReceiptKind::Transfer);
        assert_eq!(token.gas_used, "0.0012");
        assert_eq!(transfer.gas_used, "0.00042");
        assert!(token.timestamp.is_none());
        assert!(token.date_time.is_none());
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let tx = sample_tx(21_000);
        let summary = summarize(&tx, &NodeReceipt::default(), None, ReceiptKind::Transfer);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("transactionHash").is_some());
        assert!(json.get("gasUsed").is_some());
        assert!(json.get("dateTime").is_some());
    }
}
