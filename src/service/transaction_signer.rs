//! 交易签名与提交
//!
//! nonce 每次在签名前从节点读取（pending），本组件不缓存 nonce，
//! 同一地址的并发提交需由调用方串行化

use std::sync::Arc;

use ethers::types::{Address, H256, U256};
use rust_decimal::Decimal;
use zeroize::Zeroizing;

use crate::{
    config::NodeConfig,
    domain::{
        abi::ContractCallCodec,
        derivation::KeyPair,
        transaction::{
            self, RawTransaction, SignedTransaction, GAS_LIMIT_TOKEN_TRANSFER,
            GAS_LIMIT_VALUE_TRANSFER,
        },
        transaction_status::TransactionState,
    },
    error::{EngineError, Result},
    infrastructure::log_redact::{redact_address, redact_raw_transaction},
    service::blockchain_client::{BlockTag, LedgerRpc},
    utils::{address_validator::AddressValidator, units},
};

/// 代币默认精度
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 节点接受并返回哈希
    Accepted(H256),
    /// 节点报告此前已接收，返回原哈希
    AlreadyKnown(H256),
}

impl SubmitOutcome {
    pub fn hash(&self) -> H256 {
        match self {
            SubmitOutcome::Accepted(h) | SubmitOutcome::AlreadyKnown(h) => *h,
        }
    }

    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.hash())
    }

    pub fn state(&self) -> TransactionState {
        match self {
            SubmitOutcome::Accepted(_) => TransactionState::Submitted,
            SubmitOutcome::AlreadyKnown(_) => TransactionState::AlreadyKnown,
        }
    }
}

/// 原生币转账请求
#[derive(Clone)]
pub struct ValueTransfer {
    pub from: String,
    pub to: String,
    pub private_key: Zeroizing<String>,
    pub amount_ether: Decimal,
    pub fee_gwei: Decimal,
}

/// 代币转账请求
#[derive(Clone)]
pub struct TokenTransfer {
    pub from: String,
    pub contract: String,
    pub to: String,
    pub private_key: Zeroizing<String>,
    /// 按代币精度表示的数量
    pub amount: Decimal,
    pub decimals: u32,
    pub fee_gwei: Decimal,
}

/// 节点错误信息是否表示"交易已存在"；是则返回其中的哈希，缺失时退回本地哈希
pub fn known_transaction_hash(message: &str, local_hash: H256) -> Option<H256> {
    let lower = message.to_lowercase();
    let tail = if let Some(pos) = find_phrase(&lower, "known transaction") {
        &lower[pos + "known transaction".len()..]
    } else if find_phrase(&lower, "already known").is_some() {
        ""
    } else {
        return None;
    };

    let hash = tail
        .split(|c: char| !c.is_ascii_hexdigit())
        .find(|token| token.len() == 64)
        .and_then(|token| {
            let mut bytes = [0u8; 32];
            hex::decode_to_slice(token, &mut bytes).ok()?;
            Some(H256::from(bytes))
        })
        .unwrap_or(local_hash);

    Some(hash)
}

/// 查找独立出现的短语：前一个字符不得是字母或数字（排除 "unknown transaction"）
fn find_phrase(haystack: &str, phrase: &str) -> Option<usize> {
    haystack.match_indices(phrase).map(|(pos, _)| pos).find(|&pos| {
        haystack[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

pub struct TransactionSigner {
    ledger: Arc<dyn LedgerRpc>,
    chain_id: u64,
}

impl TransactionSigner {
    pub fn new(ledger: Arc<dyn LedgerRpc>, config: &NodeConfig) -> Self {
        Self {
            ledger,
            chain_id: config.chain_id,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// 构建未签名交易（无 I/O）
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        from: Address,
        to: Option<Address>,
        nonce: u64,
        fee_per_gas: U256,
        gas_limit: u64,
        value: U256,
        data: Vec<u8>,
    ) -> RawTransaction {
        transaction::build(from, to, nonce, fee_per_gas, gas_limit, value, data)
    }

    pub fn sign(&self, raw: &RawTransaction, key_pair: &KeyPair) -> Result<SignedTransaction> {
        let signed = transaction::sign(raw, key_pair, self.chain_id)?;
        tracing::debug!(
            from = %redact_address(&key_pair.address_hex()),
            nonce = raw.nonce,
            chain_id = self.chain_id,
            tx_hash = %signed.hash_hex(),
            state = %TransactionState::Signed,
            "transaction signed"
        );
        Ok(signed)
    }

    /// 提交已签名交易
    ///
    /// 节点报告 "known transaction" 时视为成功并返回原哈希；其他节点错误为 `Rejected`；
    /// 传输失败（结果未知）原样返回 `NodeUnavailable`，不得换 nonce 重签
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<SubmitOutcome> {
        match self.ledger.send_raw_transaction(&signed.rlp).await {
            Ok(hash) => {
                crate::metrics::inc_broadcast_accepted();
                if hash != signed.hash {
                    tracing::warn!(
                        node_hash = %format!("{:#x}", hash),
                        local_hash = %signed.hash_hex(),
                        "node returned a different transaction hash"
                    );
                }
                tracing::info!(
                    tx_hash = %format!("{:#x}", hash),
                    raw = %redact_raw_transaction(&signed.raw_hex()),
                    "transaction submitted"
                );
                Ok(SubmitOutcome::Accepted(hash))
            }
            Err(EngineError::Rpc { code, message }) => {
                if let Some(hash) = known_transaction_hash(&message, signed.hash) {
                    crate::metrics::inc_broadcast_already_known();
                    tracing::info!(
                        tx_hash = %format!("{:#x}", hash),
                        node_message = %message,
                        "transaction already known to node"
                    );
                    Ok(SubmitOutcome::AlreadyKnown(hash))
                } else {
                    crate::metrics::inc_broadcast_rejected();
                    tracing::warn!(
                        code,
                        node_message = %message,
                        tx_hash = %signed.hash_hex(),
                        "transaction rejected by node"
                    );
                    Err(EngineError::Rejected { code, message })
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    tx_hash = %signed.hash_hex(),
                    "transaction submission outcome unknown"
                );
                Err(e)
            }
        }
    }

    /// 原生币转账：pending nonce，gas 上限 21000
    pub async fn transfer_value(&self, request: &ValueTransfer) -> Result<SubmitOutcome> {
        let from = AddressValidator::parse(&request.from)?;
        let to = AddressValidator::parse(&request.to)?;
        let key_pair = Self::sender_key(&request.private_key, from)?;
        let value = units::ether_to_wei(request.amount_ether)?;
        let gas_price = units::gwei_to_wei(request.fee_gwei)?;

        self.sign_and_submit(
            &key_pair,
            Some(to),
            gas_price,
            GAS_LIMIT_VALUE_TRANSFER,
            value,
            Vec::new(),
        )
        .await
    }

    /// 代币转账：pending nonce，gas 上限 60000，value 为 0，调用数据为 `transfer(to, amount)`
    pub async fn transfer_token(&self, request: &TokenTransfer) -> Result<SubmitOutcome> {
        let from = AddressValidator::parse(&request.from)?;
        let contract = AddressValidator::parse(&request.contract)?;
        let to = AddressValidator::parse(&request.to)?;
        let key_pair = Self::sender_key(&request.private_key, from)?;
        let amount = units::to_base_units(request.amount, request.decimals)?;
        let gas_price = units::gwei_to_wei(request.fee_gwei)?;
        let data = ContractCallCodec::transfer_data(to, amount)?;

        self.sign_and_submit(
            &key_pair,
            Some(contract),
            gas_price,
            GAS_LIMIT_TOKEN_TRANSFER,
            U256::zero(),
            data,
        )
        .await
    }

    fn sender_key(private_key: &str, from: Address) -> Result<KeyPair> {
        let key_pair = KeyPair::from_private_key_hex(private_key)?;
        if key_pair.address() != from {
            return Err(EngineError::InvalidArgument(format!(
                "private key does not belong to {}",
                redact_address(&format!("{:#x}", from))
            )));
        }
        Ok(key_pair)
    }

    async fn sign_and_submit(
        &self,
        key_pair: &KeyPair,
        to: Option<Address>,
        gas_price: U256,
        gas_limit: u64,
        value: U256,
        data: Vec<u8>,
    ) -> Result<SubmitOutcome> {
        let from = key_pair.address();
        let nonce = self
            .ledger
            .get_transaction_count(from, BlockTag::Pending)
            .await?;

        let raw = self.build(from, to, nonce, gas_price, gas_limit, value, data);
        let signed = self.sign(&raw, key_pair)?;
        self.submit(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_transaction_with_hash() {
        let hash = "ab".repeat(32);
        let message = format!("known transaction: 0x{}", hash);
        let recovered = known_transaction_hash(&message, H256::zero()).unwrap();
        assert_eq!(format!("{:#x}", recovered), format!("0x{}", hash));

        // 不带 0x 的 geth 格式
        let message = format!("Known transaction: {}", hash);
        let recovered = known_transaction_hash(&message, H256::zero()).unwrap();
        assert_eq!(format!("{:x}", recovered), hash);
    }

    #[test]
    fn test_already_known_falls_back_to_local_hash() {
        let local = H256::repeat_byte(0x42);
        assert_eq!(known_transaction_hash("already known", local), Some(local));
        assert_eq!(
            known_transaction_hash("known transaction: 0xABC", local),
            Some(local)
        );
    }

    #[test]
    fn test_other_errors_are_not_known() {
        assert_eq!(
            known_transaction_hash("nonce too low", H256::zero()),
            None
        );
        assert_eq!(
            known_transaction_hash("replacement transaction underpriced", H256::zero()),
            None
        );
    }

    #[test]
    fn test_unknown_transaction_is_not_known() {
        let local = H256::repeat_byte(0x42);
        assert_eq!(known_transaction_hash("unknown transaction", local), None);
        assert_eq!(
            known_transaction_hash(&format!("Unknown transaction 0x{}", "ab".repeat(32)), local),
            None
        );
        // 同一消息中后续独立出现的短语仍然匹配
        assert_eq!(
            known_transaction_hash("unknown transaction; known transaction", local),
            Some(local)
        );
        assert_eq!(
            known_transaction_hash("err: known transaction", local),
            Some(local)
        );
    }

    #[test]
    fn test_outcome_state() {
        let hash = H256::repeat_byte(1);
        assert_eq!(
            SubmitOutcome::Accepted(hash).state(),
            TransactionState::Submitted
        );
        assert_eq!(
            SubmitOutcome::AlreadyKnown(hash).state(),
            TransactionState::AlreadyKnown
        );
        assert_eq!(SubmitOutcome::AlreadyKnown(hash).hash(), hash);
    }
}
