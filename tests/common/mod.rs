//! 测试辅助模块
//! 提供内存版账本节点与常用测试数据

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256, U64};
use ironledger::{
    config::{EngineConfig, LoggingConfig, NodeConfig, WalletConfig},
    domain::{
        derivation::address_from_public_key,
        transaction::{self, RawTransaction},
    },
    error::{EngineError, Result},
    service::blockchain_client::{
        BlockTag, CallRequest, LedgerRpc, NodeBlock, NodeReceipt, NodeTransaction,
    },
};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Hardhat 默认账户 #0
pub const HARDHAT_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const HARDHAT_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub const RECIPIENT: &str = "0x3535353535353535353535353535353535353535";
pub const TOKEN_CONTRACT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

/// 低迭代次数的测试配置
pub fn test_config(chain_id: u64) -> EngineConfig {
    EngineConfig {
        node: NodeConfig {
            rpc_url: "http://127.0.0.1:8545".into(),
            timeout_ms: 1_000,
            retries: 0,
            chain_id,
        },
        wallet: WalletConfig {
            default_password: "123456".into(),
            keystore_dir: "./keystore".into(),
            kdf_iterations: 1_024,
        },
        callback: Default::default(),
        price: Default::default(),
        logging: LoggingConfig {
            level: "debug".into(),
            format: "text".into(),
            enable_file_logging: false,
            log_file_path: None,
        },
    }
}

pub fn address(s: &str) -> Address {
    s.parse().expect("valid test address")
}

/// 节点收到的已签名交易（由签名恢复出发送方）
#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: H256,
    pub from: Address,
    pub chain_id: u64,
    pub raw: RawTransaction,
}

/// 解码 legacy 交易并恢复发送方
pub fn decode_signed(bytes: &[u8]) -> SentTx {
    let rlp = rlp::Rlp::new(bytes);
    let nonce: u64 = rlp.val_at(0).expect("nonce");
    let gas_price: Vec<u8> = rlp.val_at(1).expect("gas price");
    let gas_limit: u64 = rlp.val_at(2).expect("gas limit");
    let to: Vec<u8> = rlp.val_at(3).expect("to");
    let value: Vec<u8> = rlp.val_at(4).expect("value");
    let data: Vec<u8> = rlp.val_at(5).expect("data");
    let v: u64 = rlp.val_at(6).expect("v");
    let r: Vec<u8> = rlp.val_at(7).expect("r");
    let s: Vec<u8> = rlp.val_at(8).expect("s");

    let (chain_id, recid) = if v >= 35 {
        ((v - 35) / 2, ((v - 35) % 2) as u8)
    } else {
        (0, (v - 27) as u8)
    };

    let mut raw = RawTransaction {
        from: Address::zero(),
        nonce,
        gas_price: U256::from_big_endian(&gas_price),
        gas_limit,
        to: (!to.is_empty()).then(|| Address::from_slice(&to)),
        value: U256::from_big_endian(&value),
        data,
    };

    let digest = transaction::signing_hash(&raw, chain_id);
    let mut sig = [0u8; 64];
    sig[32 - r.len()..32].copy_from_slice(&r);
    sig[64 - s.len()..].copy_from_slice(&s);
    let signature = Signature::from_slice(&sig).expect("signature");
    let recovery_id = RecoveryId::from_byte(recid).expect("recovery id");
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .expect("recoverable signature");
    let point = key.to_encoded_point(false);
    let mut public_key = [0u8; 64];
    public_key.copy_from_slice(&point.as_bytes()[1..]);
    raw.from = address_from_public_key(&public_key);

    SentTx {
        hash: H256::from_slice(&Keccak256::digest(bytes)),
        from: raw.from,
        chain_id,
        raw,
    }
}

#[derive(Default)]
struct MockState {
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    sent: Vec<SentTx>,
    send_error: Option<(i64, String)>,
    unavailable: bool,
    call_responses: HashMap<[u8; 4], Vec<u8>>,
    calls: Vec<CallRequest>,
    transactions: HashMap<H256, NodeTransaction>,
    receipts: HashMap<H256, NodeReceipt>,
    blocks: HashMap<u64, NodeBlock>,
}

/// 内存版账本节点
///
/// 按发送方维护 pending nonce；重复提交同一笔交易时返回 geth 风格的 `known transaction` 错误
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
    requests: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state")
    }

    fn enter(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.state().unavailable {
            return Err(EngineError::NodeUnavailable("mock node offline".into()));
        }
        Ok(())
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state().nonces.insert(address, nonce);
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.state().balances.insert(address, wei);
    }

    pub fn set_send_error(&self, code: i64, message: &str) {
        self.state().send_error = Some((code, message.to_string()));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn set_call_response(&self, selector: [u8; 4], data: Vec<u8>) {
        self.state().call_responses.insert(selector, data);
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state().sent.clone()
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        self.state().calls.clone()
    }

    pub fn insert_transaction(&self, tx: NodeTransaction) {
        self.state().transactions.insert(tx.hash, tx);
    }

    pub fn insert_receipt(&self, receipt: NodeReceipt) {
        self.state().receipts.insert(receipt.transaction_hash, receipt);
    }

    /// 将交易打包进区块并生成回执
    pub fn mine(&self, hash: H256, block_number: u64, timestamp: u64, status: &str) {
        let mut state = self.state();
        let block_hash = H256::from_low_u64_be(block_number);
        let tx = state
            .transactions
            .get_mut(&hash)
            .expect("mined transaction must exist");
        tx.block_number = Some(U64::from(block_number));
        tx.block_hash = Some(block_hash);
        tx.transaction_index = Some(U64::zero());
        let receipt = NodeReceipt {
            transaction_hash: hash,
            transaction_index: Some(U64::zero()),
            block_hash: Some(block_hash),
            block_number: Some(U64::from(block_number)),
            from: Some(tx.from),
            to: tx.to,
            cumulative_gas_used: Some(tx.gas),
            gas_used: Some(tx.gas),
            status: Some(status.to_string()),
            ..Default::default()
        };
        state.receipts.insert(hash, receipt);
        state.blocks.insert(
            block_number,
            NodeBlock {
                number: Some(U64::from(block_number)),
                hash: Some(block_hash),
                timestamp: U256::from(timestamp),
            },
        );
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn get_transaction_count(&self, address: Address, _block: BlockTag) -> Result<u64> {
        self.enter()?;
        Ok(self.state().nonces.get(&address).copied().unwrap_or(0))
    }

    async fn call(&self, request: &CallRequest, _block: BlockTag) -> Result<Vec<u8>> {
        self.enter()?;
        let mut state = self.state();
        state.calls.push(request.clone());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&request.data[..4]);
        Ok(state
            .call_responses
            .get(&selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256> {
        self.enter()?;
        let sent = decode_signed(raw);
        let mut state = self.state();

        if let Some((code, message)) = state.send_error.clone() {
            return Err(EngineError::Rpc { code, message });
        }
        if state.sent.iter().any(|s| s.hash == sent.hash) {
            return Err(EngineError::Rpc {
                code: -32000,
                message: format!("known transaction: {:x}", sent.hash),
            });
        }

        let expected = state.nonces.get(&sent.from).copied().unwrap_or(0);
        if sent.raw.nonce != expected {
            return Err(EngineError::Rpc {
                code: -32000,
                message: if sent.raw.nonce < expected {
                    "nonce too low".to_string()
                } else {
                    "nonce too high".to_string()
                },
            });
        }
        state.nonces.insert(sent.from, expected + 1);

        state.transactions.insert(
            sent.hash,
            NodeTransaction {
                hash: sent.hash,
                nonce: U256::from(sent.raw.nonce),
                from: sent.from,
                to: sent.raw.to,
                value: sent.raw.value,
                gas_price: Some(sent.raw.gas_price),
                gas: U256::from(sent.raw.gas_limit),
                input: Bytes::from(sent.raw.data.clone()),
                ..Default::default()
            },
        );
        let hash = sent.hash;
        state.sent.push(sent);
        Ok(hash)
    }

    async fn get_transaction_by_hash(&self, hash: H256) -> Result<Option<NodeTransaction>> {
        self.enter()?;
        Ok(self.state().transactions.get(&hash).cloned())
    }

    async fn get_transaction_receipt(&self, hash: H256) -> Result<Option<NodeReceipt>> {
        self.enter()?;
        Ok(self.state().receipts.get(&hash).cloned())
    }

    async fn get_block_by_number(&self, number: u64) -> Result<Option<NodeBlock>> {
        self.enter()?;
        Ok(self.state().blocks.get(&number).cloned())
    }

    async fn get_balance(&self, address: Address, _block: BlockTag) -> Result<U256> {
        self.enter()?;
        Ok(self
            .state()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<U256> {
        self.enter()?;
        Ok(U256::from(20_000_000_000u64))
    }

    async fn client_version(&self) -> Result<String> {
        self.enter()?;
        Ok("MockLedger/v1.0.0".to_string())
    }
}
