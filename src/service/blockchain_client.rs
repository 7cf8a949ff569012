//! 账本节点客户端
//!
//! `LedgerRpc` 描述引擎需要的节点接口；`JsonRpcLedgerClient` 通过 HTTP JSON-RPC 实现

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256, U64};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::NodeConfig,
    error::{EngineError, Result},
    infrastructure::{rpc_validator, upstream::UpstreamClient},
    utils::address_validator::format_address,
};

/// 区块标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(&self) -> Value {
        match self {
            BlockTag::Latest => json!("latest"),
            BlockTag::Pending => json!("pending"),
            BlockTag::Number(n) => json!(format!("0x{:x}", n)),
        }
    }
}

/// `eth_call` 请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
}

impl CallRequest {
    /// 只读调用使用零地址作为调用方
    pub fn read_only(to: Address, data: Vec<u8>) -> Self {
        Self {
            from: Address::zero(),
            to,
            data,
        }
    }

    fn to_param(&self) -> Value {
        json!({
            "from": format_address(&self.from),
            "to": format_address(&self.to),
            "data": format!("0x{}", hex::encode(&self.data)),
        })
    }
}

/// `eth_getTransactionByHash` 结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTransaction {
    pub hash: H256,
    #[serde(default)]
    pub nonce: U256,
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub transaction_index: Option<U64>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas_price: Option<U256>,
    /// gas 上限
    #[serde(default)]
    pub gas: U256,
    #[serde(default)]
    pub input: Bytes,
}

/// `eth_getTransactionReceipt` 结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReceipt {
    pub transaction_hash: H256,
    #[serde(default)]
    pub transaction_index: Option<U64>,
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub cumulative_gas_used: Option<U256>,
    #[serde(default)]
    pub gas_used: Option<U256>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// 原样透传（如 `0x1`）
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub logs_bloom: Option<String>,
}

/// `eth_getBlockByNumber` 结果（仅需要的字段）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBlock {
    #[serde(default)]
    pub number: Option<U64>,
    #[serde(default)]
    pub hash: Option<H256>,
    pub timestamp: U256,
}

/// 引擎使用的节点接口
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn get_transaction_count(&self, address: Address, block: BlockTag) -> Result<u64>;

    async fn call(&self, request: &CallRequest, block: BlockTag) -> Result<Vec<u8>>;

    /// 节点返回 error 对象时为 `EngineError::Rpc`
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256>;

    async fn get_transaction_by_hash(&self, hash: H256) -> Result<Option<NodeTransaction>>;

    async fn get_transaction_receipt(&self, hash: H256) -> Result<Option<NodeReceipt>>;

    async fn get_block_by_number(&self, number: u64) -> Result<Option<NodeBlock>>;

    async fn get_balance(&self, address: Address, block: BlockTag) -> Result<U256>;

    async fn gas_price(&self) -> Result<U256>;

    async fn client_version(&self) -> Result<String>;
}

/// HTTP JSON-RPC 实现
pub struct JsonRpcLedgerClient {
    upstream: UpstreamClient,
}

impl JsonRpcLedgerClient {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            upstream: UpstreamClient::new(config)?,
        })
    }

    pub fn rpc_url(&self) -> &str {
        self.upstream.rpc_url()
    }

    async fn request_str(&self, method: &'static str, params: Vec<Value>) -> Result<String> {
        let value = self.upstream.request(method, params).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| malformed(method, "expected a string result"))
    }

    async fn request_typed<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Vec<Value>,
    ) -> Result<T> {
        let value = self.upstream.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| malformed(method, e))
    }
}

fn malformed<E: std::fmt::Display>(method: &str, e: E) -> EngineError {
    EngineError::NodeUnavailable(format!("malformed {} response: {}", method, e))
}

fn hash_param(hash: H256) -> Value {
    json!(format!("{:#x}", hash))
}

#[async_trait]
impl LedgerRpc for JsonRpcLedgerClient {
    async fn get_transaction_count(&self, address: Address, block: BlockTag) -> Result<u64> {
        const METHOD: &str = "eth_getTransactionCount";
        let hex = self
            .request_str(METHOD, vec![json!(format_address(&address)), block.to_param()])
            .await?;
        rpc_validator::parse_quantity_u64(&hex).map_err(|e| malformed(METHOD, e))
    }

    async fn call(&self, request: &CallRequest, block: BlockTag) -> Result<Vec<u8>> {
        const METHOD: &str = "eth_call";
        let hex = self
            .request_str(METHOD, vec![request.to_param(), block.to_param()])
            .await?;
        rpc_validator::parse_data(&hex).map_err(|e| malformed(METHOD, e))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256> {
        const METHOD: &str = "eth_sendRawTransaction";
        let hex = self
            .request_str(METHOD, vec![json!(format!("0x{}", hex::encode(raw)))])
            .await?;
        rpc_validator::validate_tx_hash(&hex).map_err(|e| malformed(METHOD, e))
    }

    async fn get_transaction_by_hash(&self, hash: H256) -> Result<Option<NodeTransaction>> {
        self.request_typed("eth_getTransactionByHash", vec![hash_param(hash)])
            .await
    }

    async fn get_transaction_receipt(&self, hash: H256) -> Result<Option<NodeReceipt>> {
        self.request_typed("eth_getTransactionReceipt", vec![hash_param(hash)])
            .await
    }

    async fn get_block_by_number(&self, number: u64) -> Result<Option<NodeBlock>> {
        self.request_typed(
            "eth_getBlockByNumber",
            vec![BlockTag::Number(number).to_param(), json!(false)],
        )
        .await
    }

    async fn get_balance(&self, address: Address, block: BlockTag) -> Result<U256> {
        const METHOD: &str = "eth_getBalance";
        let hex = self
            .request_str(METHOD, vec![json!(format_address(&address)), block.to_param()])
            .await?;
        rpc_validator::parse_quantity_u256(&hex).map_err(|e| malformed(METHOD, e))
    }

    async fn gas_price(&self) -> Result<U256> {
        const METHOD: &str = "eth_gasPrice";
        let hex = self.request_str(METHOD, vec![]).await?;
        rpc_validator::parse_quantity_u256(&hex).map_err(|e| malformed(METHOD, e))
    }

    async fn client_version(&self) -> Result<String> {
        self.request_str("web3_clientVersion", vec![]).await
    }
}
