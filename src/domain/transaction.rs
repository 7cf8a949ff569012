//! 原始交易的构建、RLP 序列化与签名
//!
//! chain id 为 0 时使用传统签名（v = 27 + recid），否则按 EIP-155 将
//! `[chainId, 0, 0]` 纳入签名摘要（v = recid + 35 + 2 * chainId）

use ethers::types::{Address, H256, U256};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

use crate::{
    domain::derivation::KeyPair,
    error::{EngineError, Result},
};

/// 普通转账的 gas 上限
pub const GAS_LIMIT_VALUE_TRANSFER: u64 = 21_000;
/// 代币转账的 gas 上限
pub const GAS_LIMIT_TOKEN_TRANSFER: u64 = 60_000;

/// 未签名交易
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub from: Address,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// None 表示合约创建
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
}

/// 已签名交易，哈希即链上标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: RawTransaction,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    pub rlp: Vec<u8>,
    pub hash: H256,
}

impl SignedTransaction {
    /// `0x` 前缀的十六进制序列化，用于 `eth_sendRawTransaction`
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.rlp))
    }

    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.hash)
    }
}

/// 纯构造，不做 I/O
pub fn build(
    from: Address,
    to: Option<Address>,
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    value: U256,
    data: Vec<u8>,
) -> RawTransaction {
    RawTransaction {
        from,
        nonce,
        gas_price,
        gas_limit,
        to,
        value,
        data,
    }
}

/// 大端最小字节表示（0 编码为空串）
fn u256_bytes(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let first = buf.iter().position(|b| *b != 0).unwrap_or(buf.len());
    buf[first..].to_vec()
}

fn append_fields(stream: &mut RlpStream, tx: &RawTransaction) {
    stream.append(&tx.nonce);
    stream.append(&u256_bytes(&tx.gas_price));
    stream.append(&tx.gas_limit);
    let to_bytes = tx.to.map(|a| a.as_bytes().to_vec()).unwrap_or_default();
    stream.append(&to_bytes);
    stream.append(&u256_bytes(&tx.value));
    stream.append(&tx.data);
}

/// 签名载荷：6 个字段，EIP-155 时追加 `[chainId, 0, 0]`
pub fn signing_payload(tx: &RawTransaction, chain_id: u64) -> Vec<u8> {
    let mut stream = if chain_id > 0 {
        RlpStream::new_list(9)
    } else {
        RlpStream::new_list(6)
    };
    append_fields(&mut stream, tx);
    if chain_id > 0 {
        stream.append(&chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
    }
    stream.out().to_vec()
}

/// 签名摘要 keccak256(payload)
pub fn signing_hash(tx: &RawTransaction, chain_id: u64) -> [u8; 32] {
    Keccak256::digest(signing_payload(tx, chain_id)).into()
}

/// 用密钥对签名
///
/// 密钥对的地址必须与交易的 `from` 一致
pub fn sign(tx: &RawTransaction, key_pair: &KeyPair, chain_id: u64) -> Result<SignedTransaction> {
    if key_pair.address() != tx.from {
        return Err(EngineError::InvalidArgument(format!(
            "key pair address {} does not match sender {:#x}",
            key_pair.address_hex(),
            tx.from
        )));
    }

    let digest = signing_hash(tx, chain_id);
    let signing_key = key_pair.signing_key()?;
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| EngineError::Crypto(format!("ecdsa signing failed: {}", e)))?;

    let recid = u64::from(recovery_id.to_byte());
    let v = if chain_id > 0 {
        recid + 35 + chain_id * 2
    } else {
        recid + 27
    };

    let sig_bytes = signature.to_bytes();
    let r = U256::from_big_endian(&sig_bytes[..32]);
    let s = U256::from_big_endian(&sig_bytes[32..]);

    let mut stream = RlpStream::new_list(9);
    append_fields(&mut stream, tx);
    stream.append(&v);
    stream.append(&u256_bytes(&r));
    stream.append(&u256_bytes(&s));
    let rlp = stream.out().to_vec();
    let hash = H256::from_slice(&Keccak256::digest(&rlp));

    Ok(SignedTransaction {
        raw: tx.clone(),
        v,
        r,
        s,
        rlp,
        hash,
    })
}
