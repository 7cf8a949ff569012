//! HD 钱包派生
//!
//! 助记词 → 种子 → BIP32 主密钥 → 按路径逐段派生 → secp256k1 密钥对 → 账本地址

use std::fmt;

use bip39::{Language, Mnemonic};
use coins_bip32::prelude::*;
use ethers::types::Address;
use k256::ecdsa::SigningKey;
use rand::RngCore;
use sha3::{Digest, Keccak256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    domain::{derivation_path::DerivationPath, keystore::Keystore},
    error::{EngineError, Result},
    infrastructure::log_redact::redact_address,
    utils::address_validator::{format_address, to_checksum},
};

/// 生成助记词时的最小密码长度
pub const MIN_PASSWORD_LENGTH: usize = 6;
/// 128 位熵 → 12 个单词
const ENTROPY_BYTES: usize = 16;

/// secp256k1 密钥对及其账本地址
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    private_key: [u8; 32],
    /// 未压缩公钥（去掉 0x04 前缀）
    #[zeroize(skip)]
    public_key: [u8; 64],
    #[zeroize(skip)]
    address: Address,
}

impl KeyPair {
    pub fn from_signing_key(signing_key: &SigningKey) -> Self {
        let encoded = signing_key.verifying_key().to_encoded_point(false);
        let mut public_key = [0u8; 64];
        public_key.copy_from_slice(&encoded.as_bytes()[1..]);

        let mut private_key = [0u8; 32];
        private_key.copy_from_slice(&signing_key.to_bytes());

        Self {
            private_key,
            address: address_from_public_key(&public_key),
            public_key,
        }
    }

    /// 从 32 字节私钥构造
    pub fn from_private_key(bytes: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| EngineError::Crypto(format!("invalid private key: {}", e)))?;
        Ok(Self::from_signing_key(&signing_key))
    }

    /// 从十六进制私钥构造；`0x` 前缀可选，不足 64 位时左侧补零
    pub fn from_private_key_hex(private_key: &str) -> Result<Self> {
        let trimmed = private_key.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        if hex_part.is_empty() || hex_part.len() > 64 {
            return Err(EngineError::Crypto(
                "private key must be 1 to 64 hex characters".into(),
            ));
        }

        let padded = Zeroizing::new(format!("{:0>64}", hex_part));
        let mut bytes = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(padded.as_str(), bytes.as_mut_slice())
            .map_err(|e| EngineError::Crypto(format!("invalid private key hex: {}", e)))?;

        Self::from_private_key(bytes.as_slice())
    }

    pub fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_slice(&self.private_key)
            .map_err(|e| EngineError::Crypto(format!("invalid private key: {}", e)))
    }

    pub fn private_key(&self) -> &[u8; 32] {
        &self.private_key
    }

    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.private_key))
    }

    pub fn public_key(&self) -> &[u8; 64] {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// 小写 `0x` 地址
    pub fn address_hex(&self) -> String {
        format_address(&self.address)
    }

    pub fn checksum_address(&self) -> String {
        to_checksum(&self.address)
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.private_key == other.private_key
            && self.public_key == other.public_key
            && self.address == other.address
    }
}

impl Eq for KeyPair {}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address_hex())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// `0x` + keccak256(未压缩公钥) 的后 20 字节
pub fn address_from_public_key(public_key: &[u8; 64]) -> Address {
    let hash = Keccak256::digest(public_key);
    Address::from_slice(&hash[12..])
}

/// 派生结果：助记词、路径、密钥对与 keystore
pub struct HdWallet {
    pub mnemonic: Zeroizing<String>,
    pub path: DerivationPath,
    pub key_pair: KeyPair,
    pub keystore: Keystore,
}

impl HdWallet {
    pub fn words(&self) -> Vec<String> {
        self.mnemonic
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Debug for HdWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdWallet")
            .field("path", &self.path.to_string())
            .field("key_pair", &self.key_pair)
            .field("mnemonic", &"<redacted>")
            .finish()
    }
}

/// 密钥派生组件
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    kdf_iterations: u32,
}

impl KeyDerivation {
    pub fn new(kdf_iterations: u32) -> Self {
        Self { kdf_iterations }
    }

    pub fn from_config(config: &crate::config::WalletConfig) -> Self {
        Self::new(config.kdf_iterations)
    }

    /// 生成新助记词并派生钱包
    ///
    /// 路径与密码在生成任何密钥材料之前校验
    pub fn generate_mnemonic(&self, path: &str, password: &str) -> Result<HdWallet> {
        let path = DerivationPath::parse(path)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(EngineError::WeakPassword {
                min: MIN_PASSWORD_LENGTH,
            });
        }

        let mut entropy = Zeroizing::new([0u8; ENTROPY_BYTES]);
        rand::thread_rng().fill_bytes(entropy.as_mut_slice());
        let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy.as_slice())
            .map_err(|e| EngineError::Crypto(format!("mnemonic generation failed: {}", e)))?;

        self.build_wallet(mnemonic, path, password)
    }

    /// 导入已有助记词并派生钱包
    ///
    /// 与 `generate_mnemonic` 不同，这里不检查密码长度
    pub fn import_mnemonic<S: AsRef<str>>(
        &self,
        path: &str,
        words: &[S],
        password: &str,
    ) -> Result<HdWallet> {
        let path = DerivationPath::parse(path)?;

        let phrase = Zeroizing::new(
            words
                .iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        );
        let mnemonic = Mnemonic::parse_in(Language::English, phrase.as_str())
            .map_err(|e| EngineError::InvalidMnemonic(e.to_string()))?;

        self.build_wallet(mnemonic, path, password)
    }

    fn build_wallet(
        &self,
        mnemonic: Mnemonic,
        path: DerivationPath,
        password: &str,
    ) -> Result<HdWallet> {
        let seed = Zeroizing::new(mnemonic.to_seed(""));
        let key_pair = Self::derive_key_pair(seed.as_slice(), &path)?;
        let keystore = self.encrypt(&key_pair, password)?;

        tracing::info!(
            address = %redact_address(&key_pair.address_hex()),
            path = %path,
            "HD wallet derived"
        );

        Ok(HdWallet {
            mnemonic: Zeroizing::new(mnemonic.to_string()),
            path,
            key_pair,
            keystore,
        })
    }

    /// 从种子按路径派生密钥对；相同种子与路径总是得到相同结果
    pub fn derive_key_pair(seed: &[u8], path: &DerivationPath) -> Result<KeyPair> {
        let mut key = XPriv::root_from_seed(seed, None)
            .map_err(|e| EngineError::Crypto(format!("master key derivation failed: {}", e)))?;

        for segment in path.segments() {
            key = key.derive_child(segment.child_index()).map_err(|e| {
                EngineError::Crypto(format!("child derivation failed at {}: {}", path, e))
            })?;
        }

        let signing_key: &SigningKey = key.as_ref();
        Ok(KeyPair::from_signing_key(signing_key))
    }

    /// 加密为 keystore（含自检）
    pub fn encrypt(&self, key_pair: &KeyPair, password: &str) -> Result<Keystore> {
        Keystore::encrypt(key_pair, password, self.kdf_iterations)
    }

    /// 解密 keystore
    pub fn decrypt(&self, keystore: &Keystore, password: &str) -> Result<KeyPair> {
        keystore.decrypt(password)
    }
}
