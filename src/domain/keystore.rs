//! 密码保护的 keystore 文档
//!
//! 版本 3 结构：PBKDF2-HMAC-SHA256 派生 32 字节密钥，前 16 字节用于 AES-128-GCM，
//! 后 16 字节与密文拼接后做 keccak256 得到 MAC

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;

use crate::{
    domain::derivation::KeyPair,
    error::{EngineError, Result},
    infrastructure::{encryption, log_redact::redact_address, pbkdf2},
};

pub const KEYSTORE_VERSION: u32 = 3;
const KDF: &str = "pbkdf2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystore {
    pub version: u32,
    pub id: String,
    /// 40 位小写十六进制，不带 `0x`
    pub address: String,
    pub crypto: CryptoParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoParams {
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub c: u32,
    pub dklen: usize,
    pub prf: String,
    pub salt: String,
}

fn compute_mac(mac_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(mac_key);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

fn corrupt<E: std::fmt::Display>(what: &'static str) -> impl FnOnce(E) -> EngineError {
    move |e| EngineError::CorruptKeystore(format!("{}: {}", what, e))
}

impl Keystore {
    /// 加密密钥对
    ///
    /// 生成后立即用同一密码解密并比对；比对失败只记录错误，文档照常返回
    pub fn encrypt(key_pair: &KeyPair, password: &str, iterations: u32) -> Result<Self> {
        let salt = pbkdf2::generate_salt();
        let derived = pbkdf2::derive_key(
            password,
            &salt,
            iterations,
            pbkdf2::DERIVED_KEY_LENGTH,
        )
        .map_err(|e| EngineError::Crypto(e.to_string()))?;

        let cipher_key = encryption::CipherKey::from_slice(&derived[..encryption::KEY_LENGTH])
            .map_err(|e| EngineError::Crypto(e.to_string()))?;
        let iv = encryption::generate_iv();
        let ciphertext = encryption::encrypt_data(key_pair.private_key(), &cipher_key, &iv)
            .map_err(|e| EngineError::Crypto(e.to_string()))?;
        let mac = compute_mac(&derived[16..32], &ciphertext);

        let keystore = Self {
            version: KEYSTORE_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            address: hex::encode(key_pair.address().as_bytes()),
            crypto: CryptoParams {
                cipher: encryption::CIPHER.to_string(),
                cipherparams: CipherParams {
                    iv: hex::encode(iv),
                },
                ciphertext: hex::encode(&ciphertext),
                kdf: KDF.to_string(),
                kdfparams: KdfParams {
                    c: iterations,
                    dklen: pbkdf2::DERIVED_KEY_LENGTH,
                    prf: pbkdf2::PRF.to_string(),
                    salt: hex::encode(salt),
                },
                mac: hex::encode(mac),
            },
        };

        keystore.self_check(key_pair, password);
        Ok(keystore)
    }

    fn self_check(&self, key_pair: &KeyPair, password: &str) {
        match self.decrypt(password) {
            Ok(decrypted) if decrypted == *key_pair => {
                tracing::debug!(
                    address = %redact_address(&key_pair.address_hex()),
                    "keystore self-check passed"
                );
            }
            Ok(_) => {
                tracing::error!(
                    address = %redact_address(&key_pair.address_hex()),
                    "keystore self-check failed: decrypted key differs"
                );
            }
            Err(e) => {
                tracing::error!(
                    address = %redact_address(&key_pair.address_hex()),
                    error = %e,
                    "keystore self-check failed"
                );
            }
        }
    }

    /// 解密
    ///
    /// MAC 不匹配返回 `BadPassword`，其余结构或密文问题返回 `CorruptKeystore`
    pub fn decrypt(&self, password: &str) -> Result<KeyPair> {
        if self.version != KEYSTORE_VERSION {
            return Err(EngineError::CorruptKeystore(format!(
                "unsupported version {}",
                self.version
            )));
        }

        let crypto = &self.crypto;
        if crypto.kdf != KDF {
            return Err(EngineError::CorruptKeystore(format!(
                "unsupported kdf {}",
                crypto.kdf
            )));
        }
        if crypto.kdfparams.prf != pbkdf2::PRF {
            return Err(EngineError::CorruptKeystore(format!(
                "unsupported prf {}",
                crypto.kdfparams.prf
            )));
        }
        if crypto.cipher != encryption::CIPHER {
            return Err(EngineError::CorruptKeystore(format!(
                "unsupported cipher {}",
                crypto.cipher
            )));
        }

        let kdfparams = &crypto.kdfparams;
        if kdfparams.dklen != pbkdf2::DERIVED_KEY_LENGTH {
            return Err(EngineError::CorruptKeystore(format!(
                "dklen must be {}, got {}",
                pbkdf2::DERIVED_KEY_LENGTH,
                kdfparams.dklen
            )));
        }
        if kdfparams.c == 0 || kdfparams.c > pbkdf2::MAX_ITERATIONS {
            return Err(EngineError::CorruptKeystore(format!(
                "iteration count {} out of range",
                kdfparams.c
            )));
        }

        let salt = hex::decode(&kdfparams.salt).map_err(corrupt("salt"))?;
        let ciphertext = hex::decode(&crypto.ciphertext).map_err(corrupt("ciphertext"))?;
        let mac = hex::decode(&crypto.mac).map_err(corrupt("mac"))?;
        let iv = hex::decode(&crypto.cipherparams.iv).map_err(corrupt("iv"))?;
        if mac.len() != 32 {
            return Err(EngineError::CorruptKeystore(format!(
                "mac must be 32 bytes, got {}",
                mac.len()
            )));
        }

        let derived = pbkdf2::derive_key(password, &salt, kdfparams.c, kdfparams.dklen)
            .map_err(corrupt("kdfparams"))?;

        let expected = compute_mac(&derived[16..32], &ciphertext);
        if !bool::from(expected[..].ct_eq(&mac[..])) {
            return Err(EngineError::BadPassword);
        }

        let cipher_key = encryption::CipherKey::from_slice(&derived[..encryption::KEY_LENGTH])
            .map_err(corrupt("cipher key"))?;
        let plaintext =
            encryption::decrypt_data(&ciphertext, &cipher_key, &iv).map_err(corrupt("cipher"))?;
        let key_pair = KeyPair::from_private_key(&plaintext).map_err(corrupt("private key"))?;

        let stored = self.address.trim_start_matches("0x").to_lowercase();
        if stored != hex::encode(key_pair.address().as_bytes()) {
            return Err(EngineError::CorruptKeystore(
                "address does not match decrypted key".into(),
            ));
        }

        Ok(key_pair)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(corrupt("json"))
    }

    /// 文件名：`UTC--<时间戳>--<地址>.json`
    pub fn file_name(&self) -> String {
        let now = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S%.9fZ");
        format!("UTC--{}--{}.json", now, self.address)
    }

    /// 写入目录（目录不存在时创建）
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(self.file_name());
        std::fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITERATIONS: u32 = 1024;

    fn key_pair() -> KeyPair {
        KeyPair::from_private_key_hex(
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        )
        .unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let kp = key_pair();
        let keystore = Keystore::encrypt(&kp, "testpassword", ITERATIONS).unwrap();
        assert_eq!(keystore.version, 3);
        assert_eq!(keystore.address, hex::encode(kp.address().as_bytes()));
        assert_eq!(keystore.crypto.cipher, "aes-128-gcm");
        assert_eq!(keystore.crypto.kdfparams.c, ITERATIONS);

        let decrypted = keystore.decrypt("testpassword").unwrap();
        assert_eq!(decrypted, kp);
    }

    #[test]
    fn test_wrong_password() {
        let keystore = Keystore::encrypt(&key_pair(), "testpassword", ITERATIONS).unwrap();
        let err = keystore.decrypt("wrongpassword").unwrap_err();
        assert!(matches!(err, EngineError::BadPassword));
    }

    #[test]
    fn test_tampered_ciphertext_fails_mac() {
        let mut keystore = Keystore::encrypt(&key_pair(), "testpassword", ITERATIONS).unwrap();
        let mut bytes = hex::decode(&keystore.crypto.ciphertext).unwrap();
        bytes[0] ^= 0x01;
        keystore.crypto.ciphertext = hex::encode(bytes);
        assert!(matches!(
            keystore.decrypt("testpassword").unwrap_err(),
            EngineError::BadPassword
        ));
    }

    #[test]
    fn test_tampered_iv_is_corrupt() {
        let mut keystore = Keystore::encrypt(&key_pair(), "testpassword", ITERATIONS).unwrap();
        keystore.crypto.cipherparams.iv = "00".repeat(12);
        assert!(matches!(
            keystore.decrypt("testpassword").unwrap_err(),
            EngineError::CorruptKeystore(_)
        ));
    }

    #[test]
    fn test_unsupported_fields_are_corrupt() {
        let mut keystore = Keystore::encrypt(&key_pair(), "testpassword", ITERATIONS).unwrap();
        keystore.crypto.kdf = "scrypt".into();
        assert!(matches!(
            keystore.decrypt("testpassword").unwrap_err(),
            EngineError::CorruptKeystore(_)
        ));

        assert!(matches!(
            Keystore::from_json("{\"version\":3}").unwrap_err(),
            EngineError::CorruptKeystore(_)
        ));
    }

    #[test]
    fn test_hostile_kdf_params_are_corrupt() {
        let keystore = Keystore::encrypt(&key_pair(), "testpassword", ITERATIONS).unwrap();

        for dklen in [usize::MAX, 0, 16, 64] {
            let mut tampered = keystore.clone();
            tampered.crypto.kdfparams.dklen = dklen;
            assert!(
                matches!(
                    tampered.decrypt("testpassword").unwrap_err(),
                    EngineError::CorruptKeystore(_)
                ),
                "dklen {}",
                dklen
            );
        }

        for c in [0, u32::MAX] {
            let mut tampered = keystore.clone();
            tampered.crypto.kdfparams.c = c;
            assert!(matches!(
                tampered.decrypt("testpassword").unwrap_err(),
                EngineError::CorruptKeystore(_)
            ));
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::encrypt(&key_pair(), "testpassword", ITERATIONS).unwrap();
        let path = keystore.write_to_dir(dir.path()).unwrap();

        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("UTC--"));
        assert!(file_name.ends_with(&format!("--{}.json", keystore.address)));

        let loaded = Keystore::read_from(&path).unwrap();
        assert_eq!(loaded, keystore);
    }
}
