//! AES-128-GCM 加密/解密模块
//! 用于 keystore 中私钥的加密存储，IV 单独保存在 cipherparams 中

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes128Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// 密钥长度（字节）
pub const KEY_LENGTH: usize = 16;
/// IV 长度（字节）
pub const IV_LENGTH: usize = 12;
/// 密码套件标识
pub const CIPHER: &str = "aes-128-gcm";

/// 生成随机 IV
pub fn generate_iv() -> [u8; IV_LENGTH] {
    let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
    let mut iv = [0u8; IV_LENGTH];
    iv.copy_from_slice(&nonce);
    iv
}

/// 加密数据
///
/// # Returns
/// 返回 ciphertext（含 16 字节认证标签）
pub fn encrypt_data(data: &[u8], key: &CipherKey, iv: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_LENGTH {
        return Err(anyhow!("IV must be {} bytes", IV_LENGTH));
    }

    let cipher =
        Aes128Gcm::new_from_slice(key.as_slice()).map_err(|e| anyhow!("Invalid key: {}", e))?;

    cipher
        .encrypt(Nonce::from_slice(iv), data)
        .map_err(|e| anyhow!("Encryption failed: {}", e))
}

/// 解密数据
pub fn decrypt_data(ciphertext: &[u8], key: &CipherKey, iv: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if iv.len() != IV_LENGTH {
        return Err(anyhow!("IV must be {} bytes", IV_LENGTH));
    }

    let cipher =
        Aes128Gcm::new_from_slice(key.as_slice()).map_err(|e| anyhow!("Invalid key: {}", e))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|e| anyhow!("Decryption failed: {}", e))?;

    Ok(Zeroizing::new(plaintext))
}

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherKey {
    key: [u8; KEY_LENGTH],
}

impl CipherKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(anyhow!("Key must be {} bytes for AES-128", KEY_LENGTH));
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.key
    }
}
