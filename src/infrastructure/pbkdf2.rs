//! PBKDF2 密钥派生模块
//! 用于从 keystore 密码派生加密密钥与 MAC 密钥

use anyhow::{anyhow, Result};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

/// 默认迭代次数
pub const DEFAULT_ITERATIONS: u32 = 100_000;
/// 盐值长度（字节）
pub const SALT_LENGTH: usize = 32;
/// 派生密钥长度：前 16 字节为加密密钥，后 16 字节为 MAC 密钥
pub const DERIVED_KEY_LENGTH: usize = 32;
/// 派生长度上限
pub const MAX_DERIVED_KEY_LENGTH: usize = 64;
/// 迭代次数上限，外部 keystore 超出即视为损坏
pub const MAX_ITERATIONS: u32 = 10_000_000;
/// PRF 标识
pub const PRF: &str = "hmac-sha256";

/// 生成随机盐值
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// 从密码和盐值派生密钥
///
/// # Arguments
/// * `password` - keystore 密码
/// * `salt` - 盐值（任意非空长度，兼容外部生成的 keystore）
/// * `iterations` - 迭代次数
/// * `dklen` - 派生长度
pub fn derive_key(
    password: &str,
    salt: &[u8],
    iterations: u32,
    dklen: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if salt.is_empty() {
        return Err(anyhow!("Salt must not be empty"));
    }
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return Err(anyhow!(
            "Iteration count must be between 1 and {}",
            MAX_ITERATIONS
        ));
    }
    if !(DERIVED_KEY_LENGTH..=MAX_DERIVED_KEY_LENGTH).contains(&dklen) {
        return Err(anyhow!(
            "Derived key must be {} to {} bytes",
            DERIVED_KEY_LENGTH,
            MAX_DERIVED_KEY_LENGTH
        ));
    }

    let mut key = Zeroizing::new(vec![0u8; dklen]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, key.as_mut_slice());

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pbkdf2_derive() {
        let salt = generate_salt();
        let key1 = derive_key("test_password_123", &salt, 1000, DERIVED_KEY_LENGTH).unwrap();
        assert_eq!(key1.len(), DERIVED_KEY_LENGTH);

        // 相同密码和盐值得到相同密钥
        let key2 = derive_key("test_password_123", &salt, 1000, DERIVED_KEY_LENGTH).unwrap();
        assert_eq!(*key1, *key2);

        // 不同密码得到不同密钥
        let key3 = derive_key("different_password", &salt, 1000, DERIVED_KEY_LENGTH).unwrap();
        assert_ne!(*key1, *key3);
    }

    #[test]
    fn test_rfc7914_vector() {
        // PBKDF2-HMAC-SHA256("passwd", "salt", 1, 64)
        let key = derive_key("passwd", b"salt", 1, 64).unwrap();
        assert_eq!(
            hex::encode(&key[..16]),
            "55ac046e56e3089fec1691c22544b605"
        );
    }

    #[test]
    fn test_rejects_bad_params() {
        assert!(derive_key("pw", b"", 1, 32).is_err());
        assert!(derive_key("pw", b"salt", 0, 32).is_err());
        assert!(derive_key("pw", b"salt", 1, 16).is_err());
        assert!(derive_key("pw", b"salt", 1, usize::MAX).is_err());
        assert!(derive_key("pw", b"salt", MAX_ITERATIONS + 1, 32).is_err());
    }
}
