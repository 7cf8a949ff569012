//! 钱包服务：余额查询、余额校验与 keystore 文件

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ethers::types::{Address, U256};
use k256::ecdsa::SigningKey;

use crate::{
    domain::{
        derivation::{KeyDerivation, KeyPair},
        keystore::Keystore,
    },
    error::{EngineError, Result},
    infrastructure::log_redact::redact_address,
    service::blockchain_client::{BlockTag, LedgerRpc},
    utils::units,
};

/// 新建的钱包文件
#[derive(Debug)]
pub struct WalletFile {
    pub path: PathBuf,
    pub key_pair: KeyPair,
}

/// 余额扣除后必须严格大于 0
pub fn check_sufficient(balance: U256, required: U256) -> Result<()> {
    if balance <= required {
        return Err(EngineError::InsufficientBalance { balance, required });
    }
    Ok(())
}

pub struct WalletService {
    ledger: Arc<dyn LedgerRpc>,
    derivation: KeyDerivation,
}

impl WalletService {
    pub fn new(ledger: Arc<dyn LedgerRpc>, derivation: KeyDerivation) -> Self {
        Self { ledger, derivation }
    }

    pub async fn balance_wei(&self, address: Address) -> Result<U256> {
        self.ledger.get_balance(address, BlockTag::Latest).await
    }

    pub async fn balance_ether(&self, address: Address) -> Result<String> {
        let wei = self.balance_wei(address).await?;
        Ok(units::wei_to_ether(wei))
    }

    /// 校验余额足以支付 `amount`（wei），返回当前余额
    pub async fn ensure_sufficient(&self, address: Address, amount: U256) -> Result<U256> {
        let balance = self.balance_wei(address).await?;
        if let Err(e) = check_sufficient(balance, amount) {
            tracing::warn!(
                address = %redact_address(&format!("{:#x}", address)),
                balance = %balance,
                required = %amount,
                "insufficient balance"
            );
            return Err(e);
        }
        Ok(balance)
    }

    /// 随机生成私钥并写入 `dir` 下的 keystore 文件
    pub fn create_wallet_file<P: AsRef<Path>>(
        &self,
        dir: P,
        password: &str,
    ) -> Result<WalletFile> {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let key_pair = KeyPair::from_signing_key(&signing_key);
        let keystore = self.derivation.encrypt(&key_pair, password)?;
        let path = keystore.write_to_dir(dir)?;

        tracing::info!(
            address = %redact_address(&key_pair.address_hex()),
            file = %path.display(),
            "wallet file created"
        );
        Ok(WalletFile { path, key_pair })
    }

    /// 从 keystore 文件加载密钥对
    pub fn load_wallet<P: AsRef<Path>>(&self, path: P, password: &str) -> Result<KeyPair> {
        let keystore = Keystore::read_from(path)?;
        self.derivation.decrypt(&keystore, password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_sufficient() {
        assert!(check_sufficient(U256::from(10u64), U256::from(9u64)).is_ok());
        // 余额恰好等于转账金额也视为不足
        assert!(matches!(
            check_sufficient(U256::from(10u64), U256::from(10u64)),
            Err(EngineError::InsufficientBalance { .. })
        ));
        assert!(check_sufficient(U256::zero(), U256::zero()).is_err());
    }
}
