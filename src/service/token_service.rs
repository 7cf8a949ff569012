//! 代币只读调用
//!
//! 所有调用以零地址为调用方、在 latest 区块上执行 `eth_call`

use std::sync::Arc;

use ethers::types::{Address, U256};

use crate::{
    domain::abi::{AbiValue, ContractCallCodec, TokenCallResult, TokenFunction},
    error::{EngineError, Result},
    service::blockchain_client::{BlockTag, CallRequest, LedgerRpc},
};

/// 代币服务
pub struct TokenService {
    ledger: Arc<dyn LedgerRpc>,
}

impl TokenService {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    async fn read(
        &self,
        contract: Address,
        function: TokenFunction,
        args: &[AbiValue],
    ) -> Result<TokenCallResult> {
        let data = ContractCallCodec::encode(function, args)?;
        let output = self
            .ledger
            .call(&CallRequest::read_only(contract, data), BlockTag::Latest)
            .await?;
        ContractCallCodec::decode_output(function, &output)
    }

    async fn read_uint(
        &self,
        contract: Address,
        function: TokenFunction,
        args: &[AbiValue],
    ) -> Result<U256> {
        self.read(contract, function, args).await?.as_uint().ok_or_else(|| {
            EngineError::MalformedReturnData(format!(
                "{} did not return an integer",
                function.name()
            ))
        })
    }

    async fn read_text(&self, contract: Address, function: TokenFunction) -> Result<String> {
        match self.read(contract, function, &[]).await? {
            TokenCallResult::Text(text) => Ok(text),
            _ => Err(EngineError::MalformedReturnData(format!(
                "{} did not return a string",
                function.name()
            ))),
        }
    }

    pub async fn balance_of(&self, contract: Address, owner: Address) -> Result<U256> {
        self.read_uint(contract, TokenFunction::BalanceOf, &[AbiValue::Address(owner)])
            .await
    }

    pub async fn name(&self, contract: Address) -> Result<String> {
        self.read_text(contract, TokenFunction::Name).await
    }

    pub async fn symbol(&self, contract: Address) -> Result<String> {
        self.read_text(contract, TokenFunction::Symbol).await
    }

    pub async fn decimals(&self, contract: Address) -> Result<u32> {
        let raw = self.read_uint(contract, TokenFunction::Decimals, &[]).await?;
        if raw > U256::from(u8::MAX) {
            return Err(EngineError::MalformedReturnData(format!(
                "decimals out of range: {}",
                raw
            )));
        }
        Ok(raw.as_u32())
    }

    pub async fn total_supply(&self, contract: Address) -> Result<U256> {
        self.read_uint(contract, TokenFunction::TotalSupply, &[]).await
    }

    /// 按代币精度换算后的余额
    pub async fn balance_display(&self, contract: Address, owner: Address) -> Result<String> {
        let decimals = self.decimals(contract).await?;
        let raw = self.balance_of(contract, owner).await?;
        let balance = ContractCallCodec::to_decimal(raw, decimals);
        tracing::debug!(
            contract = %format!("{:#x}", contract),
            decimals,
            balance = %balance,
            "token balance read"
        );
        Ok(balance)
    }
}
