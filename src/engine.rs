use std::sync::Arc;

use ethers::types::Address;
use rust_decimal::Decimal;

use crate::{
    config::EngineConfig,
    domain::{
        derivation::{HdWallet, KeyDerivation},
        derivation_path::DEFAULT_ETH_PATH,
    },
    error::{EngineError, Result},
    infrastructure::rpc_validator,
    service::{
        blockchain_client::{JsonRpcLedgerClient, LedgerRpc},
        fee_service::{FeeEstimate, FeeEstimator},
        notification_service::{CallbackNotifier, CallbackPayload},
        price_service::{HttpPriceQuoteSource, PriceQuoteSource},
        receipt_resolver::{FeeReceiptResolver, ReceiptKind, TransactionReceiptSummary},
        token_service::TokenService,
        transaction_signer::{SubmitOutcome, TokenTransfer, TransactionSigner, ValueTransfer},
        wallet_service::WalletService,
    },
    utils::{address_validator::AddressValidator, units},
};

/// 引擎
/// 持有只读配置与全部组件
pub struct Engine {
    config: Arc<EngineConfig>,
    ledger: Arc<dyn LedgerRpc>,
    derivation: KeyDerivation,
    signer: TransactionSigner,
    resolver: FeeReceiptResolver,
    tokens: TokenService,
    wallets: WalletService,
    notifier: CallbackNotifier,
    prices: Arc<dyn PriceQuoteSource>,
}

impl Engine {
    /// 使用 HTTP JSON-RPC 节点创建引擎
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let ledger: Arc<dyn LedgerRpc> = Arc::new(JsonRpcLedgerClient::new(&config.node)?);
        Self::with_ledger(config, ledger)
    }

    /// 使用指定节点实现创建引擎
    pub fn with_ledger(config: EngineConfig, ledger: Arc<dyn LedgerRpc>) -> anyhow::Result<Self> {
        let prices: Arc<dyn PriceQuoteSource> =
            Arc::new(HttpPriceQuoteSource::new(&config.price)?);
        Self::with_components(config, ledger, prices)
    }

    pub fn with_components(
        config: EngineConfig,
        ledger: Arc<dyn LedgerRpc>,
        prices: Arc<dyn PriceQuoteSource>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let derivation = KeyDerivation::from_config(&config.wallet);
        let signer = TransactionSigner::new(ledger.clone(), &config.node);
        let resolver = FeeReceiptResolver::new(ledger.clone());
        let tokens = TokenService::new(ledger.clone());
        let wallets = WalletService::new(ledger.clone(), derivation.clone());
        let notifier = CallbackNotifier::new(&config.callback)?;

        tracing::info!(
            chain_id = config.node.chain_id,
            callback_enabled = notifier.is_enabled(),
            "engine initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            ledger,
            derivation,
            signer,
            resolver,
            tokens,
            wallets,
            notifier,
            prices,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerRpc> {
        &self.ledger
    }

    pub fn derivation(&self) -> &KeyDerivation {
        &self.derivation
    }

    pub fn signer(&self) -> &TransactionSigner {
        &self.signer
    }

    pub fn resolver(&self) -> &FeeReceiptResolver {
        &self.resolver
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn wallets(&self) -> &WalletService {
        &self.wallets
    }

    pub fn notifier(&self) -> &CallbackNotifier {
        &self.notifier
    }

    /// 在默认路径 `m/44'/60'/0'/0/0` 上生成 HD 钱包；未给密码时使用配置中的默认密码
    pub fn create_hd_wallet(&self, password: Option<&str>) -> Result<HdWallet> {
        let password = password.unwrap_or(&self.config.wallet.default_password);
        self.derivation.generate_mnemonic(DEFAULT_ETH_PATH, password)
    }

    /// 原生币转账；先校验余额，提交后按业务码回调
    pub async fn transfer_value(
        &self,
        request: &ValueTransfer,
        business_code: Option<String>,
    ) -> Result<SubmitOutcome> {
        let result = self.checked_value_transfer(request).await;
        self.notify(&result, business_code);
        result
    }

    async fn checked_value_transfer(&self, request: &ValueTransfer) -> Result<SubmitOutcome> {
        let from = AddressValidator::parse(&request.from)?;
        let amount = units::ether_to_wei(request.amount_ether)?;
        self.wallets.ensure_sufficient(from, amount).await?;
        self.signer.transfer_value(request).await
    }

    /// 代币转账，提交后按业务码回调
    pub async fn transfer_token(
        &self,
        request: &TokenTransfer,
        business_code: Option<String>,
    ) -> Result<SubmitOutcome> {
        let result = self.signer.transfer_token(request).await;
        self.notify(&result, business_code);
        result
    }

    /// 投递任务在后台运行，返回的 `JoinHandle` 直接分离
    fn notify(&self, result: &Result<SubmitOutcome>, business_code: Option<String>) {
        let Some(code) = business_code else {
            return;
        };
        let payload = match result {
            Ok(outcome) => CallbackPayload::success(outcome.hash_hex(), code),
            Err(e) => CallbackPayload::failure(e, code),
        };
        self.notifier.notify(payload);
    }

    /// 查询回执；交易或回执未就绪时返回 `None`
    pub async fn resolve_receipt(
        &self,
        tx_hash: &str,
        kind: ReceiptKind,
    ) -> Result<Option<TransactionReceiptSummary>> {
        let hash = rpc_validator::validate_tx_hash(tx_hash)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        self.resolver.resolve(hash, kind).await
    }

    /// 代币转账手续费估算（附带配置币种的法币折算）
    pub async fn estimate_token_fee(&self, fee_gwei: Decimal) -> Result<FeeEstimate> {
        let estimate = FeeEstimator::estimate_token_transfer(fee_gwei)?;
        let currency = &self.config.price.currency;
        Ok(FeeEstimator::with_quote(estimate, self.prices.as_ref(), currency).await)
    }

    /// 代币余额（按精度换算）
    pub async fn token_balance(&self, contract: &str, owner: &str) -> Result<String> {
        let contract: Address = AddressValidator::parse(contract)?;
        let owner: Address = AddressValidator::parse(owner)?;
        self.tokens.balance_display(contract, owner).await
    }

    pub fn metrics_text(&self) -> String {
        crate::metrics::render_prometheus()
    }
}
