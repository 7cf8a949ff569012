//! 法币报价（仅用于手续费展示）

use std::{collections::HashMap, str::FromStr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::PriceConfig;

/// 缓存有效期（秒）
const CACHE_TTL_SECS: i64 = 300;

/// 报价来源：返回 1 ETH 折合 `currency` 的价格
#[async_trait]
pub trait PriceQuoteSource: Send + Sync {
    async fn quote(&self, currency: &str) -> Result<Decimal>;
}

#[derive(Debug, Clone)]
struct CachedQuote {
    price: Decimal,
    fetched_at: DateTime<Utc>,
}

/// 通过 HTTP GET 拉取 `{"CNY": 1234.5, "USD": 180.2}` 形式的报价
pub struct HttpPriceQuoteSource {
    client: reqwest::Client,
    api_url: String,
    cache: Arc<RwLock<HashMap<String, CachedQuote>>>,
}

impl HttpPriceQuoteSource {
    pub fn new(config: &PriceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build price HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn fetch(&self, currency: &str) -> Result<Decimal> {
        tracing::info!(url = %self.api_url, currency, "fetching price quote");

        let response = self
            .client
            .get(&self.api_url)
            .header("User-Agent", "IronLedger/1.0")
            .send()
            .await
            .context("Failed to fetch price quote")?;

        if !response.status().is_success() {
            anyhow::bail!("Price API error: {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse price response")?;

        parse_quote(&body, currency)
    }
}

/// 从报价 JSON 中取出指定币种
pub fn parse_quote(body: &Value, currency: &str) -> Result<Decimal> {
    let raw = body
        .get(currency)
        .or_else(|| body.get(currency.to_uppercase()))
        .ok_or_else(|| anyhow::anyhow!("Price not found for {}", currency))?;

    // 数值走字符串解析，避免 f64 精度损失
    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => anyhow::bail!("Invalid price value: {}", other),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .with_context(|| format!("Invalid price value: {}", text))
}

#[async_trait]
impl PriceQuoteSource for HttpPriceQuoteSource {
    async fn quote(&self, currency: &str) -> Result<Decimal> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(currency) {
                if (Utc::now() - cached.fetched_at).num_seconds() < CACHE_TTL_SECS {
                    return Ok(cached.price);
                }
            }
        }

        let price = self.fetch(currency).await?;
        self.cache.write().await.insert(
            currency.to_string(),
            CachedQuote {
                price,
                fetched_at: Utc::now(),
            },
        );
        Ok(price)
    }
}
