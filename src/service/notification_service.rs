//! 交易回调通知
//!
//! 提交完成后向业务方 POST 结果；投递在后台任务中进行，失败只记日志

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::task::JoinHandle;

use crate::{config::CallbackConfig, error::EngineError};

type HmacSha256 = Hmac<Sha256>;

/// 签名头
pub const SIGNATURE_HEADER: &str = "X-Callback-Signature";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackError {
    pub code: String,
    pub message: String,
}

impl From<&EngineError> for CallbackError {
    fn from(e: &EngineError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

/// 回调正文：`{result, error, id, businessCode}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    /// 交易哈希
    pub result: Option<String>,
    pub error: Option<CallbackError>,
    pub id: String,
    pub business_code: String,
}

impl CallbackPayload {
    pub fn success(tx_hash: String, business_code: String) -> Self {
        Self {
            result: Some(tx_hash),
            error: None,
            id: uuid::Uuid::new_v4().to_string(),
            business_code,
        }
    }

    pub fn failure(error: &EngineError, business_code: String) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
            id: uuid::Uuid::new_v4().to_string(),
            business_code,
        }
    }
}

/// hex(HMAC-SHA256(secret, body))
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub struct CallbackNotifier {
    client: reqwest::Client,
    config: CallbackConfig,
}

impl CallbackNotifier {
    pub fn new(config: &CallbackConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.url.is_some()
    }

    /// 未配置 URL 或业务码为空时不发送，返回 `None`
    pub fn notify(&self, payload: CallbackPayload) -> Option<JoinHandle<()>> {
        let url = self.config.url.clone()?;
        if payload.business_code.trim().is_empty() {
            return None;
        }

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize callback payload");
                return None;
            }
        };
        let signature = self
            .config
            .secret
            .as_deref()
            .and_then(|secret| sign_body(secret, &body));
        let client = self.client.clone();

        Some(tokio::spawn(async move {
            let mut request = client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
            if let Some(signature) = signature {
                request = request.header(SIGNATURE_HEADER, signature);
            }

            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    crate::metrics::inc_callback(true);
                    tracing::info!(
                        business_code = %payload.business_code,
                        callback_id = %payload.id,
                        "transaction callback delivered"
                    );
                }
                Ok(resp) => {
                    crate::metrics::inc_callback(false);
                    tracing::warn!(
                        business_code = %payload.business_code,
                        status = %resp.status(),
                        "transaction callback rejected"
                    );
                }
                Err(e) => {
                    crate::metrics::inc_callback(false);
                    tracing::warn!(
                        business_code = %payload.business_code,
                        error = %e,
                        "transaction callback failed"
                    );
                }
            }
        }))
    }
}
