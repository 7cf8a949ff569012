//! 账本节点 JSON-RPC 传输：带超时/重试/指数回退
//!
//! 只有传输层失败（连接、超时、HTTP 非 2xx）会重试；节点返回的 error 对象直接上抛

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use serde::Serialize;
use serde_json::Value;

use crate::{
    config::NodeConfig,
    error::{EngineError, Result},
    infrastructure::rpc_validator,
};

pub struct UpstreamClient {
    http: reqwest::Client,
    rpc_url: String,
    retries: usize,
    next_id: AtomicU64,
}

impl UpstreamClient {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.timeout_ms.min(5_000)))
            .build()
            .map_err(|e| EngineError::NodeUnavailable(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            rpc_url: config.rpc_url.clone(),
            retries: config.retries,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// 发送请求并返回 `result` 字段（节点返回 null 时为 `Value::Null`）
    pub async fn request(&self, method: &'static str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest::new(method, params, id);

        let response = match self.rpc_post(&body).await {
            Ok(v) => v,
            Err(e) => {
                crate::metrics::count_rpc(method, false);
                return Err(e);
            }
        };

        if let Some((code, message)) = rpc_validator::extract_rpc_error(&response) {
            crate::metrics::count_rpc(method, false);
            tracing::debug!(method, code, message = %message, "node returned rpc error");
            return Err(EngineError::Rpc { code, message });
        }

        crate::metrics::count_rpc(method, true);
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn rpc_post(&self, body: &JsonRpcRequest<'_>) -> Result<Value> {
        let mut attempt = 0usize;
        let mut last_error = String::new();
        loop {
            let start = Instant::now();
            let res = self.http.post(&self.rpc_url).json(body).send().await;
            match res {
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        crate::metrics::observe_upstream_latency_ms(
                            start.elapsed().as_millis(),
                            false,
                        );
                        last_error = format!("HTTP {}", status);
                    } else {
                        let v = resp.json::<Value>().await.map_err(|e| {
                            EngineError::NodeUnavailable(format!(
                                "{} returned invalid JSON: {}",
                                body.method, e
                            ))
                        })?;
                        crate::metrics::observe_upstream_latency_ms(
                            start.elapsed().as_millis(),
                            true,
                        );
                        return Ok(v);
                    }
                }
                Err(e) => {
                    crate::metrics::observe_upstream_latency_ms(start.elapsed().as_millis(), false);
                    last_error = e.to_string();
                }
            }

            attempt += 1;
            if attempt > self.retries {
                break;
            }
            let backoff = 50u64 * (1 << attempt.min(5)); // 简单指数回退，最大 1600ms
            tracing::warn!(
                method = body.method,
                attempt,
                backoff_ms = backoff,
                error = %last_error,
                "node request failed, retrying"
            );
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }

        Err(EngineError::NodeUnavailable(format!(
            "{} failed after {} attempt(s): {}",
            body.method, attempt, last_error
        )))
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

impl<'a> JsonRpcRequest<'a> {
    fn new(method: &'a str, params: Vec<Value>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}
