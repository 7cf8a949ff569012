//! 节点连通性检查
//!
//! 用法：`node_probe [--config engine.toml] [--receipt <hash> [--kind transfer|token]] [--metrics]`

use std::sync::Arc;

use anyhow::{Context, Result};
use ironledger::{
    config::EngineConfig,
    infrastructure::logging::init_logging,
    service::{
        blockchain_client::{BlockTag, JsonRpcLedgerClient, LedgerRpc},
        receipt_resolver::ReceiptKind,
    },
    Engine,
};

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    receipt: Option<String>,
    kind: Option<String>,
    metrics: bool,
}

fn parse_args() -> Args {
    let mut parsed = Args::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = args.next(),
            "--receipt" => parsed.receipt = args.next(),
            "--kind" => parsed.kind = args.next(),
            "--metrics" => parsed.metrics = true,
            other => eprintln!("ignoring unknown argument: {}", other),
        }
    }
    parsed
}

struct CheckResult {
    name: &'static str,
    ok: bool,
    detail: String,
}

impl CheckResult {
    fn from_result<T: std::fmt::Display, E: std::fmt::Display>(
        name: &'static str,
        result: std::result::Result<T, E>,
    ) -> Self {
        match result {
            Ok(v) => Self {
                name,
                ok: true,
                detail: v.to_string(),
            },
            Err(e) => Self {
                name,
                ok: false,
                detail: e.to_string(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = parse_args();

    let config = EngineConfig::from_env_and_file(args.config.as_deref())
        .context("load engine configuration")?;
    config.validate().context("invalid engine configuration")?;
    let _guard = init_logging(&config.logging).context("initialize logging")?;

    let ledger: Arc<dyn LedgerRpc> =
        Arc::new(JsonRpcLedgerClient::new(&config.node).context("build node client")?);
    let rpc_url = config.node.rpc_url.clone();
    let engine = Engine::with_ledger(config, ledger.clone())?;

    let mut results = vec![
        CheckResult::from_result("client version", ledger.client_version().await),
        CheckResult::from_result("gas price (wei)", ledger.gas_price().await),
        CheckResult::from_result(
            "zero address nonce",
            ledger
                .get_transaction_count(Default::default(), BlockTag::Latest)
                .await,
        ),
    ];

    if let Some(hash) = args.receipt.as_deref() {
        let kind = match args.kind.as_deref() {
            Some("token") => ReceiptKind::Token,
            _ => ReceiptKind::Transfer,
        };
        let summary = engine.resolve_receipt(hash, kind).await.and_then(|s| {
            Ok(match s {
                Some(summary) => serde_json::to_string(&summary)?,
                None => "pending".to_string(),
            })
        });
        results.push(CheckResult::from_result("receipt", summary));
    }

    println!("Ledger node check against: {}", rpc_url);
    let mut failures = 0usize;
    for r in &results {
        if r.ok {
            println!("[OK]   {:20} {}", r.name, r.detail);
        } else {
            failures += 1;
            println!("[FAIL] {:20} {}", r.name, r.detail);
        }
    }

    if args.metrics {
        print!("{}", engine.metrics_text());
    }

    if failures > 0 {
        anyhow::bail!("{} checks failed", failures);
    }

    Ok(())
}
