use std::{
    collections::HashMap,
    sync::{Mutex, OnceLock},
};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

#[derive(Default)]
struct MetricsState {
    rpc_total: u64,
    rpc_errors: u64,
    per_method: HashMap<&'static str, u64>,
    per_method_err: HashMap<&'static str, u64>,
    // 上游成功/失败与时延统计（毫秒）
    upstream_ok: u64,
    upstream_err: u64,
    upstream_latency_sum_ms: u128,
    // 简易直方图分桶（毫秒）：<50, <100, <250, <500, <1000, >=1000
    upstream_hist_buckets: [u64; 6],
    // 广播结果
    broadcast_accepted: u64,
    broadcast_already_known: u64,
    broadcast_rejected: u64,
    // 回执查询
    receipt_resolved: u64,
    receipt_pending: u64,
    // 回调
    callback_ok: u64,
    callback_err: u64,
}

const BUCKET_BOUNDS: [&str; 6] = ["50", "100", "250", "500", "1000", "+Inf"];

fn state() -> std::sync::MutexGuard<'static, MetricsState> {
    let lock = METRICS.get_or_init(|| Mutex::new(MetricsState::default()));
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn count_rpc(method: &'static str, ok: bool) {
    let mut s = state();
    s.rpc_total += 1;
    *s.per_method.entry(method).or_insert(0) += 1;
    if !ok {
        s.rpc_errors += 1;
        *s.per_method_err.entry(method).or_insert(0) += 1;
    }
}

pub fn observe_upstream_latency_ms(latency_ms: u128, ok: bool) {
    let mut s = state();
    if ok {
        s.upstream_ok += 1;
    } else {
        s.upstream_err += 1;
    }
    s.upstream_latency_sum_ms += latency_ms;
    let b = if latency_ms < 50 {
        0
    } else if latency_ms < 100 {
        1
    } else if latency_ms < 250 {
        2
    } else if latency_ms < 500 {
        3
    } else if latency_ms < 1000 {
        4
    } else {
        5
    };
    s.upstream_hist_buckets[b] += 1;
}

pub fn inc_broadcast_accepted() {
    state().broadcast_accepted += 1;
}

pub fn inc_broadcast_already_known() {
    state().broadcast_already_known += 1;
}

pub fn inc_broadcast_rejected() {
    state().broadcast_rejected += 1;
}

pub fn inc_receipt(resolved: bool) {
    let mut s = state();
    if resolved {
        s.receipt_resolved += 1;
    } else {
        s.receipt_pending += 1;
    }
}

pub fn inc_callback(ok: bool) {
    let mut s = state();
    if ok {
        s.callback_ok += 1;
    } else {
        s.callback_err += 1;
    }
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();

    out.push_str("# HELP ironledger_rpc_requests_total Node RPC requests\n");
    out.push_str("# TYPE ironledger_rpc_requests_total counter\n");
    out.push_str(&format!("ironledger_rpc_requests_total {}\n", s.rpc_total));
    out.push_str("# HELP ironledger_rpc_errors_total Node RPC requests that failed\n");
    out.push_str("# TYPE ironledger_rpc_errors_total counter\n");
    out.push_str(&format!("ironledger_rpc_errors_total {}\n", s.rpc_errors));

    let mut methods: Vec<_> = s.per_method.iter().collect();
    methods.sort_by_key(|(m, _)| **m);
    for (method, count) in methods {
        let errors = s.per_method_err.get(method).copied().unwrap_or(0);
        out.push_str(&format!(
            "ironledger_rpc_method_total{{method=\"{}\"}} {}\n",
            method, count
        ));
        out.push_str(&format!(
            "ironledger_rpc_method_errors_total{{method=\"{}\"}} {}\n",
            method, errors
        ));
    }

    out.push_str("# HELP ironledger_upstream_latency_ms Node HTTP latency\n");
    out.push_str("# TYPE ironledger_upstream_latency_ms histogram\n");
    let mut cumulative = 0u64;
    for (bound, count) in BUCKET_BOUNDS.iter().zip(s.upstream_hist_buckets.iter()) {
        cumulative += count;
        out.push_str(&format!(
            "ironledger_upstream_latency_ms_bucket{{le=\"{}\"}} {}\n",
            bound, cumulative
        ));
    }
    out.push_str(&format!(
        "ironledger_upstream_latency_ms_sum {}\n",
        s.upstream_latency_sum_ms
    ));
    out.push_str(&format!(
        "ironledger_upstream_latency_ms_count {}\n",
        s.upstream_ok + s.upstream_err
    ));

    out.push_str("# HELP ironledger_broadcast_total Raw transaction submissions by outcome\n");
    out.push_str("# TYPE ironledger_broadcast_total counter\n");
    out.push_str(&format!(
        "ironledger_broadcast_total{{outcome=\"accepted\"}} {}\n",
        s.broadcast_accepted
    ));
    out.push_str(&format!(
        "ironledger_broadcast_total{{outcome=\"already_known\"}} {}\n",
        s.broadcast_already_known
    ));
    out.push_str(&format!(
        "ironledger_broadcast_total{{outcome=\"rejected\"}} {}\n",
        s.broadcast_rejected
    ));

    out.push_str("# TYPE ironledger_receipt_lookups_total counter\n");
    out.push_str(&format!(
        "ironledger_receipt_lookups_total{{state=\"resolved\"}} {}\n",
        s.receipt_resolved
    ));
    out.push_str(&format!(
        "ironledger_receipt_lookups_total{{state=\"pending\"}} {}\n",
        s.receipt_pending
    ));

    out.push_str("# TYPE ironledger_callbacks_total counter\n");
    out.push_str(&format!(
        "ironledger_callbacks_total{{result=\"ok\"}} {}\n",
        s.callback_ok
    ));
    out.push_str(&format!(
        "ironledger_callbacks_total{{result=\"error\"}} {}\n",
        s.callback_err
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        count_rpc("eth_getBalance", true);
        count_rpc("eth_getBalance", false);
        observe_upstream_latency_ms(42, true);
        inc_broadcast_already_known();

        let text = render_prometheus();
        assert!(text.contains("ironledger_rpc_method_total{method=\"eth_getBalance\"}"));
        assert!(text.contains("ironledger_upstream_latency_ms_bucket{le=\"50\"}"));
        assert!(text.contains("outcome=\"already_known\""));
    }
}
