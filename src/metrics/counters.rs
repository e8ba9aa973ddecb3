//! Counter helpers

use super::labels;

/// Record a pool initialization for the given strategy
pub fn pool_initialized(strategy: &'static str, ok: bool) {
    metrics::counter!(
        labels::POOL_INIT_TOTAL,
        "strategy" => strategy,
        "result" => result_label(ok)
    )
    .increment(1);
}

/// Record a connection created (or not) by the pool manager
pub fn connection_created(ok: bool) {
    metrics::counter!(labels::CONNECTIONS_CREATED_TOTAL, "result" => result_label(ok))
        .increment(1);
}

/// Record a tunnel dial attempt
pub fn dial_attempted(ip_type: &'static str) {
    metrics::counter!(labels::DIAL_ATTEMPTS_TOTAL, "ip_type" => ip_type).increment(1);
}

/// Record a failed tunnel dial
pub fn dial_failed(reason: &'static str) {
    metrics::counter!(labels::DIAL_FAILURES_TOTAL, "reason" => reason).increment(1);
}

/// Record a connect-info refresh
pub fn refresh(ok: bool) {
    metrics::counter!(labels::REFRESH_TOTAL, "result" => result_label(ok)).increment(1);
}

fn result_label(ok: bool) -> &'static str {
    if ok {
        labels::RESULT_OK
    } else {
        labels::RESULT_ERROR
    }
}
