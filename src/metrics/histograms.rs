//! Histogram helpers

use super::labels;

/// Record how long a successful tunnel dial took
pub fn dial_duration(ip_type: &'static str, millis: u64) {
    metrics::histogram!(labels::DIAL_DURATION_MS, "ip_type" => ip_type).record(millis as f64);
}
