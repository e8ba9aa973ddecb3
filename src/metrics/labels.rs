//! Metric names and label values

/// Pool initializations, labelled by strategy and result
pub const POOL_INIT_TOTAL: &str = "dataconnect_pool_init_total";
/// Connections created by the pool manager, labelled by result
pub const CONNECTIONS_CREATED_TOTAL: &str = "dataconnect_connections_created_total";
/// Tunnel dial attempts, labelled by IP type
pub const DIAL_ATTEMPTS_TOTAL: &str = "dataconnect_dial_attempts_total";
/// Failed tunnel dials, labelled by reason
pub const DIAL_FAILURES_TOTAL: &str = "dataconnect_dial_failures_total";
/// Connect-info refreshes against the Admin API, labelled by result
pub const REFRESH_TOTAL: &str = "dataconnect_refresh_total";
/// Tunnel dial latency in milliseconds
pub const DIAL_DURATION_MS: &str = "dataconnect_dial_duration_ms";

/// Strategy label: secure connector
pub const STRATEGY_CONNECTOR: &str = "connector";
/// Strategy label: direct TCP
pub const STRATEGY_TCP: &str = "tcp";

/// Result label: success
pub const RESULT_OK: &str = "ok";
/// Result label: failure
pub const RESULT_ERROR: &str = "error";

/// Dial failure reason: no address of the requested type
pub const REASON_NO_ADDRESS: &str = "no_address";
/// Dial failure reason: TCP connect failed
pub const REASON_TCP: &str = "tcp";
/// Dial failure reason: TLS handshake failed
pub const REASON_TLS: &str = "tls";
/// Dial failure reason: connect info could not be refreshed
pub const REASON_REFRESH: &str = "refresh";
