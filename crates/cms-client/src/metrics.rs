//! Request and recovery counters
//!
//! Recorded through the `metrics` facade; no-ops unless the host installs a
//! recorder.
//!
//! - `cms_client_requests_total` (counter): labels `method`, `status`
//! - `cms_client_auth_recoveries_total` (counter): labels `grant`, `outcome`

/// Record a completed backend request.
pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "cms_client_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a token recovery attempt after a 401.
pub fn record_recovery(grant: &'static str, outcome: &'static str) {
    metrics::counter!("cms_client_auth_recoveries_total", "grant" => grant, "outcome" => outcome)
        .increment(1);
}
