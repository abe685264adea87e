// metrics/mod.rs
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::DeviceResult;

pub fn setup_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Config(format!("Failed to setup metrics: {e}")))
}

pub fn record_dispatch(results: &[DeviceResult], elapsed: Duration) {
    for result in results {
        let outcome = if result.success { "success" } else { "failure" };
        metrics::counter!("light_commands_total", "outcome" => outcome).increment(1);
    }
    metrics::histogram!("dispatch_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_refresh(connected: bool) {
    let outcome = if connected { "success" } else { "failure" };
    metrics::counter!("vendor_refresh_total", "outcome" => outcome).increment(1);
}
