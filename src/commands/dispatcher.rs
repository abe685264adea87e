// commands/dispatcher.rs
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::Change;
use crate::{
    attributes::LightState,
    config::DispatchSettings,
    devices::DeviceClient,
    error::{AppError, Result},
    metrics,
    models::{Device, DeviceResult, Session},
};

/// Applies one [`Change`] to many devices at once.
///
/// Each device gets its own task. Tasks start together, at most
/// `max_concurrency` talk to the vendor at the same time, and `dispatch`
/// only returns once every one of them has finished.
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn DeviceClient>,
    device_timeout: Duration,
    limit: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn DeviceClient>, settings: &DispatchSettings) -> Self {
        Self::with_limits(
            client,
            Duration::from_secs(settings.device_timeout_secs),
            settings.max_concurrency,
        )
    }

    pub fn with_limits(
        client: Arc<dyn DeviceClient>,
        device_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            client,
            device_timeout,
            limit: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn device_timeout(&self) -> Duration {
        self.device_timeout
    }

    /// One result per target, in target order, whatever happened to each.
    pub async fn dispatch(
        &self,
        session: &Session,
        targets: Vec<Device>,
        change: &Change,
    ) -> Vec<DeviceResult> {
        let dispatch_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%dispatch_id, devices = targets.len(), ?change, "Dispatching change");

        let mut placeholders = Vec::with_capacity(targets.len());
        let mut handles = Vec::with_capacity(targets.len());

        for device in targets {
            placeholders.push(DeviceResult::pending(&device));

            let client = Arc::clone(&self.client);
            let limit = Arc::clone(&self.limit);
            let session = session.clone();
            let change = change.clone();
            let deadline = self.device_timeout;
            let span = info_span!("device", %dispatch_id, device = %device.name);

            handles.push(tokio::spawn(
                async move {
                    // The semaphore is never closed.
                    let _permit = limit.acquire_owned().await.ok();
                    control_device(client.as_ref(), &session, &device, &change, deadline).await
                }
                .instrument(span),
            ));
        }

        let results: Vec<DeviceResult> = join_all(handles)
            .await
            .into_iter()
            .zip(placeholders)
            .map(|(joined, mut placeholder)| match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!(%dispatch_id, device = %placeholder.name, error = %err, "Device task failed");
                    placeholder.message =
                        format!("Error controlling {}: task failed: {err}", placeholder.name);
                    placeholder
                }
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            %dispatch_id,
            succeeded,
            total = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dispatch complete"
        );
        metrics::record_dispatch(&results, started.elapsed());

        results
    }
}

async fn control_device(
    client: &dyn DeviceClient,
    session: &Session,
    device: &Device,
    change: &Change,
    deadline: Duration,
) -> DeviceResult {
    let mut result = DeviceResult::pending(device);

    // Best effort: without it the result just has fewer fields filled in.
    match with_deadline(deadline, "reading attributes", client.get_attributes(session, device)).await {
        Ok(attrs) => result.record_state(LightState::from_attributes(&attrs)),
        Err(err) => debug!(error = %err, "Current state unavailable"),
    }

    for step in change.steps() {
        let outcome = match step.encode() {
            Ok(encoded) => {
                let written = with_deadline(
                    deadline,
                    "writing attribute",
                    client.write_attribute(session, device, step.attribute(), &encoded),
                )
                .await;
                written.map(|()| encoded)
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(encoded) => {
                debug!(attr = step.attribute(), value = %encoded, "Attribute written");
                step.apply(&mut result, &encoded);
            }
            Err(err) => {
                warn!(attr = step.attribute(), error = %err, "Failed to set {}", step.label());
                result.message = format!(
                    "Error controlling {}: {} failed: {err}",
                    device.name,
                    step.label()
                );
                return result;
            }
        }
    }

    result.success = true;
    result.message = format!("Successfully controlled {}", device.name);
    result
}

/// Run a vendor call, giving up after `deadline`.
pub async fn with_deadline<T>(
    deadline: Duration,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| AppError::Timeout {
            operation: operation.to_string(),
            after: deadline,
        })?
}
