//! The control plane behind the HTTP handlers and the `sync` command.
//!
//! Every public operation starts from a fresh [`ControlService::refresh`]:
//! sign in again and list the account's devices. Nothing read from the
//! vendor outlives the call that read it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use tracing::{error, info, warn};

use crate::{
    attributes::LightState,
    commands::{Change, Dispatcher, with_deadline},
    config::DispatchSettings,
    devices::DeviceClient,
    error::{AppError, Result},
    metrics,
    models::{ControlRequest, ControlResponse, Credentials, Device, HealthResponse, LightSummary, Session},
    utils,
};

/// What a refresh found: a live session and every device on the account.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub session: Session,
    pub devices: Vec<Device>,
}

impl Inventory {
    pub fn lights(&self) -> Vec<Device> {
        self.devices.iter().filter(|d| d.is_light()).cloned().collect()
    }
}

pub struct ControlService {
    client: Arc<dyn DeviceClient>,
    credentials: Credentials,
    dispatcher: Dispatcher,
    known_lights: AtomicUsize,
}

impl ControlService {
    pub fn new(
        client: Arc<dyn DeviceClient>,
        credentials: Credentials,
        settings: &DispatchSettings,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&client), settings);
        Self::with_dispatcher(client, credentials, dispatcher)
    }

    pub fn with_dispatcher(
        client: Arc<dyn DeviceClient>,
        credentials: Credentials,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            client,
            credentials,
            dispatcher,
            known_lights: AtomicUsize::new(0),
        }
    }

    /// Light count from the last successful refresh.
    pub fn known_lights(&self) -> usize {
        self.known_lights.load(Ordering::Relaxed)
    }

    /// Sign in again and re-list the account. Any failure here is an
    /// [`AppError::Auth`].
    pub async fn refresh(&self) -> Result<Inventory> {
        let deadline = self.dispatcher.device_timeout();
        let outcome = async {
            let session =
                with_deadline(deadline, "authentication", self.client.authenticate(&self.credentials))
                    .await?;
            let devices =
                with_deadline(deadline, "listing devices", self.client.list_devices(&session)).await?;
            Ok::<_, AppError>(Inventory { session, devices })
        }
        .await;

        match outcome {
            Ok(inventory) => {
                let lights = inventory.devices.iter().filter(|d| d.is_light()).count();
                self.known_lights.store(lights, Ordering::Relaxed);
                metrics::record_refresh(true);
                info!(devices = inventory.devices.len(), lights, "Refreshed Hubspace devices");
                Ok(inventory)
            }
            Err(err) => {
                metrics::record_refresh(false);
                error!(error = %err, "Failed to refresh Hubspace devices");
                Err(match err {
                    AppError::Auth(_) => err,
                    other => AppError::Auth(other.to_string()),
                })
            }
        }
    }

    /// Every light with its current state, read concurrently.
    pub async fn lights(&self) -> Result<Vec<LightSummary>> {
        let inventory = self.refresh().await?;
        let lights = inventory.lights();
        let deadline = self.dispatcher.device_timeout();
        let client = self.client.as_ref();
        let session = &inventory.session;

        let states = join_all(lights.iter().map(|device| async move {
            match with_deadline(
                deadline,
                "reading attributes",
                client.get_attributes(session, device),
            )
            .await
            {
                Ok(attrs) => LightState::from_attributes(&attrs),
                Err(err) => {
                    warn!(device = %device.name, error = %err, "Could not read light state");
                    LightState::default()
                }
            }
        }))
        .await;

        Ok(lights
            .iter()
            .zip(states)
            .map(|(device, state)| LightSummary::new(device, state))
            .collect())
    }

    /// Validate, resolve targets against a fresh device list, fan the change
    /// out and aggregate.
    pub async fn control(&self, request: &ControlRequest) -> Result<ControlResponse> {
        let change = Change::try_from(request)?;

        let inventory = self.refresh().await?;
        let targets = resolve_targets(inventory.lights(), request.name.as_deref())?;
        info!(targets = targets.len(), "Resolved control targets");

        let results = self
            .dispatcher
            .dispatch(&inventory.session, targets, &change)
            .await;

        let response = ControlResponse::from_results(results, utils::epoch_seconds());
        info!(success = response.success, "{}", response.message);
        Ok(response)
    }

    pub async fn health(&self) -> HealthResponse {
        let (connected, lights) = match self.refresh().await {
            Ok(inventory) => (true, inventory.lights().len()),
            Err(_) => (false, self.known_lights()),
        };

        HealthResponse {
            status: "healthy".to_string(),
            hubspace_connected: connected,
            lights_available: lights,
            timestamp: utils::epoch_seconds(),
        }
    }
}

/// All lights, or the ones called `name`. An empty name means all lights.
pub fn resolve_targets(lights: Vec<Device>, name: Option<&str>) -> Result<Vec<Device>> {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return Ok(lights);
    };

    let matched: Vec<Device> = lights
        .into_iter()
        .filter(|d| utils::same_name(&d.name, name))
        .collect();

    if matched.is_empty() {
        return Err(AppError::NotFound(format!("No light found with name '{name}'")));
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{BRIGHTNESS_ATTR, POWER_ATTR, Power};
    use crate::devices::{MemoryClient, SimulatedLamp};
    use std::time::Duration;

    fn service(client: Arc<MemoryClient>) -> ControlService {
        let dispatcher = Dispatcher::with_limits(client.clone(), Duration::from_secs(5), 4);
        ControlService::with_dispatcher(
            client,
            Credentials {
                email: "me@example.com".into(),
                password: "pw".into(),
            },
            dispatcher,
        )
    }

    fn account() -> Arc<MemoryClient> {
        Arc::new(
            MemoryClient::new()
                .with_lamp(SimulatedLamp::light("l1", "Porch").with_attribute(POWER_ATTR, "0"))
                .with_lamp(SimulatedLamp::light("l2", "Desk Lamp").with_attribute(BRIGHTNESS_ATTR, "0A"))
                .with_lamp(SimulatedLamp::new("f1", "Ceiling Fan", "fan")),
        )
    }

    #[tokio::test]
    async fn refresh_keeps_only_lights_and_counts_them() {
        let client = account();
        let service = service(client.clone());
        assert_eq!(service.known_lights(), 0);

        let inventory = service.refresh().await.unwrap();
        assert_eq!(inventory.devices.len(), 3);
        assert_eq!(inventory.lights().len(), 2);
        assert_eq!(service.known_lights(), 2);
    }

    #[tokio::test]
    async fn every_call_authenticates_again() {
        let client = account();
        let service = service(client.clone());

        service.lights().await.unwrap();
        service.health().await;
        service
            .control(&ControlRequest::power(Power::On))
            .await
            .unwrap();

        assert_eq!(client.auth_calls(), 3);
    }

    #[tokio::test]
    async fn name_filter_ignores_case() {
        let client = account();
        let service = service(client.clone());

        let response = service
            .control(&ControlRequest {
                name: Some("desk lamp".into()),
                brightness: Some(75),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].device_id, "l2");
        assert_eq!(client.attribute("l2", BRIGHTNESS_ATTR).await.as_deref(), Some("4B"));
        assert_eq!(client.attribute("l1", BRIGHTNESS_ATTR).await, None);
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let service = service(account());
        let err = service
            .control(&ControlRequest {
                name: Some("Kitchen Lamp".into()),
                action: Some("ON".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn validation_happens_before_contacting_the_vendor() {
        let client = account();
        let service = service(client.clone());
        let err = service.control(&ControlRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(client.auth_calls(), 0);
    }

    #[tokio::test]
    async fn failed_sign_in_is_an_auth_error() {
        let client = account();
        client.set_fail_auth(true);
        let service = service(client);

        let err = service
            .control(&ControlRequest::power(Power::Off))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));

        let health = service.health().await;
        assert!(!health.hubspace_connected);
        assert_eq!(health.lights_available, 0);
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn health_keeps_last_known_count_when_sign_in_fails() {
        let client = account();
        let service = service(client.clone());
        service.refresh().await.unwrap();

        client.set_fail_auth(true);
        let health = service.health().await;
        assert!(!health.hubspace_connected);
        assert_eq!(health.lights_available, 2);
    }

    #[tokio::test]
    async fn lights_reports_unknown_power_when_unreadable() {
        let client = Arc::new(
            MemoryClient::new()
                .with_lamp(SimulatedLamp::light("l1", "Porch").with_attribute(POWER_ATTR, "1"))
                .with_lamp(SimulatedLamp::light("l2", "Attic").failing_reads()),
        );
        let lights = service(client).lights().await.unwrap();

        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].power, "ON");
        assert_eq!(lights[1].power, "UNKNOWN");
    }

    #[test]
    fn no_name_targets_everything() {
        let lights: Vec<Device> = ["A", "B"]
            .into_iter()
            .map(|name| Device {
                id: name.to_lowercase(),
                name: name.to_string(),
                device_class: "light".into(),
                attributes: Vec::new(),
            })
            .collect();
        assert_eq!(resolve_targets(lights.clone(), None).unwrap().len(), 2);
        assert_eq!(resolve_targets(lights, Some("")).unwrap().len(), 2);
    }
}
