// memory.rs
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    attributes::{BRIGHTNESS_ATTR, COLOR_ATTR, POWER_ATTR},
    error::{AppError, Result},
    models::{Attribute, Credentials, Device, Session},
};

/// One lamp on a [`MemoryClient`] account.
#[derive(Debug, Clone)]
pub struct SimulatedLamp {
    id: String,
    name: String,
    device_class: String,
    attributes: BTreeMap<u32, String>,
    fail_reads: bool,
    fail_writes: bool,
    delay: Option<Duration>,
}

impl SimulatedLamp {
    pub fn new(id: &str, name: &str, device_class: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            device_class: device_class.to_string(),
            attributes: BTreeMap::new(),
            fail_reads: false,
            fail_writes: false,
            delay: None,
        }
    }

    pub fn light(id: &str, name: &str) -> Self {
        Self::new(id, name, "light")
    }

    pub fn with_attribute(mut self, attr: u32, value: &str) -> Self {
        self.attributes.insert(attr, value.to_string());
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Every read and write on this lamp takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn to_device(&self) -> Device {
        Device {
            id: self.id.clone(),
            name: self.name.clone(),
            device_class: self.device_class.clone(),
            attributes: self.attribute_list(),
        }
    }

    fn attribute_list(&self) -> Vec<Attribute> {
        self.attributes
            .iter()
            .map(|(id, value)| Attribute {
                id: *id,
                value: value.clone(),
            })
            .collect()
    }
}

/// An in-process stand-in for the vendor cloud, for local runs and tests.
pub struct MemoryClient {
    credentials: Option<Credentials>,
    lamps: RwLock<Vec<SimulatedLamp>>,
    fail_auth: AtomicBool,
    auth_calls: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            credentials: None,
            lamps: RwLock::new(Vec::new()),
            fail_auth: AtomicBool::new(false),
            auth_calls: AtomicUsize::new(0),
        }
    }

    /// A small account with two lights and a fan.
    pub fn demo() -> Self {
        Self::new()
            .with_lamp(
                SimulatedLamp::light("demo-porch", "Porch")
                    .with_attribute(POWER_ATTR, "0")
                    .with_attribute(BRIGHTNESS_ATTR, "64")
                    .with_attribute(COLOR_ATTR, "FFFFFF"),
            )
            .with_lamp(
                SimulatedLamp::light("demo-desk", "Desk Lamp")
                    .with_attribute(POWER_ATTR, "1")
                    .with_attribute(BRIGHTNESS_ATTR, "32")
                    .with_attribute(COLOR_ATTR, "FFB347"),
            )
            .with_lamp(SimulatedLamp::new("demo-fan", "Ceiling Fan", "fan"))
    }

    /// Only accept these credentials from now on.
    pub fn with_credentials(mut self, email: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            email: email.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn with_lamp(mut self, lamp: SimulatedLamp) -> Self {
        self.lamps.get_mut().push(lamp);
        self
    }

    pub fn set_fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    /// How many times `authenticate` has been called.
    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.lamps.read().await.iter().map(SimulatedLamp::to_device).collect()
    }

    pub async fn attribute(&self, device_id: &str, attr: u32) -> Option<String> {
        self.lamps
            .read()
            .await
            .iter()
            .find(|lamp| lamp.id == device_id)
            .and_then(|lamp| lamp.attributes.get(&attr).cloned())
    }

    async fn lamp(&self, device: &Device) -> Option<SimulatedLamp> {
        self.lamps
            .read()
            .await
            .iter()
            .find(|lamp| lamp.id == device.id)
            .cloned()
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::DeviceClient for MemoryClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(AppError::Auth("service unavailable".into()));
        }
        if let Some(expected) = &self.credentials {
            if expected.email != credentials.email || expected.password != credentials.password {
                return Err(AppError::Auth("invalid credentials".into()));
            }
        }
        Ok(Session::new("memory", "memory-token"))
    }

    async fn list_devices(&self, _session: &Session) -> Result<Vec<Device>> {
        Ok(self.devices().await)
    }

    async fn get_attributes(&self, _session: &Session, device: &Device) -> Result<Vec<Attribute>> {
        let lamp = self
            .lamp(device)
            .await
            .ok_or_else(|| AppError::device_query(&device.name, "unknown device"))?;

        if let Some(delay) = lamp.delay {
            tokio::time::sleep(delay).await;
        }
        if lamp.fail_reads {
            return Err(AppError::device_query(&device.name, "device unreachable"));
        }
        Ok(lamp.attribute_list())
    }

    async fn write_attribute(
        &self,
        _session: &Session,
        device: &Device,
        attr: u32,
        value: &str,
    ) -> Result<()> {
        let lamp = self
            .lamp(device)
            .await
            .ok_or_else(|| AppError::device_write(&device.name, attr, "unknown device"))?;

        if let Some(delay) = lamp.delay {
            tokio::time::sleep(delay).await;
        }
        if lamp.fail_writes {
            return Err(AppError::device_write(&device.name, attr, "device unreachable"));
        }

        let mut lamps = self.lamps.write().await;
        if let Some(lamp) = lamps.iter_mut().find(|lamp| lamp.id == device.id) {
            lamp.attributes.insert(attr, value.to_string());
        }
        Ok(())
    }
}
