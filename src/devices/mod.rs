// devices/mod.rs
mod afero;
mod memory;

pub use afero::AferoClient;
pub use memory::{MemoryClient, SimulatedLamp};

use std::sync::Arc;

use crate::{
    config::{Backend, HubspaceSettings},
    error::Result,
    models::{Attribute, Credentials, Device, Session},
};

/// The vendor account as seen by this service. Implementations report every
/// failure and never retry.
#[async_trait::async_trait]
pub trait DeviceClient: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session>;
    async fn list_devices(&self, session: &Session) -> Result<Vec<Device>>;
    async fn get_attributes(&self, session: &Session, device: &Device) -> Result<Vec<Attribute>>;
    async fn write_attribute(
        &self,
        session: &Session,
        device: &Device,
        attr: u32,
        value: &str,
    ) -> Result<()>;
}

pub fn build_client(settings: &HubspaceSettings) -> Result<Arc<dyn DeviceClient>> {
    Ok(match settings.backend {
        Backend::Afero => Arc::new(AferoClient::new(settings)?),
        Backend::Memory => Arc::new(MemoryClient::demo()),
    })
}
