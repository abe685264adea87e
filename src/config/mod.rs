// config/mod.rs
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::Credentials;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub hubspace: HubspaceSettings,
    pub dispatch: DispatchSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Bearer token required by `POST /control`.
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Afero,
    Memory,
}

#[derive(Clone, Deserialize)]
pub struct HubspaceSettings {
    pub backend: Backend,
    pub email: String,
    pub password: String,
    pub auth_url: String,
    pub api_url: String,
    pub client_id: String,
    pub request_timeout_secs: u64,
}

impl HubspaceSettings {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

impl std::fmt::Debug for HubspaceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubspaceSettings")
            .field("backend", &self.backend)
            .field("email", &self.email)
            .field("auth_url", &self.auth_url)
            .field("api_url", &self.api_url)
            .field("client_id", &self.client_id)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// Deadline for each vendor call a device's unit of work makes.
    pub device_timeout_secs: u64,
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Settings {
    /// Defaults, then `config/config.*` if present, then `APP_*` variables
    /// (`APP_SERVER__TOKEN`, `APP_HUBSPACE__EMAIL`, ...).
    pub fn new() -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::with_name("config/config").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_config(builder.build()?)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.token", "")?
            .set_default("hubspace.backend", "afero")?
            .set_default("hubspace.email", "")?
            .set_default("hubspace.password", "")?
            .set_default(
                "hubspace.auth_url",
                "https://accounts.hubspaceconnect.com/auth/realms/thd/protocol/openid-connect/token",
            )?
            .set_default("hubspace.api_url", "https://api2.afero.net")?
            .set_default("hubspace.client_id", "hubspace_android")?
            .set_default("hubspace.request_timeout_secs", 30)?
            .set_default("dispatch.device_timeout_secs", 10)?
            .set_default("dispatch.max_concurrency", 16)?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.port", 9000)?)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.token.trim().is_empty() {
            return Err(AppError::Config("server.token must be set".into()));
        }
        if self.hubspace.backend == Backend::Afero
            && (self.hubspace.email.is_empty() || self.hubspace.password.is_empty())
        {
            return Err(AppError::Config(
                "hubspace.email and hubspace.password are required for the afero backend".into(),
            ));
        }
        if self.dispatch.device_timeout_secs == 0 {
            return Err(AppError::Config("dispatch.device_timeout_secs must be positive".into()));
        }
        if self.dispatch.max_concurrency == 0 {
            return Err(AppError::Config("dispatch.max_concurrency must be positive".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
