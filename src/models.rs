use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::attributes::{self, LightState, Power};
use crate::service::ControlService;

/// A raw `(id, value)` pair as the vendor reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: u32,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub device_class: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Device {
    pub fn is_light(&self) -> bool {
        !self.name.is_empty() && self.device_class.eq_ignore_ascii_case("light")
    }
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Proof of a successful `authenticate`, handed to every later client call.
#[derive(Clone)]
pub struct Session {
    pub account_id: String,
    pub access_token: String,
}

impl Session {
    pub fn new(account_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_has_change"))]
pub struct ControlRequest {
    /// Name of the light to control (if omitted, affects all lights)
    pub name: Option<String>,
    /// Power action: 'ON' or 'OFF'
    #[validate(custom(function = "validate_action"))]
    pub action: Option<String>,
    /// Brightness level 0-100
    #[validate(range(min = 0, max = 100, message = "Brightness must be between 0 and 100"))]
    pub brightness: Option<i64>,
    /// Color in hex format (e.g., '#FF0000')
    #[validate(custom(function = "validate_color"))]
    pub color: Option<String>,
}

impl ControlRequest {
    pub fn power(power: Power) -> Self {
        Self {
            action: Some(power.to_string()),
            ..Self::default()
        }
    }
}

fn validate_action(action: &str) -> Result<(), ValidationError> {
    match Power::parse(action) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("action").with_message("Action must be 'ON' or 'OFF'".into())),
    }
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    if color.starts_with('#') && attributes::encode_color(color).is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("color")
            .with_message("Color must be in hex format (e.g., '#FF0000')".into()))
    }
}

fn validate_has_change(request: &ControlRequest) -> Result<(), ValidationError> {
    if request.action.is_none() && request.brightness.is_none() && request.color.is_none() {
        return Err(ValidationError::new("empty")
            .with_message("At least one control parameter must be specified".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceResult {
    pub name: String,
    pub device_id: String,
    pub success: bool,
    pub message: String,
    pub power_state: Option<Power>,
    pub brightness: Option<u8>,
    pub color: Option<String>,
}

impl DeviceResult {
    /// A failed result with nothing known yet; filled in as the device is handled.
    pub fn pending(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            device_id: device.id.clone(),
            success: false,
            message: String::new(),
            power_state: None,
            brightness: None,
            color: None,
        }
    }

    pub fn record_state(&mut self, state: LightState) {
        self.power_state = state.power;
        self.brightness = state.brightness;
        self.color = state.color;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<DeviceResult>,
    /// Completion time, seconds since the Unix epoch
    pub timestamp: f64,
}

impl ControlResponse {
    pub fn from_results(results: Vec<DeviceResult>, timestamp: f64) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let total = results.len();
        Self {
            success: succeeded == total,
            message: format!("Controlled {succeeded}/{total} devices successfully"),
            results,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LightSummary {
    pub name: String,
    pub device_id: String,
    /// `ON`, `OFF` or `UNKNOWN` when the state could not be read
    pub power: String,
    pub brightness: Option<u8>,
    pub color: Option<String>,
}

impl LightSummary {
    pub fn new(device: &Device, state: LightState) -> Self {
        Self {
            name: device.name.clone(),
            device_id: device.id.clone(),
            power: state
                .power
                .map(|p| p.to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            brightness: state.brightness,
            color: state.color,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LightsResponse {
    pub lights: Vec<LightSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub hubspace_connected: bool,
    pub lights_available: usize,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiInfo {
    pub message: String,
    pub version: String,
    pub lights_available: usize,
    #[schema(value_type = Object)]
    pub endpoints: serde_json::Value,
}

pub struct AppState {
    pub service: ControlService,
    pub token: String,
}

impl AppState {
    pub fn new(service: ControlService, token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            service,
            token: token.into(),
        })
    }
}
