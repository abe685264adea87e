// commands/mod.rs
mod dispatcher;
pub use dispatcher::{Dispatcher, with_deadline};

use crate::{
    attributes::{self, BRIGHTNESS_ATTR, COLOR_ATTR, POWER_ATTR, Power},
    error::{AppError, Result},
    models::{ControlRequest, DeviceResult},
};
use validator::Validate;

/// A desired state change; any combination of the three settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Change {
    pub power: Option<Power>,
    pub brightness: Option<u8>,
    /// As the caller wrote it; each device encodes it before writing.
    pub color: Option<String>,
}

impl Change {
    /// The writes this change needs, in the order they are applied.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = Vec::with_capacity(3);
        if let Some(power) = self.power {
            steps.push(Step::Power(power));
        }
        if let Some(brightness) = self.brightness {
            steps.push(Step::Brightness(brightness));
        }
        if let Some(color) = &self.color {
            steps.push(Step::Color(color.clone()));
        }
        steps
    }
}

impl TryFrom<&ControlRequest> for Change {
    type Error = AppError;

    fn try_from(request: &ControlRequest) -> Result<Self> {
        request.validate()?;

        let power = request.action.as_deref().and_then(Power::parse);
        let brightness = request
            .brightness
            .map(|b| {
                u8::try_from(b)
                    .map_err(|_| AppError::Validation("Brightness must be between 0 and 100".into()))
            })
            .transpose()?;

        Ok(Change {
            power,
            brightness,
            color: request.color.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Power(Power),
    Brightness(u8),
    Color(String),
}

impl Step {
    pub fn attribute(&self) -> u32 {
        match self {
            Step::Power(_) => POWER_ATTR,
            Step::Brightness(_) => BRIGHTNESS_ATTR,
            Step::Color(_) => COLOR_ATTR,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Step::Power(_) => "power",
            Step::Brightness(_) => "brightness",
            Step::Color(_) => "color",
        }
    }

    pub fn encode(&self) -> Result<String> {
        match self {
            Step::Power(power) => Ok(attributes::encode_power(*power).to_string()),
            Step::Brightness(percent) => Ok(attributes::encode_brightness(*percent)),
            Step::Color(color) => attributes::encode_color(color),
        }
    }

    /// Record a write that went through.
    pub fn apply(&self, result: &mut DeviceResult, encoded: &str) {
        match self {
            Step::Power(power) => result.power_state = Some(*power),
            Step::Brightness(percent) => result.brightness = Some(*percent),
            Step::Color(_) => result.color = Some(attributes::decode_color(encoded)),
        }
    }
}
