//! Conversions between user-facing light settings and the vendor's raw
//! attribute encoding.
//!
//! | id | meaning    | raw value                     |
//! |----|------------|-------------------------------|
//! | 1  | power      | `"01"` on, `"00"` off         |
//! | 2  | brightness | hex byte, `00`..=`64`         |
//! | 4  | color      | six hex digits RGB, no `#`    |
//!
//! Nothing here talks to a device.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::Attribute;

pub const POWER_ATTR: u32 = 1;
pub const BRIGHTNESS_ATTR: u32 = 2;
pub const COLOR_ATTR: u32 = 4;

pub const MAX_BRIGHTNESS: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Power {
    On,
    Off,
}

impl Power {
    /// Case-insensitive parse of `ON` / `OFF`.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("on") {
            Some(Power::On)
        } else if value.eq_ignore_ascii_case("off") {
            Some(Power::Off)
        } else {
            None
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Power::On => f.write_str("ON"),
            Power::Off => f.write_str("OFF"),
        }
    }
}

pub fn encode_power(power: Power) -> &'static str {
    match power {
        Power::On => "01",
        Power::Off => "00",
    }
}

/// The cloud reports power as `"1"`; a value we wrote ourselves reads back
/// as `"01"`. Anything else is off.
pub fn decode_power(value: &str) -> Power {
    match value {
        "1" | "01" => Power::On,
        _ => Power::Off,
    }
}

/// Linear percent to hex byte. Range checks happen at the request boundary.
pub fn encode_brightness(percent: u8) -> String {
    format!("{percent:02X}")
}

pub fn decode_brightness(value: &str) -> Result<u8> {
    u8::from_str_radix(value.trim(), 16)
        .map_err(|_| AppError::Validation(format!("Invalid brightness value '{value}'")))
}

pub fn encode_color(color: &str) -> Result<String> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::Validation(format!(
            "Color must be in hex format (e.g., '#FF0000'), got '{color}'"
        )));
    }
    Ok(hex.to_ascii_uppercase())
}

pub fn decode_color(raw: &str) -> String {
    format!("#{raw}")
}

/// Power, brightness and color pulled out of an attribute set. Missing or
/// undecodable values stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LightState {
    pub power: Option<Power>,
    pub brightness: Option<u8>,
    pub color: Option<String>,
}

impl LightState {
    pub fn from_attributes(attributes: &[Attribute]) -> Self {
        let find = |id: u32| attributes.iter().find(|a| a.id == id).map(|a| a.value.as_str());

        LightState {
            power: find(POWER_ATTR).map(decode_power),
            brightness: find(BRIGHTNESS_ATTR).and_then(|v| decode_brightness(v).ok()),
            color: find(COLOR_ATTR).map(decode_color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(id: u32, value: &str) -> Attribute {
        Attribute {
            id,
            value: value.to_string(),
        }
    }

    #[test]
    fn power_encoding() {
        assert_eq!(encode_power(Power::On), "01");
        assert_eq!(encode_power(Power::Off), "00");
        assert_eq!(decode_power("1"), Power::On);
        assert_eq!(decode_power("01"), Power::On);
        assert_eq!(decode_power("0"), Power::Off);
        assert_eq!(decode_power(""), Power::Off);
    }

    #[test]
    fn power_parse_ignores_case() {
        assert_eq!(Power::parse("on"), Some(Power::On));
        assert_eq!(Power::parse("Off"), Some(Power::Off));
        assert_eq!(Power::parse("dim"), None);
    }

    #[test]
    fn brightness_is_two_uppercase_hex_digits() {
        assert_eq!(encode_brightness(0), "00");
        assert_eq!(encode_brightness(10), "0A");
        assert_eq!(encode_brightness(100), "64");
    }

    #[test]
    fn brightness_survives_the_round_trip() {
        for b in 0..=MAX_BRIGHTNESS {
            assert_eq!(decode_brightness(&encode_brightness(b)).unwrap(), b);
        }
    }

    #[test]
    fn brightness_rejects_garbage() {
        assert!(matches!(decode_brightness("zz"), Err(AppError::Validation(_))));
    }

    #[test]
    fn color_is_normalized() {
        assert_eq!(encode_color("#ff8800").unwrap(), "FF8800");
        assert_eq!(encode_color("00aAbB").unwrap(), "00AABB");
        assert_eq!(decode_color(&encode_color("#a1b2c3").unwrap()), "#A1B2C3");
    }

    #[test]
    fn color_must_be_six_hex_digits() {
        for bad in ["#FFF", "#FF00000", "", "#", "#GG0000", "##FF0000"] {
            assert!(
                matches!(encode_color(bad), Err(AppError::Validation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn state_from_attributes() {
        let state = LightState::from_attributes(&[
            attr(1, "1"),
            attr(2, "32"),
            attr(4, "00FF00"),
            attr(9, "ignored"),
        ]);
        assert_eq!(state.power, Some(Power::On));
        assert_eq!(state.brightness, Some(50));
        assert_eq!(state.color.as_deref(), Some("#00FF00"));
    }

    #[test]
    fn state_leaves_unknowns_unset() {
        let state = LightState::from_attributes(&[attr(2, "not-hex")]);
        assert_eq!(state, LightState::default());
    }
}
