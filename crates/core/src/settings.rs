//! Validation of user-facing settings before they are encoded.
//!
//! The packet encoders trust their inputs, so everything a user types goes
//! through here first. All validation happens before any device I/O.
//!
//! # Harpoon bounds
//!
//! ## DPI precision
//! - **Range**: 250 – 6,000
//! - **Step size**: 250
//! - A precision of 0 marks a slot as unset; such slots are skipped.
//!
//! ## Polling rate
//! - **Supported values**: 125 Hz, 250 Hz, 500 Hz, 1000 Hz
//! - **Encoding**: report interval in ms (8, 4, 2, 1)
//!
//! ## Colors
//! - 24-bit `0xRRGGBB`, with or without the `0x` prefix
//!
//! ## DPI slots
//! - Indices 0–5

use crate::device::PollingRate;
use crate::error::{Error, Result};
use crate::packet::{Packet, DPI_SLOT_COUNT};

/// Harpoon precision constraints.
pub const PRECISION_MIN: u16 = 250;
pub const PRECISION_MAX: u16 = 6000;
pub const PRECISION_STEP: u16 = 250;

/// Largest 24-bit color.
pub const COLOR_MAX: u32 = 0xff_ffff;

/// An RGB color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Split a `0xRRGGBB` value; bits above 24 are ignored.
    pub const fn from_u24(color: u32) -> Self {
        Self {
            r: (color >> 16) as u8,
            g: (color >> 8) as u8,
            b: color as u8,
        }
    }

    pub const fn to_u24(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:06x}", self.to_u24())
    }
}

/// Precision and indicator color of one DPI slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DpiMode {
    pub precision: u16,
    pub color: Rgb,
}

impl DpiMode {
    /// A slot the user did not configure.
    pub const UNSET: DpiMode = DpiMode {
        precision: 0,
        color: Rgb::new(0, 0, 0),
    };

    pub fn new(precision: u16, color: Rgb) -> Self {
        Self { precision, color }
    }

    pub fn is_set(&self) -> bool {
        self.precision != 0
    }

    /// Config packet for slot `index`, using the precision for both axes.
    pub fn packet(&self, index: u8) -> Packet {
        Packet::dpi_config(
            index,
            self.precision,
            self.precision,
            self.color.r,
            self.color.g,
            self.color.b,
        )
    }
}

/// Validate a precision value.
pub fn validate_precision(precision: u32) -> Result<u16> {
    let in_range = (PRECISION_MIN as u32..=PRECISION_MAX as u32).contains(&precision);
    if !in_range || precision % PRECISION_STEP as u32 != 0 {
        return Err(Error::OutOfRange {
            field: "precision",
            value: precision,
            min: PRECISION_MIN as u32,
            max: PRECISION_MAX as u32,
        });
    }
    Ok(precision as u16)
}

/// Parse and validate a decimal precision.
pub fn parse_precision(input: &str) -> Result<u16> {
    let invalid = || Error::InvalidInput {
        field: "precision",
        input: input.to_string(),
        reason: format!(
            "decimal value must be multiple of {PRECISION_STEP}, between {PRECISION_MIN} and {PRECISION_MAX}"
        ),
    };
    let value: u32 = input.trim().parse().map_err(|_| invalid())?;
    validate_precision(value).map_err(|_| invalid())
}

/// Snap a precision to the nearest step within range.
pub fn round_precision(precision: u16) -> u16 {
    let rounded = precision.saturating_add(PRECISION_STEP / 2) / PRECISION_STEP * PRECISION_STEP;
    rounded.clamp(PRECISION_MIN, PRECISION_MAX)
}

/// Parse a hex color such as `ff0000` or `0xff0000`.
pub fn parse_color(input: &str) -> Result<Rgb> {
    let invalid = || Error::InvalidInput {
        field: "color",
        input: input.to_string(),
        reason: format!("hex value must be <= 0x{COLOR_MAX:06x}"),
    };
    let trimmed = input.trim();
    let raw = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let value = u32::from_str_radix(raw, 16).map_err(|_| invalid())?;
    if value > COLOR_MAX {
        return Err(invalid());
    }
    Ok(Rgb::from_u24(value))
}

/// Validate a DPI slot index.
pub fn validate_slot_index(index: usize) -> Result<u8> {
    if index >= DPI_SLOT_COUNT {
        return Err(Error::OutOfRange {
            field: "slot_index",
            value: index as u32,
            min: 0,
            max: (DPI_SLOT_COUNT - 1) as u32,
        });
    }
    Ok(index as u8)
}

/// Parse and validate a decimal slot index.
pub fn parse_slot_index(input: &str) -> Result<u8> {
    let invalid = || Error::InvalidInput {
        field: "index",
        input: input.to_string(),
        reason: format!("needs decimal value between 0 and {}", DPI_SLOT_COUNT - 1),
    };
    let value: usize = input.trim().parse().map_err(|_| invalid())?;
    validate_slot_index(value).map_err(|_| invalid())
}

/// Validate a polling rate value.
pub fn validate_polling_rate(hz: u16) -> Result<PollingRate> {
    PollingRate::from_hz(hz).ok_or_else(|| {
        let options: Vec<String> = PollingRate::ALL
            .iter()
            .rev()
            .map(|rate| rate.as_hz().to_string())
            .collect();
        Error::InvalidInput {
            field: "polling rate",
            input: hz.to_string(),
            reason: format!("valid options: {}", options.join(", ")),
        }
    })
}

/// Turn a string of slot digits (e.g. `"013"`) into per-slot enable flags.
///
/// Repeated digits are harmless. An empty string disables every slot.
pub fn parse_enabled_slots(input: &str) -> Result<[bool; DPI_SLOT_COUNT]> {
    let mut enabled = [false; DPI_SLOT_COUNT];
    for c in input.chars() {
        let slot = c
            .to_digit(10)
            .map(|d| d as usize)
            .filter(|&d| d < DPI_SLOT_COUNT)
            .ok_or_else(|| Error::InvalidInput {
                field: "mode list",
                input: input.to_string(),
                reason: format!("expecting only decimal values 0 - {}", DPI_SLOT_COUNT - 1),
            })?;
        enabled[slot] = true;
    }
    Ok(enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::enabled_mask;

    #[test]
    fn precision_accepts_steps_in_range() {
        assert_eq!(validate_precision(250).unwrap(), 250);
        assert_eq!(validate_precision(1000).unwrap(), 1000);
        assert_eq!(validate_precision(6000).unwrap(), 6000);
    }

    #[test]
    fn precision_rejects_off_step_and_out_of_range() {
        assert!(validate_precision(0).is_err());
        assert!(validate_precision(260).is_err());
        assert!(validate_precision(6250).is_err());
        assert!(parse_precision("abc").is_err());
        assert!(parse_precision("-250").is_err());
    }

    #[test]
    fn precision_error_explains_constraints() {
        let msg = parse_precision("333").unwrap_err().to_string();
        assert!(msg.contains("multiple of 250"));
        assert!(msg.contains("between 250 and 6000"));
    }

    #[test]
    fn round_precision_snaps_to_nearest_step() {
        assert_eq!(round_precision(1000), 1000);
        assert_eq!(round_precision(1100), 1000);
        assert_eq!(round_precision(1125), 1250);
        assert_eq!(round_precision(0), PRECISION_MIN);
        assert_eq!(round_precision(u16::MAX), PRECISION_MAX);
    }

    #[test]
    fn color_parses_with_and_without_prefix() {
        assert_eq!(parse_color("0xff0000").unwrap(), Rgb::new(0xff, 0, 0));
        assert_eq!(parse_color("00ff00").unwrap(), Rgb::new(0, 0xff, 0));
        assert_eq!(parse_color("0XFFFFFF").unwrap(), Rgb::WHITE);
    }

    #[test]
    fn color_rejects_out_of_range() {
        assert!(parse_color("0x1000000").is_err());
        assert!(parse_color("red").is_err());
        assert!(parse_color("").is_err());
    }

    #[test]
    fn rgb_splits_24_bit_value() {
        let c = Rgb::from_u24(0x123456);
        assert_eq!((c.r, c.g, c.b), (0x12, 0x34, 0x56));
        assert_eq!(c.to_u24(), 0x123456);
        assert_eq!(c.to_string(), "#123456");
    }

    #[test]
    fn slot_index_bounds() {
        for i in 0..DPI_SLOT_COUNT {
            assert_eq!(validate_slot_index(i).unwrap(), i as u8);
        }
        assert!(validate_slot_index(6).is_err());
        assert!(parse_slot_index("6").is_err());
        assert!(parse_slot_index("x").is_err());
    }

    #[test]
    fn polling_rate_validation() {
        assert_eq!(validate_polling_rate(125).unwrap(), PollingRate::Hz125);
        assert_eq!(validate_polling_rate(1000).unwrap(), PollingRate::Hz1000);
        assert!(validate_polling_rate(200).is_err());
        assert!(validate_polling_rate(0).is_err());

        let err = validate_polling_rate(300).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid polling rate '300': valid options: 1000, 500, 250, 125"
        );
    }

    #[test]
    fn enabled_slots_from_digit_string() {
        assert_eq!(enabled_mask(parse_enabled_slots("012345").unwrap()), 0x3f);
        assert_eq!(enabled_mask(parse_enabled_slots("13").unwrap()), 0x0a);
        assert_eq!(enabled_mask(parse_enabled_slots("").unwrap()), 0x00);
        assert_eq!(enabled_mask(parse_enabled_slots("1111").unwrap()), 0x02);
    }

    #[test]
    fn enabled_slots_rejects_bad_digits() {
        assert!(parse_enabled_slots("6").is_err());
        assert!(parse_enabled_slots("0a").is_err());
    }

    #[test]
    fn dpi_mode_builds_config_packet() {
        let mode = DpiMode::new(1000, Rgb::new(0xff, 0, 0));
        assert!(mode.is_set());
        assert_eq!(
            mode.packet(4),
            Packet::dpi_config(4, 1000, 1000, 0xff, 0x00, 0x00)
        );
        assert!(!DpiMode::UNSET.is_set());
    }
}
