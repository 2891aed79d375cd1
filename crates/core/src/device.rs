//! Device model: identity, endpoint layout, discovery, and polling rates.

use crate::error::{Error, Result};
use tracing::{debug, info};

/// Vendor/product pair used to locate the mouse on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Parse a `VID:PID` pair of hex numbers, e.g. `1b1c:1b3c`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidInput {
            field: "device",
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (vid, pid) = input
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("expected VID:PID"))?;
        let parse_hex = |s: &str| {
            let s = s.trim();
            let raw = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .unwrap_or(s);
            u16::from_str_radix(raw, 16).map_err(|_| invalid("IDs must be 16-bit hex values"))
        };
        Ok(Self::new(parse_hex(vid)?, parse_hex(pid)?))
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        HARPOON
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Corsair USB Vendor ID.
pub const CORSAIR_VID: u16 = 0x1b1c;
/// Harpoon RGB Product ID.
pub const HARPOON_PID: u16 = 0x1b3c;

/// Identity of the Corsair Harpoon.
pub const HARPOON: DeviceIdentity = DeviceIdentity::new(CORSAIR_VID, HARPOON_PID);

/// Interface carrying the command endpoint.
pub const COMMAND_INTERFACE: u8 = 1;
/// Bulk OUT endpoint for command packets (EP 2 OUT).
pub const COMMAND_ENDPOINT: u8 = 0x02;

/// An attached device matching the requested identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub identity: DeviceIdentity,
    pub bus_number: u8,
    pub device_address: u8,
    pub product: Option<String>,
    pub serial: Option<String>,
}

/// Enumerate attached USB devices matching `identity`.
pub fn discover_devices(identity: DeviceIdentity) -> Result<Vec<DeviceInfo>> {
    debug!(%identity, "Starting USB device enumeration");
    let list = nusb::list_devices().map_err(|e| Error::Usb(e.to_string()))?;

    let devices: Vec<DeviceInfo> = list
        .filter(|d| d.vendor_id() == identity.vendor_id && d.product_id() == identity.product_id)
        .map(|d| {
            info!(
                %identity,
                bus = d.bus_number(),
                address = d.device_address(),
                "Found matching device"
            );
            DeviceInfo {
                identity,
                bus_number: d.bus_number(),
                device_address: d.device_address(),
                product: d.product_string().map(str::to_string),
                serial: d.serial_number().map(str::to_string),
            }
        })
        .collect();

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Polling rate options supported by the Harpoon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PollingRate {
    Hz125 = 125,
    Hz250 = 250,
    Hz500 = 500,
    Hz1000 = 1000,
}

impl PollingRate {
    /// Convert from raw Hz value.
    pub fn from_hz(hz: u16) -> Option<Self> {
        match hz {
            125 => Some(Self::Hz125),
            250 => Some(Self::Hz250),
            500 => Some(Self::Hz500),
            1000 => Some(Self::Hz1000),
            _ => None,
        }
    }

    /// Get the Hz value.
    pub fn as_hz(&self) -> u16 {
        *self as u16
    }

    /// Report interval in milliseconds, as the firmware expects it.
    pub fn interval_code(&self) -> u8 {
        (1000 / self.as_hz()) as u8
    }

    /// All supported rates.
    pub const ALL: &'static [PollingRate] = &[
        PollingRate::Hz125,
        PollingRate::Hz250,
        PollingRate::Hz500,
        PollingRate::Hz1000,
    ];
}

impl std::fmt::Display for PollingRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.as_hz())
    }
}
