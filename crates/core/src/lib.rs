//! harpoon-core: packet encoding and device session for the Corsair Harpoon.
//!
//! This crate provides the cross-platform core logic for configuring a
//! Corsair Harpoon mouse over its vendor bulk endpoint: the fixed-format
//! command packets, a session that tracks the USB connection and recovers
//! from firmware restarts, and validation of user-facing settings.

pub mod device;
pub mod error;
#[cfg(test)]
mod integration_tests;
pub mod packet;
pub mod session;
pub mod settings;
pub mod transport;
pub mod usb;

pub use device::{DeviceIdentity, PollingRate, HARPOON};
pub use error::{ConnectError, Error, Result};
pub use packet::Packet;
pub use session::{DeviceSession, ReconnectStrategy, SessionConfig, SessionState};
