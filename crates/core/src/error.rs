//! Error types for harpoon-core.

use thiserror::Error;

/// Why a connection attempt failed.
///
/// Each variant names the step of the connect sequence that went wrong, so
/// callers can tell an unplugged mouse apart from a permissions problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// No attached device matches the configured vendor/product identity.
    #[error("could not open device {vid:04x}:{pid:04x}; is it plugged in? ({detail})")]
    DeviceNotFound { vid: u16, pid: u16, detail: String },

    /// The transport refused automatic kernel-driver detachment.
    #[error("could not enable automatic kernel driver detach: {0}")]
    DriverDetachUnsupported(String),

    /// The interface could not be claimed (busy, or insufficient permissions).
    #[error("could not claim interface {interface}: {detail}")]
    InterfaceClaimFailed { interface: u8, detail: String },
}

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Low-level USB failure reported by the transport.
    #[error("USB error: {0}")]
    Usb(String),

    /// Connecting to the device failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Operation requires an open connection.
    #[error("device not connected")]
    NotConnected,

    /// Bulk transfer completed with fewer bytes than requested.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Value out of the range the device accepts.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Malformed user input.
    #[error("invalid {field} '{input}': {reason}")]
    InvalidInput {
        field: &'static str,
        input: String,
        reason: String,
    },
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
