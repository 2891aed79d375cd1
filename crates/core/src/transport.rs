//! USB transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that the real USB stack and
//! mock devices share the same interface. A [`UsbTransport`] locates and
//! opens a device; the [`UsbHandle`] it returns owns that open device until
//! it is closed or dropped.

use crate::device::DeviceIdentity;
use crate::error::Result;

/// Opens devices by vendor/product identity.
pub trait UsbTransport: Send {
    /// Open the first attached device matching `identity`.
    ///
    /// Returns [`crate::error::ConnectError::DeviceNotFound`] when nothing
    /// matches.
    fn open(&mut self, identity: DeviceIdentity) -> Result<Box<dyn UsbHandle>>;
}

/// An open device.
pub trait UsbHandle: Send {
    /// Detach any kernel driver when an interface is claimed, and reattach
    /// it on release.
    fn set_auto_detach_kernel_driver(&mut self, enable: bool) -> Result<()>;

    /// Reserve `interface` for exclusive use.
    fn claim_interface(&mut self, interface: u8) -> Result<()>;

    /// Give `interface` back to the system.
    fn release_interface(&mut self, interface: u8) -> Result<()>;

    /// Bulk OUT transfer with no timeout. Returns the number of bytes written.
    fn bulk_write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize>;

    /// Cheap liveness probe: the device is still attached and `endpoint`
    /// reports a positive max packet size.
    fn is_alive(&self, endpoint: u8) -> bool;

    /// Close the device.
    fn close(&mut self);
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use crate::device::HARPOON;

    #[test]
    fn mock_open_fails_when_unplugged() {
        let mut mock = MockTransport::unplugged();
        assert!(mock.open(HARPOON).is_err());
        assert_eq!(mock.state().opened, 0);
    }

    #[test]
    fn mock_handle_records_writes() {
        let mut mock = MockTransport::new();
        let mut handle = mock.open(HARPOON).unwrap();
        assert_eq!(handle.bulk_write(0x02, &[1, 2, 3]).unwrap(), 3);
        assert_eq!(mock.written(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn mock_handle_dies_when_unplugged() {
        let mut mock = MockTransport::new();
        let handle = mock.open(HARPOON).unwrap();
        assert!(handle.is_alive(0x02));
        mock.state().plugged_in = false;
        assert!(!handle.is_alive(0x02));
    }
}
