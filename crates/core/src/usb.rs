//! [`UsbTransport`] backed by `nusb`.

use crate::device::DeviceIdentity;
use crate::error::{ConnectError, Error, Result};
use crate::transport::{UsbHandle, UsbTransport};
use futures_lite::future::block_on;
use tracing::{debug, trace};

/// Opens devices through the platform USB stack.
#[derive(Debug, Default)]
pub struct NusbTransport;

impl NusbTransport {
    pub fn new() -> Self {
        Self
    }
}

impl UsbTransport for NusbTransport {
    fn open(&mut self, identity: DeviceIdentity) -> Result<Box<dyn UsbHandle>> {
        let not_found = |detail: String| ConnectError::DeviceNotFound {
            vid: identity.vendor_id,
            pid: identity.product_id,
            detail,
        };

        let info = nusb::list_devices()
            .map_err(|e| not_found(e.to_string()))?
            .find(|d| d.vendor_id() == identity.vendor_id && d.product_id() == identity.product_id)
            .ok_or_else(|| not_found("no matching device on the bus".into()))?;

        let device = info.open().map_err(|e| not_found(e.to_string()))?;
        debug!(
            %identity,
            bus = info.bus_number(),
            address = info.device_address(),
            "Opened USB device"
        );

        Ok(Box::new(NusbHandle {
            identity,
            bus_number: info.bus_number(),
            device_address: info.device_address(),
            device: Some(device),
            interface: None,
            auto_detach: false,
        }))
    }
}

/// An open `nusb` device and, once claimed, its command interface.
struct NusbHandle {
    identity: DeviceIdentity,
    bus_number: u8,
    device_address: u8,
    device: Option<nusb::Device>,
    interface: Option<(u8, nusb::Interface)>,
    auto_detach: bool,
}

impl NusbHandle {
    fn still_enumerated(&self) -> bool {
        nusb::list_devices()
            .map(|mut list| {
                list.any(|d| {
                    d.bus_number() == self.bus_number
                        && d.device_address() == self.device_address
                        && d.vendor_id() == self.identity.vendor_id
                        && d.product_id() == self.identity.product_id
                })
            })
            .unwrap_or(false)
    }

    fn endpoint_max_packet_size(&self, endpoint: u8) -> usize {
        let Some(device) = &self.device else {
            return 0;
        };
        let Ok(config) = device.active_configuration() else {
            return 0;
        };
        for alt in config.interface_alt_settings() {
            if let Some(ep) = alt.endpoints().find(|ep| ep.address() == endpoint) {
                return ep.max_packet_size();
            }
        }
        0
    }
}

impl UsbHandle for NusbHandle {
    fn set_auto_detach_kernel_driver(&mut self, enable: bool) -> Result<()> {
        // nusb detaches as part of the claim; remember the choice for then.
        self.auto_detach = enable;
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> Result<()> {
        let device = self.device.as_ref().ok_or(Error::NotConnected)?;
        let claimed = if self.auto_detach {
            device.detach_and_claim_interface(interface)
        } else {
            device.claim_interface(interface)
        }
        .map_err(|e| Error::Usb(e.to_string()))?;
        self.interface = Some((interface, claimed));
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<()> {
        match self.interface.take() {
            Some((number, claimed)) if number == interface => {
                drop(claimed);
                Ok(())
            }
            Some(other) => {
                self.interface = Some(other);
                Err(Error::Usb(format!("interface {interface} is not claimed")))
            }
            None => Ok(()),
        }
    }

    fn bulk_write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize> {
        let (_, interface) = self.interface.as_ref().ok_or(Error::NotConnected)?;
        trace!(endpoint, bytes = format_args!("{:02x?}", data), "USB write");
        let completion = block_on(interface.bulk_out(endpoint, data.to_vec()));
        let written = completion
            .into_result()
            .map_err(|e| Error::Usb(e.to_string()))?;
        Ok(written.actual_length())
    }

    fn is_alive(&self, endpoint: u8) -> bool {
        self.device.is_some()
            && self.still_enumerated()
            && self.endpoint_max_packet_size(endpoint) > 0
    }

    fn close(&mut self) {
        self.interface = None;
        if self.device.take().is_some() {
            debug!(identity = %self.identity, "Closed USB device");
        }
    }
}
