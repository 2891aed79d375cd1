//! Device session: connection lifecycle, packet sending, and deferred
//! follow-up actions.
//!
//! A [`DeviceSession`] is either [`SessionState::Disconnected`] (initial) or
//! [`SessionState::Connected`]. The transport handle exists exactly while
//! connected. Connection callbacks fire once per real transition, on the
//! calling thread.
//!
//! Commands that restart the mouse (see [`Packet::polling_rate`]) arm a
//! [`DeferredAction`] which runs right after the packet is written: the
//! session disconnects, and depending on [`ReconnectStrategy`] either waits
//! and reconnects on the spot or leaves that to the next [`DeviceSession::poll`].

use std::time::Duration;

use crate::device::{DeviceIdentity, COMMAND_ENDPOINT, COMMAND_INTERFACE};
use crate::error::{ConnectError, Error, Result};
use crate::packet::{DeferredAction, Packet, PACKET_LEN};
use crate::transport::{UsbHandle, UsbTransport};
use tracing::{debug, info, warn};

/// How long the firmware needs to come back after a restart.
pub const DEFAULT_RECONNECT_GRACE: Duration = Duration::from_secs(2);

/// Recommended interval between [`DeviceSession::poll`] calls in interactive use.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What to do after a command that makes the mouse restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStrategy {
    /// Disconnect, sleep for `grace`, then reconnect before `send` returns.
    /// For callers without a polling loop (one-shot CLI runs).
    Blocking { grace: Duration },
    /// Only disconnect; the caller's periodic `poll()` reconnects.
    External,
}

impl Default for ReconnectStrategy {
    fn default() -> Self {
        Self::Blocking {
            grace: DEFAULT_RECONNECT_GRACE,
        }
    }
}

/// Session settings resolved at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub identity: DeviceIdentity,
    pub reconnect: ReconnectStrategy,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Callback run on a connection transition. It receives the session, so it
/// can push configuration to a freshly connected mouse.
pub type ConnectionCallback = Box<dyn FnMut(&mut DeviceSession) + Send>;

/// Owns the logical connection to one mouse.
pub struct DeviceSession {
    config: SessionConfig,
    transport: Box<dyn UsbTransport>,
    handle: Option<Box<dyn UsbHandle>>,
    on_connect: Option<ConnectionCallback>,
    on_disconnect: Option<ConnectionCallback>,
    pending: Option<DeferredAction>,
}

impl DeviceSession {
    /// Create a disconnected session.
    pub fn new(transport: Box<dyn UsbTransport>, config: SessionConfig) -> Self {
        Self {
            config,
            transport,
            handle: None,
            on_connect: None,
            on_disconnect: None,
            pending: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.handle.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Register the on-connect callback, replacing any previous one.
    pub fn set_on_connect(&mut self, callback: impl FnMut(&mut DeviceSession) + Send + 'static) {
        self.on_connect = Some(Box::new(callback));
    }

    /// Register the on-disconnect callback, replacing any previous one.
    pub fn set_on_disconnect(
        &mut self,
        callback: impl FnMut(&mut DeviceSession) + Send + 'static,
    ) {
        self.on_disconnect = Some(Box::new(callback));
    }

    /// Arm a follow-up to run after the next successful send, replacing any
    /// follow-up already armed.
    pub fn defer(&mut self, action: DeferredAction) {
        self.pending = Some(action);
    }

    /// Follow-up armed for the next send, if any.
    pub fn pending(&self) -> Option<DeferredAction> {
        self.pending
    }

    /// Open the device, enable kernel-driver auto-detach, and claim the
    /// command interface.
    ///
    /// Already connected sessions are left alone and no callback fires.
    pub fn connect(&mut self) -> std::result::Result<(), ConnectError> {
        if self.is_connected() {
            debug!("connect() while connected; nothing to do");
            return Ok(());
        }

        let identity = self.config.identity;
        let mut handle = self.transport.open(identity).map_err(|e| match e {
            Error::Connect(err) => err,
            other => ConnectError::DeviceNotFound {
                vid: identity.vendor_id,
                pid: identity.product_id,
                detail: other.to_string(),
            },
        })?;

        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            handle.close();
            return Err(ConnectError::DriverDetachUnsupported(e.to_string()));
        }

        if let Err(e) = handle.claim_interface(COMMAND_INTERFACE) {
            handle.close();
            return Err(ConnectError::InterfaceClaimFailed {
                interface: COMMAND_INTERFACE,
                detail: e.to_string(),
            });
        }

        self.handle = Some(handle);
        info!(%identity, "Connected");
        self.fire(Transition::Connected);
        Ok(())
    }

    /// Close the device. Safe to call while disconnected; the callback
    /// only fires when a connection was actually dropped.
    pub fn disconnect(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        handle.close();
        info!(identity = %self.config.identity, "Disconnected");
        self.fire(Transition::Disconnected);
    }

    /// Self-healing tick, meant to run on a fixed interval.
    ///
    /// Connected sessions probe the link and disconnect if the mouse is
    /// gone; disconnected sessions try to connect.
    pub fn poll(&mut self) -> SessionState {
        match self.handle.as_ref().map(|h| h.is_alive(COMMAND_ENDPOINT)) {
            Some(true) => {}
            Some(false) => {
                debug!("Liveness probe failed");
                self.disconnect();
            }
            None => {
                if let Err(e) = self.connect() {
                    debug!(error = %e, "Connect attempt failed");
                }
            }
        }
        self.state()
    }

    /// Write one packet to the command endpoint.
    ///
    /// Blocks until the transfer completes; no timeout is applied. Fails
    /// with [`Error::NotConnected`] without touching the transport when
    /// disconnected. A failed write leaves the connection as it is.
    ///
    /// Any follow-up carried by `packet` replaces the armed one. The armed
    /// follow-up runs once after a successful write and is cleared after
    /// every attempt.
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        if let Some(action) = packet.deferred() {
            self.pending = Some(action);
        }
        let pending = self.pending.take();

        let Some(handle) = self.handle.as_mut() else {
            debug!(kind = ?packet.kind(), "send() while disconnected");
            return Err(Error::NotConnected);
        };

        debug!(?packet, "Sending packet");
        let written = handle
            .bulk_write(COMMAND_ENDPOINT, packet.as_bytes())
            .inspect_err(|e| warn!(kind = ?packet.kind(), error = %e, "Send failed"))?;
        if written != PACKET_LEN {
            warn!(kind = ?packet.kind(), written, "Short write");
            return Err(Error::ShortWrite {
                written,
                expected: PACKET_LEN,
            });
        }

        match pending {
            Some(action) => self.run_deferred(action),
            None => Ok(()),
        }
    }

    fn run_deferred(&mut self, action: DeferredAction) -> Result<()> {
        match action {
            DeferredAction::Reconnect => {
                debug!("Device restarting; dropping connection");
                self.disconnect();
                if let ReconnectStrategy::Blocking { grace } = self.config.reconnect {
                    std::thread::sleep(grace);
                    info!("Reconnecting after device restart");
                    self.connect().inspect_err(
                        |e| warn!(error = %e, "Reconnect after restart failed"),
                    )?;
                }
                Ok(())
            }
        }
    }

    fn fire(&mut self, transition: Transition) {
        let slot = match transition {
            Transition::Connected => &mut self.on_connect,
            Transition::Disconnected => &mut self.on_disconnect,
        };
        // Taken out for the call so the callback can borrow the session.
        let Some(mut callback) = slot.take() else {
            return;
        };
        callback(self);

        // Keep a replacement registered from inside the callback.
        let slot = match transition {
            Transition::Connected => &mut self.on_connect,
            Transition::Disconnected => &mut self.on_disconnect,
        };
        if slot.is_none() {
            *slot = Some(callback);
        }
    }
}

#[derive(Clone, Copy)]
enum Transition {
    Connected,
    Disconnected,
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.release_interface(COMMAND_INTERFACE) {
                debug!(error = %e, "Releasing interface on teardown failed");
            }
        }
        self.disconnect();
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
