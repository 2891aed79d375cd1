//! Command packet encoding for the Harpoon's vendor protocol.
//!
//! Every command is a 64-byte buffer sent over bulk OUT endpoint 0x02.
//! The first five bytes form a common header:
//!
//! ```text
//! [0] report id      always 0x07
//! [1] command class  0x22 = lighting, 0x0a = polling rate, 0x13 = DPI
//! [2] subtype        command-specific
//! [3] reserved
//! [4] parameter      command-specific
//! ```
//!
//! followed by a command-specific payload. Unused bytes are zero.
//!
//! Encoders do not validate their inputs; range checks belong to the caller
//! (see [`crate::settings`]).

/// Size of every command packet, matching the endpoint's max packet size.
pub const PACKET_LEN: usize = 64;

/// Report ID that opens every command.
pub const REPORT_ID: u8 = 0x07;

/// Number of DPI slots stored on the mouse.
pub const DPI_SLOT_COUNT: usize = 6;

/// Command classes (header byte 1).
pub mod class {
    /// LED lighting.
    pub const LIGHTING: u8 = 0x22;
    /// USB polling interval.
    pub const POLLING_RATE: u8 = 0x0a;
    /// DPI slot management.
    pub const DPI: u8 = 0x13;
}

/// DPI class subtypes (header byte 2).
pub mod dpi_subtype {
    /// Switch the active slot.
    pub const SELECT_MODE: u8 = 0x02;
    /// Set which slots the DPI button cycles through.
    pub const SET_ENABLED: u8 = 0x05;
    /// Configure a slot; the slot index is OR-ed into the low nibble.
    pub const CONFIG_BASE: u8 = 0xd0;
}

/// Follow-up work a session must run once a packet has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// The firmware restarts after this command; drop the connection and
    /// pick the device back up once it re-enumerates.
    Reconnect,
}

/// Which command a packet encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Color,
    PollingRate,
    DpiMode,
    DpiConfig,
    DpiSetEnabled,
}

/// One fully encoded command.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    bytes: [u8; PACKET_LEN],
    deferred: Option<DeferredAction>,
}

impl Packet {
    fn from_prefix(kind: PacketKind, prefix: &[u8]) -> Self {
        let mut bytes = [0u8; PACKET_LEN];
        bytes[..prefix.len()].copy_from_slice(prefix);
        Self {
            kind,
            bytes,
            deferred: None,
        }
    }

    /// Set the LED to a flat RGB color.
    pub fn color(r: u8, g: u8, b: u8) -> Self {
        Self::from_prefix(
            PacketKind::Color,
            &[REPORT_ID, class::LIGHTING, 0x01, 0x01, 0x03, r, g, b],
        )
    }

    /// Change the USB polling interval.
    ///
    /// `interval_code` is the report interval in milliseconds
    /// (`1000 / hz`). The mouse restarts after accepting this command, so
    /// the packet carries [`DeferredAction::Reconnect`]; a session sending
    /// it will drop and re-establish the connection.
    pub fn polling_rate(interval_code: u8) -> Self {
        let mut packet = Self::from_prefix(
            PacketKind::PollingRate,
            &[REPORT_ID, class::POLLING_RATE, 0x00, 0x00, interval_code],
        );
        packet.deferred = Some(DeferredAction::Reconnect);
        packet
    }

    /// Make slot `index` (0-5) the active DPI slot.
    pub fn dpi_mode(index: u8) -> Self {
        Self::from_prefix(
            PacketKind::DpiMode,
            &[REPORT_ID, class::DPI, dpi_subtype::SELECT_MODE, 0x00, index],
        )
    }

    /// Configure slot `index` with X/Y precision and its indicator color.
    ///
    /// Each precision is written as its low byte followed by bits 8-15.
    pub fn dpi_config(index: u8, x: u16, y: u16, r: u8, g: u8, b: u8) -> Self {
        let [x_lo, x_hi] = x.to_le_bytes();
        let [y_lo, y_hi] = y.to_le_bytes();
        Self::from_prefix(
            PacketKind::DpiConfig,
            &[
                REPORT_ID,
                class::DPI,
                dpi_subtype::CONFIG_BASE | index,
                0x00,
                0x00,
                x_lo,
                x_hi,
                y_lo,
                y_hi,
                r,
                g,
                b,
            ],
        )
    }

    /// Choose which slots the DPI button cycles through.
    pub fn dpi_set_enabled(enabled: [bool; DPI_SLOT_COUNT]) -> Self {
        Self::from_prefix(
            PacketKind::DpiSetEnabled,
            &[
                REPORT_ID,
                class::DPI,
                dpi_subtype::SET_ENABLED,
                0x00,
                enabled_mask(enabled),
            ],
        )
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Raw bytes to put on the wire.
    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.bytes
    }

    /// Follow-up the session must run after this packet is written.
    pub fn deferred(&self) -> Option<DeferredAction> {
        self.deferred
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Trailing zeros are noise in logs.
        let used = self
            .bytes
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        f.debug_struct("Packet")
            .field("kind", &self.kind)
            .field("bytes", &format_args!("{:02x?}", &self.bytes[..used]))
            .field("deferred", &self.deferred)
            .finish()
    }
}

/// Bit `i` set means slot `i` is enabled.
pub fn enabled_mask(enabled: [bool; DPI_SLOT_COUNT]) -> u8 {
    enabled
        .iter()
        .enumerate()
        .fold(0u8, |mask, (i, &on)| mask | ((on as u8) << i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_zero_after(packet: &Packet, used: usize) {
        assert_eq!(packet.as_bytes().len(), PACKET_LEN);
        assert!(
            packet.as_bytes()[used..].iter().all(|&b| b == 0),
            "non-zero padding in {packet:?}"
        );
    }

    #[test]
    fn color_packet_layout() {
        let packet = Packet::color(0x12, 0x34, 0x56);
        assert_eq!(
            &packet.as_bytes()[..8],
            &[0x07, 0x22, 0x01, 0x01, 0x03, 0x12, 0x34, 0x56]
        );
        assert_zero_after(&packet, 8);
        assert_eq!(packet.kind(), PacketKind::Color);
        assert_eq!(packet.deferred(), None);
    }

    #[test]
    fn polling_rate_packet_layout() {
        let packet = Packet::polling_rate(4);
        assert_eq!(&packet.as_bytes()[..5], &[0x07, 0x0a, 0x00, 0x00, 0x04]);
        assert_zero_after(&packet, 5);
    }

    #[test]
    fn polling_rate_packet_requests_reconnect() {
        assert_eq!(
            Packet::polling_rate(1).deferred(),
            Some(DeferredAction::Reconnect)
        );
    }

    #[test]
    fn dpi_mode_packet_layout() {
        let packet = Packet::dpi_mode(3);
        assert_eq!(&packet.as_bytes()[..5], &[0x07, 0x13, 0x02, 0x00, 0x03]);
        assert_zero_after(&packet, 5);
        assert_eq!(packet.deferred(), None);
    }

    #[test]
    fn dpi_config_packet_layout() {
        let packet = Packet::dpi_config(4, 1000, 1000, 0xff, 0x00, 0x00);
        assert_eq!(
            &packet.as_bytes()[..12],
            &[0x07, 0x13, 0xd4, 0x00, 0x00, 0xe8, 0x03, 0xe8, 0x03, 0xff, 0x00, 0x00]
        );
        assert_zero_after(&packet, 12);
    }

    #[test]
    fn dpi_config_splits_x_and_y_independently() {
        let packet = Packet::dpi_config(0, 250, 6000, 1, 2, 3);
        let bytes = packet.as_bytes();
        assert_eq!(bytes[2], 0xd0);
        assert_eq!(&bytes[5..9], &[0xfa, 0x00, 0x70, 0x17]);
        assert_eq!(&bytes[9..12], &[1, 2, 3]);
    }

    #[test]
    fn dpi_config_precision_fields_decode_back() {
        for precision in (250u16..=6000).step_by(250) {
            let packet = Packet::dpi_config(2, precision, precision, 0, 0, 0);
            let bytes = packet.as_bytes();
            let x = u16::from_le_bytes([bytes[5], bytes[6]]);
            let y = u16::from_le_bytes([bytes[7], bytes[8]]);
            assert_eq!(x, precision);
            assert_eq!(y, precision);
            assert_zero_after(&packet, 12);
        }
    }

    #[test]
    fn dpi_set_enabled_packet_layout() {
        let packet = Packet::dpi_set_enabled([true, false, false, false, false, true]);
        assert_eq!(&packet.as_bytes()[..5], &[0x07, 0x13, 0x05, 0x00, 0x21]);
        assert_zero_after(&packet, 5);
    }

    #[test]
    fn enabled_mask_sums_slot_bits() {
        assert_eq!(enabled_mask([false; DPI_SLOT_COUNT]), 0x00);
        assert_eq!(enabled_mask([true; DPI_SLOT_COUNT]), 0x3f);
        assert_eq!(
            enabled_mask([false, true, false, true, false, false]),
            0x0a
        );
    }

    #[test]
    fn debug_output_trims_padding() {
        let rendered = format!("{:?}", Packet::dpi_mode(1));
        assert!(rendered.contains("DpiMode"));
        assert!(rendered.contains("[07, 13, 02, 00, 01]"));
    }
}
