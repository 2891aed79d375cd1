//! Integration tests: exercise full session flows against a simulated Harpoon.
//!
//! The mock mouse can be unplugged and replugged, and restarts itself after a
//! polling-rate command, so these tests drive the same connect → configure →
//! restart → reconnect sequences the CLI and GUI go through.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::device::{PollingRate, HARPOON};
    use crate::packet::{class, enabled_mask, Packet, DPI_SLOT_COUNT};
    use crate::session::{DeviceSession, ReconnectStrategy, SessionConfig, SessionState};
    use crate::settings::{self, DpiMode, Rgb};
    use crate::transport::mock::MockTransport;

    fn session(mock: &MockTransport, reconnect: ReconnectStrategy) -> DeviceSession {
        DeviceSession::new(
            Box::new(mock.clone()),
            SessionConfig {
                identity: HARPOON,
                reconnect,
            },
        )
    }

    /// Restart simulation: the mouse drops off the bus after a polling-rate
    /// command and reappears when the test plugs it back in.
    fn restarting_mouse() -> MockTransport {
        let mock = MockTransport::new();
        mock.state().restart_on_class = Some(class::POLLING_RATE);
        mock
    }

    /// Test: one-shot configuration run, as the CLI performs it.
    #[test]
    fn one_shot_configuration_run() {
        let mock = MockTransport::new();
        let mut session = session(
            &mock,
            ReconnectStrategy::Blocking {
                grace: Duration::ZERO,
            },
        );
        session.connect().unwrap();

        let rate = settings::validate_polling_rate(500).unwrap();
        session
            .send(&Packet::polling_rate(rate.interval_code()))
            .unwrap();
        assert!(session.is_connected(), "blocking strategy reconnects");

        let mode = DpiMode::new(
            settings::parse_precision("1000").unwrap(),
            settings::parse_color("0xff0000").unwrap(),
        );
        session.send(&mode.packet(4)).unwrap();
        session.send(&Packet::dpi_mode(4)).unwrap();

        let enabled = settings::parse_enabled_slots("13").unwrap();
        session.send(&Packet::dpi_set_enabled(enabled)).unwrap();

        let written = mock.written();
        assert_eq!(written.len(), 4);
        assert_eq!(&written[0][..5], &[0x07, 0x0a, 0x00, 0x00, 0x02]);
        assert_eq!(
            &written[1][..12],
            &[0x07, 0x13, 0xd4, 0x00, 0x00, 0xe8, 0x03, 0xe8, 0x03, 0xff, 0x00, 0x00]
        );
        assert_eq!(&written[2][..5], &[0x07, 0x13, 0x02, 0x00, 0x04]);
        assert_eq!(&written[3][..5], &[0x07, 0x13, 0x05, 0x00, 0x0a]);
        assert!(written.iter().all(|p| p.len() == 64));
    }

    /// Test: settings are reapplied each time the mouse comes back.
    #[test]
    fn monitor_reapplies_configuration_on_replug() {
        let mock = MockTransport::new();
        let mut session = session(&mock, ReconnectStrategy::External);

        let mode = DpiMode::new(1000, Rgb::WHITE);
        session.set_on_connect(move |s: &mut DeviceSession| {
            s.send(&mode.packet(1)).unwrap();
            s.send(&Packet::dpi_mode(1)).unwrap();
            s.send(&Packet::dpi_set_enabled([false; DPI_SLOT_COUNT]))
                .unwrap();
        });

        assert_eq!(session.poll(), SessionState::Connected);
        assert_eq!(mock.written().len(), 3);

        mock.state().plugged_in = false;
        assert_eq!(session.poll(), SessionState::Disconnected);
        assert_eq!(session.poll(), SessionState::Disconnected);

        mock.state().plugged_in = true;
        assert_eq!(session.poll(), SessionState::Connected);
        let written = mock.written();
        assert_eq!(written.len(), 6);
        assert_eq!(written[0..3], written[3..6]);
    }

    /// Test: polling-rate change with an external poll loop, as the GUI does it.
    #[test]
    fn restart_recovered_by_poll_loop() {
        let mock = restarting_mouse();
        let mut session = session(&mock, ReconnectStrategy::External);

        let events = Arc::new(Mutex::new(Vec::new()));
        let on_connect_events = Arc::clone(&events);
        session.set_on_connect(move |s: &mut DeviceSession| {
            on_connect_events.lock().unwrap().push("connect");
            s.send(&Packet::color(0x00, 0x80, 0xff)).unwrap();
        });
        let on_disconnect_events = Arc::clone(&events);
        session.set_on_disconnect(move |_: &mut DeviceSession| {
            on_disconnect_events.lock().unwrap().push("disconnect");
        });

        assert_eq!(session.poll(), SessionState::Connected);
        session
            .send(&Packet::polling_rate(PollingRate::Hz125.interval_code()))
            .unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);

        // Mouse still rebooting.
        assert_eq!(session.poll(), SessionState::Disconnected);

        mock.state().plugged_in = true;
        assert_eq!(session.poll(), SessionState::Connected);

        assert_eq!(
            *events.lock().unwrap(),
            vec!["connect", "disconnect", "connect"]
        );

        // Polling rate is never resent by the reconnect path.
        let polling_writes = mock
            .written()
            .iter()
            .filter(|p| p[1] == class::POLLING_RATE)
            .count();
        assert_eq!(polling_writes, 1);

        // Later sends are unaffected by the earlier restart.
        session.send(&Packet::dpi_mode(0)).unwrap();
        assert!(session.is_connected());
    }

    /// Test: enable-mask scenarios from user input.
    #[test]
    fn enable_mask_from_only_argument() {
        let mock = MockTransport::new();
        let mut session = session(&mock, ReconnectStrategy::External);
        session.connect().unwrap();

        for (only, mask) in [("012345", 0x3f), ("13", 0x0a), ("5", 0x20)] {
            let enabled = settings::parse_enabled_slots(only).unwrap();
            assert_eq!(enabled_mask(enabled), mask);
            session.send(&Packet::dpi_set_enabled(enabled)).unwrap();
        }

        let masks: Vec<u8> = mock.written().iter().map(|p| p[4]).collect();
        assert_eq!(masks, vec![0x3f, 0x0a, 0x20]);
    }

    /// Test: two sessions never share deferred state.
    #[test]
    fn sessions_are_independent() {
        let first_mock = MockTransport::new();
        let second_mock = MockTransport::new();
        let mut first = session(&first_mock, ReconnectStrategy::External);
        let mut second = session(&second_mock, ReconnectStrategy::External);
        first.connect().unwrap();
        second.connect().unwrap();

        first.send(&Packet::polling_rate(1)).unwrap();
        second.send(&Packet::color(1, 2, 3)).unwrap();

        assert!(!first.is_connected());
        assert!(second.is_connected());
    }
}
