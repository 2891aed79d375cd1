//! harpoon GUI: iced-based desktop application for mouse configuration.

mod color;

use iced::widget::{checkbox, column, container, pick_list, row, slider, text};
use iced::{Color, Element, Length, Subscription, Task as IcedTask, Theme};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harpoon_core::packet::{Packet, DPI_SLOT_COUNT};
use harpoon_core::session::{
    DeviceSession, ReconnectStrategy, SessionConfig, SessionState, DEFAULT_POLL_INTERVAL,
};
use harpoon_core::settings::{self, DpiMode, Rgb};
use harpoon_core::usb::NusbTransport;
use harpoon_core::PollingRate;
use tracing::warn;

/// DPI slot the GUI works in; the mouse is locked to it on connect.
const WORKING_SLOT: u8 = 1;

/// Slider resolution for hue, saturation, and brightness.
const HSV_STEPS: u16 = 360;

/// Auto-cycle speed range; 0 pauses the cycle.
const SPEED_MAX: u16 = 200;
/// Shortest delay between auto-cycle steps.
const MIN_AUTO_DELAY_MS: u16 = 5;

const SEARCHING: &str = "Searching for mouse...";
const RESTARTING: &str = "Restarting mouse...";

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    iced::application("Harpoon", App::update, App::view)
        .theme(|_| Theme::Dark)
        .subscription(App::subscription)
        .run_with(|| (App::new(), IcedTask::none()))
}

/// Settings pushed to the mouse whenever it (re)connects.
#[derive(Debug, Clone, Copy)]
struct Controls {
    precision: u16,
    color: Rgb,
}

impl Controls {
    /// Everything except the polling rate, which would restart the mouse.
    fn packets(&self) -> [Packet; 4] {
        [
            Packet::dpi_mode(WORKING_SLOT),
            Packet::dpi_set_enabled([false; DPI_SLOT_COUNT]),
            DpiMode::new(self.precision, self.color).packet(WORKING_SLOT),
            Packet::color(self.color.r, self.color.g, self.color.b),
        ]
    }
}

/// Status line once a poll has moved the session to `now`.
///
/// Losing the mouse replaces any earlier message, such as a send error.
fn status_after_poll(status: &str, was_connected: bool, now: SessionState) -> String {
    match now {
        SessionState::Connected if !was_connected => String::new(),
        SessionState::Disconnected if was_connected || status.is_empty() => SEARCHING.into(),
        _ => status.into(),
    }
}

/// Application state.
struct App {
    session: DeviceSession,
    controls: Arc<Mutex<Controls>>,
    precision: u16,
    polling_rate: PollingRate,
    hue: u16,
    saturation: u16,
    brightness: u16,
    auto: bool,
    speed: u16,
    status: String,
}

#[derive(Debug, Clone)]
enum Message {
    PollTick,
    PollingRateSelected(PollingRate),
    PrecisionChanged(u16),
    PrecisionReleased,
    HueChanged(u16),
    SaturationChanged(u16),
    BrightnessChanged(u16),
    AutoToggled(bool),
    SpeedChanged(u16),
    AutoTick,
}

impl App {
    fn new() -> Self {
        let precision = 1000;
        let controls = Arc::new(Mutex::new(Controls {
            precision,
            color: color::hsv_to_rgb(0.0, 1.0, 1.0),
        }));

        let mut session = DeviceSession::new(
            Box::new(NusbTransport::new()),
            SessionConfig {
                reconnect: ReconnectStrategy::External,
                ..SessionConfig::default()
            },
        );

        let on_connect = Arc::clone(&controls);
        session.set_on_connect(move |s: &mut DeviceSession| {
            let Ok(controls) = on_connect.lock().map(|c| *c) else {
                return;
            };
            for packet in controls.packets() {
                if let Err(e) = s.send(&packet) {
                    warn!(kind = ?packet.kind(), error = %e, "Reapplying setting failed");
                }
            }
        });

        Self {
            session,
            controls,
            precision,
            polling_rate: PollingRate::Hz1000,
            hue: 0,
            saturation: HSV_STEPS,
            brightness: HSV_STEPS,
            auto: false,
            speed: SPEED_MAX / 2,
            status: SEARCHING.into(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let poll = iced::time::every(DEFAULT_POLL_INTERVAL).map(|_| Message::PollTick);
        match self.auto_delay() {
            Some(delay) => Subscription::batch([
                poll,
                iced::time::every(delay).map(|_| Message::AutoTick),
            ]),
            None => poll,
        }
    }

    fn auto_delay(&self) -> Option<Duration> {
        if !self.auto || self.speed == 0 {
            return None;
        }
        let ms = SPEED_MAX.saturating_sub(self.speed).max(MIN_AUTO_DELAY_MS);
        Some(Duration::from_millis(ms as u64))
    }

    fn current_color(&self) -> Rgb {
        let steps = HSV_STEPS as f32;
        color::hsv_to_rgb(
            self.hue as f32 / steps,
            self.saturation as f32 / steps,
            self.brightness as f32 / steps,
        )
    }

    fn sync_controls(&self) {
        if let Ok(mut controls) = self.controls.lock() {
            controls.precision = self.precision;
            controls.color = self.current_color();
        }
    }

    fn send(&mut self, packet: Packet) {
        if !self.session.is_connected() {
            return;
        }
        if let Err(e) = self.session.send(&packet) {
            self.status = format!("Send error: {e}");
        }
    }

    fn apply_color(&mut self) {
        self.sync_controls();
        let color = self.current_color();
        self.send(Packet::color(color.r, color.g, color.b));
    }

    fn apply_precision(&mut self) {
        self.sync_controls();
        let mode = DpiMode::new(self.precision, self.current_color());
        self.send(mode.packet(WORKING_SLOT));
    }

    fn poll_device(&mut self) {
        let was_connected = self.session.is_connected();
        let now = self.session.poll();
        self.status = status_after_poll(&self.status, was_connected, now);
    }

    fn update(&mut self, message: Message) -> IcedTask<Message> {
        match message {
            Message::PollTick => self.poll_device(),
            Message::PollingRateSelected(rate) => {
                self.polling_rate = rate;
                if self.session.is_connected() {
                    self.status = RESTARTING.into();
                    self.send(Packet::polling_rate(rate.interval_code()));
                }
            }
            Message::PrecisionChanged(value) => {
                self.precision = settings::round_precision(value);
                self.apply_precision();
            }
            Message::PrecisionReleased => {
                self.precision = settings::round_precision(self.precision);
            }
            Message::HueChanged(value) => {
                self.hue = value;
                self.apply_color();
            }
            Message::SaturationChanged(value) => {
                self.saturation = value;
                self.apply_color();
            }
            Message::BrightnessChanged(value) => {
                self.brightness = value;
                self.apply_color();
            }
            Message::AutoToggled(enabled) => self.auto = enabled,
            Message::SpeedChanged(value) => self.speed = value,
            Message::AutoTick => {
                self.hue = (self.hue + 1) % HSV_STEPS;
                self.apply_color();
            }
        }
        IcedTask::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let connected = self.session.is_connected();
        let status_icon = if connected { "[OK]" } else { "[--]" };
        let status_text = if connected {
            "Mouse connected"
        } else {
            "Mouse disconnected"
        };

        let header = column![
            text("Harpoon").size(34),
            text("Configure Corsair Harpoon DPI, polling rate, and lighting").size(16),
        ]
        .spacing(4);

        let device_card = container(
            column![
                text("Device").size(20),
                text(format!("{status_icon} {status_text}")).size(16),
                text(&self.status).size(14),
            ]
            .spacing(8),
        )
        .padding(14)
        .width(Length::Fill);

        let mut content = column![header, device_card].spacing(14);

        // Controls are withheld until the mouse is there to receive them.
        if connected {
            content = content.push(self.performance_card()).push(self.color_card());
        }

        container(content.padding(20).max_width(720))
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .into()
    }

    fn performance_card(&self) -> Element<'_, Message> {
        let rate_options: Vec<PollingRate> = PollingRate::ALL.to_vec();
        container(
            column![
                text("Performance").size(20),
                text(format!("DPI: {}", self.precision)).size(16),
                slider(
                    (settings::PRECISION_MIN as f64)..=(settings::PRECISION_MAX as f64),
                    self.precision as f64,
                    |val| Message::PrecisionChanged(val as u16),
                )
                .step(settings::PRECISION_STEP as f64)
                .on_release(Message::PrecisionReleased),
                row![
                    text("Polling Rate").size(16),
                    pick_list(
                        rate_options,
                        Some(self.polling_rate),
                        Message::PollingRateSelected
                    ),
                ]
                .spacing(10),
            ]
            .spacing(10),
        )
        .padding(14)
        .width(Length::Fill)
        .into()
    }

    fn color_card(&self) -> Element<'_, Message> {
        let color = self.current_color();
        let brightness = self.brightness as f32 / HSV_STEPS as f32;
        let text_color = color::contrasting_text(color, brightness);
        let to_iced = |c: Rgb| Color::from_rgb8(c.r, c.g, c.b);

        let preview = container(text(color.to_string()).size(16))
            .padding(10)
            .width(Length::Fill)
            .style(move |_| container::Style {
                background: Some(to_iced(color).into()),
                text_color: Some(to_iced(text_color)),
                ..container::Style::default()
            });

        let hsv_slider = |label: &'static str, value: u16, on_change: fn(u16) -> Message| {
            row![
                text(label).size(15).width(Length::Fixed(90.0)),
                slider(0.0..=(HSV_STEPS as f64), value as f64, move |v| on_change(
                    v as u16
                ))
                .step(1.0),
            ]
            .spacing(10)
        };

        let mut auto_row = row![checkbox("Cycle colors", self.auto).on_toggle(Message::AutoToggled)]
            .spacing(10);
        if self.auto {
            auto_row = auto_row.push(text("Speed").size(15)).push(
                slider(0.0..=(SPEED_MAX as f64), self.speed as f64, |v| {
                    Message::SpeedChanged(v as u16)
                })
                .step(1.0),
            );
        }

        container(
            column![
                text("Lighting").size(20),
                hsv_slider("Hue", self.hue, Message::HueChanged),
                hsv_slider("Saturation", self.saturation, Message::SaturationChanged),
                hsv_slider("Brightness", self.brightness, Message::BrightnessChanged),
                preview,
                auto_row,
            ]
            .spacing(10),
        )
        .padding(14)
        .width(Length::Fill)
        .into()
    }
}
