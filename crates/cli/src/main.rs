//! harpoon CLI: command-line mouse configuration tool.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use harpoon_core::device::{discover_devices, DeviceIdentity};
use harpoon_core::packet::{Packet, DPI_SLOT_COUNT};
use harpoon_core::session::{DeviceSession, ReconnectStrategy, SessionConfig};
use harpoon_core::settings::{self, DpiMode, Rgb};
use harpoon_core::usb::NusbTransport;
use harpoon_core::PollingRate;
use tracing::{info, warn};

/// Poll interval in monitor mode.
const MONITOR_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(
    name = "harpoon",
    version,
    about = "Configure a Corsair Harpoon mouse",
    arg_required_else_help = true
)]
struct Cli {
    /// Set the mouse's polling rate in Hz (1000, 500, 250, 125).
    #[arg(short, long, value_name = "HZ")]
    polling: Option<u16>,

    /// Change precision and color of one DPI slot, e.g. `--dpi 4 1000 0xff0000`.
    /// May be repeated.
    #[arg(
        short,
        long,
        num_args = 3,
        value_names = ["INDEX", "PRECISION", "COLOR"],
        action = ArgAction::Append
    )]
    dpi: Vec<String>,

    /// Allow the DPI button to cycle only through these slots, e.g. `--only 012345`.
    #[arg(short, long, value_name = "SLOTS")]
    only: Option<String>,

    /// Lock every DPI slot to one precision and color. Later `--dpi` and
    /// `--simple` arguments override earlier ones.
    #[arg(short, long, num_args = 2, value_names = ["PRECISION", "COLOR"])]
    simple: Vec<String>,

    /// Set the LED to a flat hex color.
    #[arg(short, long, value_name = "COLOR")]
    color: Option<String>,

    /// Keep running and reapply the settings whenever the mouse (re)connects.
    #[arg(short, long)]
    monitor: bool,

    /// List matching devices and exit.
    #[arg(short, long)]
    list: bool,

    /// USB identity of the mouse.
    #[arg(long, value_name = "VID:PID", default_value = "1b1c:1b3c")]
    device: String,
}

/// Everything the user asked for, validated before any device I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Plan {
    polling: Option<PollingRate>,
    modes: [DpiMode; DPI_SLOT_COUNT],
    color: Option<Rgb>,
    only: Option<[bool; DPI_SLOT_COUNT]>,
}

/// One `--simple` (all slots) or `--dpi` (one slot) occurrence.
enum SlotEdit<'a> {
    All(&'a [String]),
    One(&'a [String]),
}

/// `--simple` and `--dpi` occurrences in the order they were typed.
fn slot_edits<'a>(cli: &'a Cli, matches: &ArgMatches) -> Vec<SlotEdit<'a>> {
    let starts = |id: &str, arity: usize| -> Vec<usize> {
        matches
            .indices_of(id)
            .map(|indices| indices.step_by(arity).collect())
            .unwrap_or_default()
    };

    let mut edits: Vec<(usize, SlotEdit<'a>)> = starts("simple", 2)
        .into_iter()
        .zip(cli.simple.chunks_exact(2).map(SlotEdit::All))
        .chain(
            starts("dpi", 3)
                .into_iter()
                .zip(cli.dpi.chunks_exact(3).map(SlotEdit::One)),
        )
        .collect();
    edits.sort_by_key(|(position, _)| *position);
    edits.into_iter().map(|(_, edit)| edit).collect()
}

impl Plan {
    fn from_cli(cli: &Cli, matches: &ArgMatches) -> harpoon_core::Result<Self> {
        let mut plan = Plan::default();

        if let Some(hz) = cli.polling {
            plan.polling = Some(settings::validate_polling_rate(hz)?);
        }

        for edit in slot_edits(cli, matches) {
            match edit {
                SlotEdit::All(args) => {
                    let mode = DpiMode::new(
                        settings::parse_precision(&args[0])?,
                        settings::parse_color(&args[1])?,
                    );
                    plan.modes = [mode; DPI_SLOT_COUNT];
                }
                SlotEdit::One(args) => {
                    let index = settings::parse_slot_index(&args[0])?;
                    plan.modes[index as usize] = DpiMode::new(
                        settings::parse_precision(&args[1])?,
                        settings::parse_color(&args[2])?,
                    );
                }
            }
        }

        if let Some(color) = &cli.color {
            plan.color = Some(settings::parse_color(color)?);
        }

        if let Some(only) = &cli.only {
            plan.only = Some(settings::parse_enabled_slots(only)?);
        }

        Ok(plan)
    }

    fn is_empty(&self) -> bool {
        self == &Plan::default()
    }

    /// Packets for everything except the polling rate, in send order.
    fn configuration_packets(&self) -> Vec<Packet> {
        let mut packets = Vec::new();
        for (index, mode) in (0u8..).zip(self.modes.iter()) {
            if !mode.is_set() {
                continue;
            }
            packets.push(mode.packet(index));
            packets.push(Packet::dpi_mode(index));
        }
        if let Some(color) = self.color {
            packets.push(Packet::color(color.r, color.g, color.b));
        }
        if let Some(enabled) = self.only {
            packets.push(Packet::dpi_set_enabled(enabled));
        }
        packets
    }
}

fn open_session(identity: DeviceIdentity, reconnect: ReconnectStrategy) -> DeviceSession {
    DeviceSession::new(
        Box::new(NusbTransport::new()),
        SessionConfig {
            identity,
            reconnect,
        },
    )
}

fn list(identity: DeviceIdentity) -> Result<()> {
    let devices = discover_devices(identity)?;
    if devices.is_empty() {
        println!("No device {identity} found.");
        println!("Ensure your mouse is connected and you have access to it.");
    } else {
        for dev in &devices {
            println!(
                "{} {} (bus {:03}, address {:03}{})",
                dev.identity,
                dev.product.as_deref().unwrap_or("unknown product"),
                dev.bus_number,
                dev.device_address,
                dev.serial
                    .as_deref()
                    .map(|s| format!(", serial {s}"))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn run_once(identity: DeviceIdentity, plan: &Plan) -> Result<()> {
    let mut session = open_session(identity, ReconnectStrategy::default());
    session.connect()?;

    if let Some(rate) = plan.polling {
        eprintln!("setting polling rate to {rate}; reconnecting...");
        session
            .send(&Packet::polling_rate(rate.interval_code()))
            .with_context(|| format!("failed to set polling rate to {rate}"))?;
    }

    for packet in plan.configuration_packets() {
        session
            .send(&packet)
            .with_context(|| format!("failed to send {:?} command", packet.kind()))?;
    }

    Ok(())
}

fn run_monitor(identity: DeviceIdentity, plan: Plan) -> Result<()> {
    let mut session = open_session(identity, ReconnectStrategy::External);

    let packets = plan.configuration_packets();
    session.set_on_connect(move |s: &mut DeviceSession| {
        println!("Mouse connected");
        for packet in &packets {
            if let Err(e) = s.send(packet) {
                warn!(kind = ?packet.kind(), error = %e, "Reapplying setting failed");
            }
        }
    });
    session.set_on_disconnect(|_: &mut DeviceSession| println!("Mouse disconnected"));

    info!(%identity, "Monitoring");
    let mut polling = plan.polling;
    loop {
        session.poll();
        apply_polling_rate(&mut session, &mut polling);
        thread::sleep(MONITOR_INTERVAL);
    }
}

/// Send the requested polling rate once the mouse is connected.
///
/// This restarts the mouse and the next connect reapplies everything else.
/// The rate stays pending until a send succeeds.
fn apply_polling_rate(session: &mut DeviceSession, polling: &mut Option<PollingRate>) {
    let Some(rate) = *polling else {
        return;
    };
    if !session.is_connected() {
        return;
    }
    println!("Setting polling rate to {rate}; mouse will restart");
    match session.send(&Packet::polling_rate(rate.interval_code())) {
        Ok(()) => *polling = None,
        Err(e) => warn!(error = %e, "Setting polling rate failed"),
    }
}

fn run(cli: Cli, matches: &ArgMatches) -> Result<()> {
    let identity = DeviceIdentity::parse(&cli.device)?;

    if cli.list {
        return list(identity);
    }

    let plan = Plan::from_cli(&cli, matches)?;
    if cli.monitor {
        return run_monitor(identity, plan);
    }
    if plan.is_empty() {
        bail!("nothing to apply; see --help");
    }
    run_once(identity, &plan)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    match run(cli, &matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[!] {e:#}");
            ExitCode::FAILURE
        }
    }
}
