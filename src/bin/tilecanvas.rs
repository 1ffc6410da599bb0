use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tilecanvas::{
    Background, Color, Message, PlaylistItem, RunOptions, Serial, Set64, Shutdown,
    animation::demo::{Sweep, Twinkles},
    runner::{
        AnimationRunner, Playlist,
        memory::{MemoryTransport, StaticDiscovery},
        transport::DiscoveredDevice,
    },
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tilecanvas", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the hex bytes of a tile packet painting one color.
    Encode(EncodeArgs),
    /// Parse hex packet bytes and print their fields as JSON.
    Decode(DecodeArgs),
    /// Run a built-in animation against simulated tiles and report the traffic.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct EncodeArgs {
    /// Target serial, 12 hex digits.
    #[arg(long)]
    serial: Serial,

    /// Color name, `#rrggbb` or `hue:H saturation:S brightness:B kelvin:K`.
    #[arg(long, default_value = "white")]
    color: Color,

    /// Tile index in the chain.
    #[arg(long, default_value_t = 0)]
    tile: u8,

    /// Transition duration in seconds.
    #[arg(long, default_value_t = 0.0)]
    duration: f64,

    /// Ask the device to acknowledge the packet.
    #[arg(long)]
    ack: bool,
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// Packet bytes as hex.
    hex: String,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Animation to run.
    #[arg(long, value_enum, default_value_t = DemoChoice::Sweep)]
    animation: DemoChoice,

    /// Number of simulated devices.
    #[arg(long, default_value_t = 1)]
    devices: u8,

    /// Tiles per device.
    #[arg(long, default_value_t = 5)]
    tiles: usize,

    /// Stop after this many seconds.
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,

    /// Background: `clear`, `maintain[:color]` or `as_start[:color]`.
    #[arg(long, default_value = "clear")]
    background: Background,

    /// Run options JSON.
    #[arg(long)]
    options: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DemoChoice {
    Sweep,
    Twinkles,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Encode(args) => cmd_encode(args),
        Command::Decode(args) => cmd_decode(args),
        Command::Simulate(args) => cmd_simulate(args).await,
    }
}

fn cmd_encode(args: EncodeArgs) -> anyhow::Result<()> {
    let colors = [args.color; 64];
    let msg = Set64::for_tile(args.serial, args.tile, 8, args.duration, args.ack, &colors);
    println!("{}", hex::encode(msg.as_bytes()));
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let bytes = hex::decode(args.hex.trim()).context("packet is not valid hex")?;
    let msg = Message::from_bytes(&bytes)?;

    let details = match &msg {
        Message::Set64(m) => json!({
            "tile_index": m.tile_index(),
            "width": m.width(),
            "duration": m.duration(),
            "colors": m.colors(),
        }),
        Message::SetColor(m) => json!({
            "color": m.color(),
            "duration": m.duration(),
        }),
        Message::SetLightPower(m) => json!({
            "level": m.level(),
            "duration": m.duration(),
        }),
        Message::SetColorZones(m) => json!({
            "start_index": m.start_index(),
            "end_index": m.end_index(),
            "color": m.color(),
            "duration": m.duration(),
        }),
        Message::SetExtendedColorZones(m) => json!({
            "zone_index": m.zone_index(),
            "duration": m.duration(),
            "colors": m.colors(),
        }),
    };
    let out = json!({
        "pkt_type": msg.pkt_type(),
        "target": msg.target()?,
        "ack_required": msg.ack_required(),
        "payload": details,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn read_options(path: &Path) -> anyhow::Result<RunOptions> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read run options '{}'", path.display()))?;
    let options = RunOptions::from_json(&text)
        .with_context(|| format!("parse run options '{}'", path.display()))?;
    Ok(options)
}

async fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    anyhow::ensure!(
        args.seconds.is_finite() && args.seconds > 0.0,
        "--seconds must be positive"
    );
    let options = match &args.options {
        Some(path) => read_options(path)?,
        None => RunOptions::default(),
    };

    let discovery = StaticDiscovery::new((1..=args.devices).map(|n| {
        DiscoveredDevice::tiles(Serial([0xd0, 0x73, 0xd5, 0, 0, n]), args.tiles)
            .with_color(Color::WHITE.with_brightness(0.2))
    }));
    let transport = MemoryTransport::new();
    let item = match args.animation {
        DemoChoice::Sweep => PlaylistItem::of(Sweep::default(), args.background),
        DemoChoice::Twinkles => PlaylistItem::of(Twinkles::default(), args.background),
    };

    let root = Shutdown::new();
    let runner = AnimationRunner::new(
        Arc::new(transport.clone()),
        Arc::new(discovery),
        options,
        Playlist::single(item).repeating(),
        root.child(),
    );

    let stop = root.clone();
    let seconds = Duration::from_secs_f64(args.seconds);
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(seconds) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        stop.cancel();
    });

    runner.run().await?;

    let mut traffic: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for sent in transport.sent() {
        let entry = traffic.entry(sent.serial.to_string()).or_default();
        entry.0 += 1;
        entry.1 += sent.msgs.len();
    }
    for (serial, (sends, msgs)) in &traffic {
        eprintln!("{serial}: {sends} sends, {msgs} packets");
    }
    Ok(())
}
