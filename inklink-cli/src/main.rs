//! Entry point for the `inklink` binary.
//!
//! ```text
//! inklink scan                                 List nearby BLE devices
//! inklink scan --adapter hci1 --seconds 10
//! inklink send --address AA:BB:CC:DD:EE:FF --image photo.png
//! inklink send ... --color-mode bwr --dither bayer --clear
//! inklink --config inklink.toml send ...
//! inklink --gen-config                         Write default config to stdout
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use inklink_cli::config::SenderConfig;
use inklink_cli::render::{self, RenderOptions};
use inklink_core::raster::ColorMode;
use inklink_core::{BleLink, DeviceSession, DitherMode, FlowControl, SessionConfig, scan};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "inklink", about = "Send images to BLE e-paper displays")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "inklink.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover nearby BLE devices.
    Scan {
        /// Bluetooth adapter to use, e.g. hci0.
        #[arg(long)]
        adapter: Option<String>,

        /// Scan duration in seconds.
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },

    /// Send an image to a panel and refresh it.
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct SendArgs {
    /// BLE device address.
    #[arg(long)]
    address: Option<String>,

    /// Bluetooth adapter to use, e.g. hci0.
    #[arg(long)]
    adapter: Option<String>,

    /// Path to the image file.
    #[arg(long)]
    image: PathBuf,

    /// Panel width. Used when detection fails.
    #[arg(long)]
    width: Option<u32>,

    /// Panel height. Used when detection fails.
    #[arg(long)]
    height: Option<u32>,

    /// Clear the screen before sending.
    #[arg(long)]
    clear: bool,

    /// Color mode: bw or bwr.
    #[arg(long)]
    color_mode: Option<ColorMode>,

    /// Dither algorithm: none, floyd, jarvis, stucki, atkinson, bayer.
    #[arg(long)]
    dither: Option<DitherMode>,

    /// Perturbation amplitude for ordered dithering.
    #[arg(long)]
    amplitude: Option<f32>,

    /// Chunks between two acknowledged writes.
    #[arg(long)]
    interleave: Option<usize>,

    /// Fallback transfer unit when the device reports none.
    #[arg(long)]
    mtu: Option<usize>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = SenderConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("inklink v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Scan { adapter, seconds }) => run_scan(&config, adapter, seconds).await,
        Some(Commands::Send(args)) => run_send(&config, args).await,
        None => {
            eprintln!("No command given. Try `inklink scan` or `inklink send --help`.");
            std::process::exit(2);
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────

async fn run_scan(
    config: &SenderConfig,
    adapter: Option<String>,
    seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let adapter = adapter.or_else(|| none_if_empty(&config.device.adapter));
    info!(
        adapter = adapter.as_deref().unwrap_or("default"),
        seconds, "scanning"
    );

    let devices = scan(adapter.as_deref(), Duration::from_secs(seconds)).await?;
    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }
    for device in devices {
        match device.name {
            Some(name) => println!("- {}: {}", device.address, name),
            None => println!("- {}: <unnamed>", device.address),
        }
    }
    Ok(())
}

async fn run_send(
    config: &SenderConfig,
    args: SendArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let address = args
        .address
        .or_else(|| none_if_empty(&config.device.address))
        .ok_or("no device address: pass --address or set [device].address in the config")?;
    let adapter = args.adapter.or_else(|| none_if_empty(&config.device.adapter));

    let mode = match args.color_mode {
        Some(mode) => mode,
        None => config.render.color_mode.parse()?,
    };
    let dither = match args.dither {
        Some(dither) => dither,
        None => config.render.dither.parse()?,
    };
    let opts = RenderOptions {
        mode,
        dither,
        amplitude: args.amplitude.unwrap_or(config.render.bayer_amplitude),
    };

    let mut flow = config.flow();
    if let Some(interleave) = args.interleave {
        flow = FlowControl::new(interleave, flow.pacing);
    }
    let session_config = SessionConfig {
        width: args.width,
        height: args.height,
        clear: args.clear,
        negotiation_timeout: config.negotiation_timeout(),
        flow,
    };

    info!(%address, mode = %opts.mode, dither = %opts.dither, "sending image");
    let mut link = BleLink::open(&address, adapter.as_deref()).await?;
    if let Some(mtu) = args.mtu {
        link = link.with_max_payload(mtu);
    }

    let image_path = args.image;
    let summary = DeviceSession::with_config(link, session_config)
        .run(move |resolution| render::prepare_image(&image_path, resolution, opts))
        .await?;

    info!(
        resolution = %summary.resolution,
        planes = summary.planes,
        chunks = summary.chunks,
        acked = summary.acked,
        bytes = summary.bytes,
        "transfer complete"
    );
    Ok(())
}

fn none_if_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
