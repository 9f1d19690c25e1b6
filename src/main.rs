use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;

use rssitrack::config::{HandshakeMode, LocatorConfig, RangingMode};
use rssitrack::output::{OutputFormat, create_formatter};
use rssitrack::render::Renderer;
use rssitrack::telemetry::SerialLink;
use rssitrack::trilateration::Point2;
use rssitrack::{EstimationPipeline, Shutdown, estimate_channel};

#[derive(Parser, Debug)]
#[command(name = "rssitrack")]
#[command(about = "Track a transmitter from three serial RSSI anchors", long_about = None)]
struct Args {
    /// Serial device for each anchor, in anchor order (overrides the config file)
    ports: Vec<String>,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Serial baud rate
    #[arg(short = 'b', long)]
    baud: Option<u32>,

    /// Anchor coordinate "x,y"; give exactly three, in anchor order
    #[arg(short = 'a', long = "anchor", allow_hyphen_values = true)]
    anchors: Vec<Point2>,

    /// Received power at the reference distance (dBm)
    #[arg(long, allow_hyphen_values = true)]
    p0: Option<f64>,

    /// Path-loss exponent
    #[arg(short = 'n', long)]
    exponent: Option<f64>,

    /// Treat telemetry values as distances instead of RSSI
    #[arg(long)]
    direct: bool,

    /// Smoothing window size per anchor
    #[arg(short = 'w', long)]
    window: Option<usize>,

    /// Anchor synchronization: command, passive, skip
    #[arg(long, value_enum)]
    handshake: Option<HandshakeMode>,

    /// Handshake rounds before giving up (0 = retry forever)
    #[arg(long)]
    handshake_attempts: Option<u32>,

    /// Output format: text, json, csv
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Display refresh interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Show raw positions without viewport clamping
    #[arg(long)]
    no_clamp: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = build_config(&args)?;

    if args.dump_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    if config.serial.ports.len() != 3 {
        bail!(
            "need exactly three anchor ports, got {}",
            config.serial.ports.len()
        );
    }

    let links = open_links(&config)?;

    let shutdown = Shutdown::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupt received, shutting down");
        handler_shutdown.trigger();
    })
    .context("Failed to install interrupt handler")?;

    let (publisher, reader) = estimate_channel();
    let mut pipeline = EstimationPipeline::new(&config, publisher)?;

    let renderer = Renderer::new(
        reader,
        create_formatter(args.format, args.verbose > 0),
        config.display.clamp_viewport(),
        config.display.tick_interval(),
    );
    let render_handle = renderer
        .spawn(shutdown.clone())
        .context("Failed to start renderer")?;

    let result = pipeline.run(links, &shutdown);

    shutdown.trigger();
    match render_handle.join() {
        Ok(Err(e)) => log::warn!("Renderer failed: {}", e),
        Err(_) => log::warn!("Renderer thread panicked"),
        Ok(Ok(_)) => {}
    }

    let stats = result?;
    eprintln!(
        "{} iterations, {} positions, {} parse failures, {} singular solves",
        stats.iterations, stats.published, stats.parse_failures, stats.singular
    );
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<LocatorConfig> {
    let mut config = match &args.config {
        Some(path) => LocatorConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => LocatorConfig::default(),
    };

    if !args.ports.is_empty() {
        config.serial.ports = args.ports.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    match args.anchors.as_slice() {
        [] => {}
        [a, b, c] => config.anchors.positions = [*a, *b, *c],
        other => bail!("expected three --anchor values, got {}", other.len()),
    }
    if let Some(p0) = args.p0 {
        config.path_loss.reference_power_dbm = p0;
    }
    if let Some(n) = args.exponent {
        config.path_loss.exponent = n;
    }
    if args.direct {
        config.path_loss.mode = RangingMode::Direct;
    }
    if let Some(w) = args.window {
        config.smoothing.window_size = w;
    }
    if let Some(mode) = args.handshake {
        config.handshake.mode = mode;
    }
    if let Some(attempts) = args.handshake_attempts {
        config.handshake.max_attempts = attempts;
    }
    if let Some(tick) = args.tick_ms {
        config.display.tick_interval_ms = tick;
    }
    if args.no_clamp {
        config.display.clamp = false;
    }

    config.validate()?;
    Ok(config)
}

fn open_links(config: &LocatorConfig) -> anyhow::Result<[SerialLink; 3]> {
    let open = |path: &String| {
        SerialLink::open(path, config.serial.baud_rate, config.serial.timeout())
            .with_context(|| format!("Failed to open {}", path))
    };
    let [p1, p2, p3] = config.serial.ports.as_slice() else {
        bail!("need exactly three anchor ports");
    };
    Ok([open(p1)?, open(p2)?, open(p3)?])
}
