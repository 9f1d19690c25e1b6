use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use rssitrack::config::{HandshakeMode, LocatorConfig};
use rssitrack::output::{OutputFormat, create_formatter};
use rssitrack::render::Renderer;
use rssitrack::simulation::{SimulationConfig, TargetPath, simulated_anchors};
use rssitrack::trilateration::Point2;
use rssitrack::{EstimationPipeline, LocatorError, Shutdown, estimate_channel};

#[derive(Parser, Debug)]
#[command(name = "simulate")]
#[command(about = "Run the tracker against three simulated anchors", long_about = None)]
struct Args {
    /// TOML locator configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// TOML simulation scenario file
    #[arg(short = 's', long)]
    scenario: Option<PathBuf>,

    /// Fixed transmitter position "x,y" (overrides the scenario target)
    #[arg(short = 't', long, allow_hyphen_values = true)]
    target: Option<Point2>,

    /// RSSI noise standard deviation in dB
    #[arg(long)]
    noise: Option<f64>,

    /// Fraction of lines to garble (0.0-1.0)
    #[arg(long)]
    malformed_rate: Option<f64>,

    /// Delay between lines from each anchor, in milliseconds
    #[arg(long, default_value = "100")]
    interval_ms: u64,

    /// Stop after this many lines per anchor
    #[arg(short = 'l', long)]
    lines: Option<u64>,

    /// Random seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: text, json, csv
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Display refresh interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

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

    let mut config = match &args.config {
        Some(path) => LocatorConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => LocatorConfig::default(),
    };
    if let Some(tick) = args.tick_ms {
        config.display.tick_interval_ms = tick;
    }
    config.validate()?;

    let scenario = build_scenario(&args)?;
    if !scenario.requires_start && config.handshake.mode == HandshakeMode::Command {
        // Free-running anchors never acknowledge a start command
        config.handshake.mode = HandshakeMode::Passive;
    }

    let links = simulated_anchors(&config, &scenario)?;

    let shutdown = Shutdown::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || handler_shutdown.trigger())
        .context("Failed to install interrupt handler")?;

    let (publisher, reader) = estimate_channel();
    let mut pipeline = EstimationPipeline::new(&config, publisher)?;

    let renderer = Renderer::new(
        reader.clone(),
        create_formatter(args.format, args.verbose > 0),
        config.display.clamp_viewport(),
        config.display.tick_interval(),
    );
    let render_handle = renderer
        .spawn(shutdown.clone())
        .context("Failed to start renderer")?;

    let result = pipeline.run(links, &shutdown);

    shutdown.trigger();
    if let Ok(Err(e)) = render_handle.join() {
        log::warn!("Renderer failed: {}", e);
    }

    let bounded = scenario.max_lines.is_some();
    let stats = match result {
        Ok(stats) => stats,
        // A bounded scenario ends by closing its streams
        Err(LocatorError::LinkClosed { anchor }) if bounded => {
            log::info!("{} finished its scenario", anchor);
            pipeline.stats().clone()
        }
        Err(e) => return Err(e.into()),
    };

    eprintln!();
    eprintln!(
        "{} iterations, {} positions, {} parse failures, {} singular solves",
        stats.iterations, stats.published, stats.parse_failures, stats.singular
    );

    if let Some(estimate) = reader.position() {
        let truth = scenario.target.position(estimate.iteration.saturating_sub(1));
        eprintln!(
            "Final estimate {} (truth {}, error {:.3}, residual {:.3})",
            estimate.point(),
            truth,
            estimate.point().distance_to(&truth),
            estimate.residual
        );
    } else {
        eprintln!("No position estimate was produced");
    }

    Ok(())
}

fn build_scenario(args: &Args) -> anyhow::Result<SimulationConfig> {
    let mut scenario: SimulationConfig = match &args.scenario {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };

    if let Some(at) = args.target {
        scenario.target = TargetPath::Fixed { at };
    }
    if let Some(noise) = args.noise {
        scenario.noise_std_db = noise;
    }
    if let Some(rate) = args.malformed_rate {
        scenario.malformed_rate = rate.clamp(0.0, 1.0);
    }
    if args.lines.is_some() {
        scenario.max_lines = args.lines;
    }
    if args.seed.is_some() {
        scenario.seed = args.seed;
    }
    scenario.line_interval_ms = args.interval_ms;
    Ok(scenario)
}
