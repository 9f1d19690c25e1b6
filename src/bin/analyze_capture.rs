use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use rolling_stats::Stats;
use serde::Serialize;

use rssitrack::config::{LocatorConfig, RangingMode};
use rssitrack::estimate_channel;
use rssitrack::output::EstimateOutput;
use rssitrack::pipeline::{EstimationPipeline, IterationOutcome, PipelineStats};
use rssitrack::telemetry::{AnchorId, AnchorLink, StreamLink, parse_rssi};
use rssitrack::trilateration::Point2;

#[derive(Parser, Debug)]
#[command(name = "analyze_capture")]
#[command(about = "Replay recorded anchor captures and summarize the position estimates", long_about = None)]
struct Args {
    /// Capture file for each anchor, in anchor order (raw telemetry lines)
    #[arg(required = true, num_args = 3)]
    files: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Output format: text, csv, json
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: ReportFormat,

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

    /// Known transmitter position "x,y"; reports error statistics against it
    #[arg(long, allow_hyphen_values = true)]
    truth: Option<Point2>,

    /// Print every published estimate as a JSON line on stderr
    #[arg(long)]
    trace: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ReportFormat {
    Text,
    Csv,
    Json,
}

#[derive(Debug, Clone, Serialize)]
struct StatsSummary {
    count: usize,
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
}

impl StatsSummary {
    fn from_stats(stats: &Stats<f64>) -> Option<Self> {
        if stats.count == 0 {
            return None;
        }
        Some(Self {
            count: stats.count,
            mean: stats.mean,
            std_dev: stats.std_dev,
            min: stats.min,
            max: stats.max,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnchorSummary {
    anchor: AnchorId,
    file: String,
    rssi: Option<StatsSummary>,
    distance: Option<StatsSummary>,
    malformed_lines: u64,
}

#[derive(Debug, Clone, Serialize)]
struct CaptureAnalysis {
    anchors: Vec<AnchorSummary>,
    x: Option<StatsSummary>,
    y: Option<StatsSummary>,
    residual: Option<StatsSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<StatsSummary>,
    final_position: Option<Point2>,
    pipeline: PipelineStats,
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
    let analysis = analyze(&args, &config)?;

    match args.format {
        ReportFormat::Text => print_text(&analysis, &config),
        ReportFormat::Csv => print_csv(&analysis),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&analysis)?),
    }

    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<LocatorConfig> {
    let mut config = match &args.config {
        Some(path) => LocatorConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => LocatorConfig::default(),
    };
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
    config.validate()?;
    Ok(config)
}

fn analyze(args: &Args, config: &LocatorConfig) -> anyhow::Result<CaptureAnalysis> {
    let mut links = Vec::with_capacity(3);
    for path in &args.files {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        links.push(StreamLink::read_only(BufReader::new(file)));
    }

    let (publisher, reader) = estimate_channel();
    let mut pipeline = EstimationPipeline::new(config, publisher)?;

    let mut rssi_stats: [Stats<f64>; 3] = std::array::from_fn(|_| Stats::new());
    let mut distance_stats: [Stats<f64>; 3] = std::array::from_fn(|_| Stats::new());
    let mut malformed = [0u64; 3];
    let mut x_stats: Stats<f64> = Stats::new();
    let mut y_stats: Stats<f64> = Stats::new();
    let mut residual_stats: Stats<f64> = Stats::new();
    let mut error_stats: Stats<f64> = Stats::new();

    'replay: loop {
        let mut lines: [Vec<u8>; 3] = Default::default();
        for (anchor, link) in AnchorId::ALL.into_iter().zip(links.iter_mut()) {
            match link
                .read_line()
                .with_context(|| format!("Failed to read capture for {}", anchor))?
            {
                Some(line) => lines[anchor.index()] = line,
                // Lock-step replay ends with the shortest capture
                None => break 'replay,
            }
        }

        for anchor in AnchorId::ALL {
            match parse_rssi(&lines[anchor.index()]) {
                Ok(v) => rssi_stats[anchor.index()].update(v),
                Err(_) => malformed[anchor.index()] += 1,
            }
        }

        let outcome = pipeline.process_lines(&lines);

        if let Some(snapshot) = reader.latest()
            && let Some(distances) = snapshot.distances
        {
            for d in distances {
                distance_stats[d.anchor.index()].update(d.distance);
            }
        }

        if let IterationOutcome::Published(position) = outcome {
            x_stats.update(position.x);
            y_stats.update(position.y);
            residual_stats.update(position.residual);
            if let Some(truth) = args.truth {
                error_stats.update(position.point().distance_to(&truth));
            }
            if args.trace {
                let snapshot = reader.latest();
                let output = EstimateOutput::from_snapshot(snapshot.as_deref(), None);
                eprintln!("{}", serde_json::to_string(&output)?);
            }
        }
    }

    let anchors = AnchorId::ALL
        .into_iter()
        .map(|anchor| {
            let i = anchor.index();
            AnchorSummary {
                anchor,
                file: args.files[i].display().to_string(),
                rssi: StatsSummary::from_stats(&rssi_stats[i]),
                distance: StatsSummary::from_stats(&distance_stats[i]),
                malformed_lines: malformed[i],
            }
        })
        .collect();

    Ok(CaptureAnalysis {
        anchors,
        x: StatsSummary::from_stats(&x_stats),
        y: StatsSummary::from_stats(&y_stats),
        residual: StatsSummary::from_stats(&residual_stats),
        error: StatsSummary::from_stats(&error_stats),
        final_position: reader.position().map(|p| p.point()),
        pipeline: pipeline.stats().clone(),
    })
}

fn fmt_mean_std(s: &Option<StatsSummary>, precision: usize) -> String {
    s.as_ref()
        .map(|s| format!("{:.*} ± {:.*}", precision, s.mean, precision, s.std_dev))
        .unwrap_or_else(|| "-".to_string())
}

fn print_text(analysis: &CaptureAnalysis, config: &LocatorConfig) {
    eprintln!(
        "Anchors: {} {} {}  p0: {:.1} dBm  n: {:.2}  window: {}",
        config.anchors.positions[0],
        config.anchors.positions[1],
        config.anchors.positions[2],
        config.path_loss.reference_power_dbm,
        config.path_loss.exponent,
        config.smoothing.window_size
    );
    eprintln!();

    println!(
        "{:<6} {:<40} {:>18} {:>18} {:>10}",
        "Anchor", "File", "RSSI (dBm)", "Distance", "Malformed"
    );
    println!("{}", "-".repeat(96));
    for a in &analysis.anchors {
        println!(
            "{:<6} {:<40} {:>18} {:>18} {:>10}",
            a.anchor.to_string(),
            a.file,
            fmt_mean_std(&a.rssi, 2),
            fmt_mean_std(&a.distance, 3),
            a.malformed_lines
        );
    }

    println!();
    println!("Position x: {}", fmt_mean_std(&analysis.x, 3));
    println!("Position y: {}", fmt_mean_std(&analysis.y, 3));
    println!("Residual:   {}", fmt_mean_std(&analysis.residual, 3));
    if analysis.error.is_some() {
        println!("Error:      {}", fmt_mean_std(&analysis.error, 3));
    }
    match analysis.final_position {
        Some(p) => println!("Final:      {}", p),
        None => println!("Final:      unavailable"),
    }

    let p = &analysis.pipeline;
    eprintln!();
    eprintln!(
        "{} iterations, {} positions, {} parse failures, {} singular solves",
        p.iterations, p.published, p.parse_failures, p.singular
    );
}

fn print_csv(analysis: &CaptureAnalysis) {
    println!("anchor,file,rssi_mean,rssi_std,distance_mean,distance_std,malformed");
    for a in &analysis.anchors {
        let rssi_mean = a.rssi.as_ref().map(|s| format!("{:.3}", s.mean)).unwrap_or_default();
        let rssi_std = a
            .rssi
            .as_ref()
            .map(|s| format!("{:.3}", s.std_dev))
            .unwrap_or_default();
        let dist_mean = a
            .distance
            .as_ref()
            .map(|s| format!("{:.4}", s.mean))
            .unwrap_or_default();
        let dist_std = a
            .distance
            .as_ref()
            .map(|s| format!("{:.4}", s.std_dev))
            .unwrap_or_default();
        println!(
            "{},{},{},{},{},{},{}",
            a.anchor, a.file, rssi_mean, rssi_std, dist_mean, dist_std, a.malformed_lines
        );
    }
}
