// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gaze_proctor::config::tolerance_from_secs;
use gaze_proctor::evidence::{
    load_stats, total_stats, EvidenceCorrelator, EvidenceStore, TotalStats,
};
use gaze_proctor::pipeline::Session;
use gaze_proctor::sensor::{JsonlFeed, RecordedEstimator};
use gaze_proctor::Config;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gaze-proctor", version, about = "Gaze-based proctoring and evidence correlation")]
struct Cli {
    /// YAML configuration; defaults apply when the file does not exist
    #[arg(long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor one participant from an estimator feed (JSON lines)
    Session {
        #[arg(long)]
        participant: String,
        /// Feed file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Correlate behavior logs (a file or a directory of them) against manual marks
    Correlate {
        path: PathBuf,
        #[arg(long)]
        tolerance_secs: Option<u64>,
        /// Also write the per-participant results here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Aggregate statistics from a saved correlation result
    Totals { stats: PathBuf },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gaze_proctor={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // Plain stderr output until the configured level is known
    let bootstrap = tracing_subscriber::fmt().with_writer(io::stderr).finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        Config::load_or_default(&cli.config)
    })?;
    init_logging(&config.logging.level);

    match cli.command {
        Command::Session { participant, input } => run_session(&config, participant, &input),
        Command::Correlate {
            path,
            tolerance_secs,
            output,
        } => run_correlate(&config, &path, tolerance_secs, output.as_deref()),
        Command::Totals { stats } => {
            let totals = total_stats(&load_stats(&stats)?);
            print_totals(&totals);
            println!("{}", serde_json::to_string_pretty(&totals)?);
            Ok(())
        }
    }
}

fn run_session(config: &Config, participant: String, input: &str) -> Result<()> {
    info!("👁️  Gaze proctor starting");
    info!(
        "Thresholds: deviation={:.2}, window={} frames, streak={} frames, max actions={}",
        config.tracking.calibration_threshold,
        config.window_size(),
        config.min_consecutive_offcenter(),
        config.analysis.max_suspicious_actions
    );

    let reader: Box<dyn BufRead> = if input == "-" {
        info!("Reading estimator feed from stdin");
        Box::new(io::stdin().lock())
    } else {
        let file =
            File::open(input).with_context(|| format!("Failed to open feed {}", input))?;
        info!("Reading estimator feed from {}", input);
        Box::new(BufReader::new(file))
    };

    let store = Arc::new(EvidenceStore::from_config(config));
    info!(
        "💾 Logs: {} and {}",
        store.gaze_log_path().display(),
        store.behavior_log_path().display()
    );

    let session = Session::from_config(
        participant,
        JsonlFeed::new(reader),
        RecordedEstimator::new(),
        store,
        config,
    );
    let summary = session.run()?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_correlate(
    config: &Config,
    path: &Path,
    tolerance_secs: Option<u64>,
    output: Option<&Path>,
) -> Result<()> {
    let correlator = match tolerance_secs {
        Some(secs) => EvidenceCorrelator::new(
            tolerance_from_secs(secs).context("--tolerance-secs")?,
        ),
        None => EvidenceCorrelator::from_config(config)?,
    };
    info!(
        "🔎 Correlating {} (tolerance {}s)",
        path.display(),
        correlator.tolerance().num_seconds()
    );

    let results = correlator.correlate_path(path)?;
    let json = serde_json::to_string_pretty(&results)?;

    if let Some(output) = output {
        std::fs::write(output, &json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("💾 Results written to {}", output.display());
    }

    println!("{}", json);
    print_totals(&total_stats(&results));
    Ok(())
}

fn print_totals(totals: &TotalStats) {
    info!("\n📊 Totals:");
    info!("  Logged detections: {}", totals.total_detected_attempts);
    info!("  Manual marks: {}", totals.total_manual_marks);
    info!("  Corroborated marks: {}", totals.total_real_attempts);
    info!("  False positives: {}", totals.total_false_positives);
}
