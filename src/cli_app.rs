//! Top-level CLI definition and dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use crossbeam_channel::bounded;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stream_window_helper::commit::scheduler::{FrameScheduling, ManualFrameScheduler};
use stream_window_helper::core::config::FeedConfig;
use stream_window_helper::core::errors::{Result, SwhError};
use stream_window_helper::degrade::timer::{ManualTimerDriver, TimerDriverRef};
use stream_window_helper::session::StreamSession;
use stream_window_helper::window::record::{TxKind, TxRecord, TxStatus};

/// Stream Window Helper — bounded stream aggregation with adaptive backpressure.
#[derive(Debug, Parser)]
#[command(
    name = "swh",
    author,
    version,
    about = "Stream Window Helper - bounded live-feed aggregation",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Drive the pipeline with a synthetic transaction stream.
    Simulate(SimulateArgs),
    /// Show the effective sanitized configuration.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
struct SimulateArgs {
    /// Number of batches to feed.
    #[arg(long, default_value_t = 200)]
    batches: u64,
    /// Records per batch.
    #[arg(long, default_value_t = 8)]
    batch_size: usize,
    /// RNG seed for a reproducible stream.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Inject a burst of slow frames every N batches (0 disables).
    #[arg(long, default_value_t = 40)]
    spike_every: u64,
    /// Ramp heap samples over the emergency threshold mid-run.
    #[arg(long)]
    heap_stress: bool,
    /// Write session events to this JSONL file.
    #[arg(long, value_name = "PATH")]
    jsonl: Option<PathBuf>,
    /// Print the final telemetry report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {}

/// Dispatch a parsed CLI invocation.
pub fn run(cli: &Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }
    let config = load_config(cli)?;
    match &cli.command {
        Command::Simulate(args) => simulate(config, args),
        Command::Config(ConfigArgs {}) => {
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<FeedConfig> {
    match &cli.config {
        Some(path) => FeedConfig::load(path),
        None => FeedConfig::from_env(),
    }
}

/// Feed a reproducible synthetic stream through a full session: producer
/// thread pushes batches over a bounded channel, the consumer ingests them
/// while manually driving frames and timers, then prints the telemetry
/// report.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn simulate(mut config: FeedConfig, args: &SimulateArgs) -> Result<()> {
    if let Some(path) = &args.jsonl {
        config.telemetry.jsonl_path = Some(path.clone());
    }

    let frames = Arc::new(ManualFrameScheduler::new());
    let timers = Arc::new(ManualTimerDriver::new());
    let mut session: StreamSession<TxRecord> = StreamSession::new(
        config,
        FrameScheduling::Driver(Arc::clone(&frames) as Arc<_>),
        Some(Arc::clone(&timers) as TimerDriverRef),
    );

    let (tx, rx) = bounded::<Vec<TxRecord>>(16);
    let producer = {
        let batches = args.batches;
        let batch_size = args.batch_size;
        let seed = args.seed;
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut next_id: u64 = 0;
            for batch_no in 0..batches {
                let mut batch = Vec::with_capacity(batch_size);
                for _ in 0..batch_size {
                    // Mostly fresh records, with occasional mutations of a
                    // recent id to exercise identity churn.
                    let id = if next_id > 4 && rng.random_bool(0.3) {
                        next_id - rng.random_range(1..=4)
                    } else {
                        next_id += 1;
                        next_id
                    };
                    batch.push(synthetic_tx(&mut rng, id, batch_no));
                }
                if tx.send(batch).is_err() {
                    return;
                }
            }
        })
    };

    let mut now_ms: u64 = 1_000_000;
    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let mut spike_left = 0u64;
    let heap_threshold = session.config().heap_emergency_purge_bytes();
    let mut batch_no = 0u64;

    for batch in &rx {
        if args.spike_every > 0 && batch_no % args.spike_every == args.spike_every - 1 {
            spike_left = 8;
        }
        let delta_ms = if spike_left > 0 {
            spike_left -= 1;
            rng.random_range(40.0..90.0)
        } else {
            rng.random_range(8.0..16.0)
        };
        now_ms += delta_ms as u64;

        session.ingest_batch_at(&batch, &[], now_ms);
        session.on_frame(delta_ms, now_ms);
        frames.fire_all();

        if args.heap_stress && batch_no == args.batches / 2 {
            session.record_heap_bytes(heap_threshold + 64 * 1024 * 1024);
        } else {
            session.record_heap_bytes(128 * 1024 * 1024 + batch_no * 1024);
        }

        // Idle gap between bursts lets armed trailing flushes fire.
        if batch_no % 16 == 15 {
            timers.fire_all();
            frames.fire_all();
        }
        batch_no += 1;
    }
    producer.join().map_err(|_| SwhError::Runtime {
        details: "producer thread panicked".to_string(),
    })?;

    session.flush();
    frames.fire_all();
    timers.fire_all();
    frames.fire_all();

    let report = session.telemetry_report(now_ms);
    if args.json {
        let rendered = serde_json::to_string_pretty(&report).map_err(|e| {
            SwhError::Serialization {
                context: "report",
                details: e.to_string(),
            }
        })?;
        println!("{rendered}");
        return Ok(());
    }

    println!("{}", "simulation complete".bold());
    println!(
        "  batches ingested : {}",
        report.batches_ingested.to_string().green()
    );
    println!(
        "  batches gated    : {}",
        report.batches_gated.to_string().yellow()
    );
    println!(
        "  emergency purges : {}",
        report.emergency_purges.to_string().red()
    );
    println!(
        "  retained rows    : {}",
        session.primary_rows().len().to_string().green()
    );
    println!(
        "  dropped frames   : {}/{} ({:.1}%)",
        report.dropped_frames.dropped_frames,
        report.dropped_frames.total_frames,
        report.dropped_frames.ratio * 100.0
    );
    println!(
        "  long tasks       : {} over {:.0} ms",
        report.long_tasks.count, report.long_tasks.threshold_ms
    );
    println!("  rolling fps      : {:.1}", report.fps.fps);
    let mode = if report.degradation.sampling_mode {
        "sampling".yellow()
    } else {
        "normal".green()
    };
    println!("  final mode       : {mode}");
    Ok(())
}

fn synthetic_tx(rng: &mut StdRng, id: u64, batch_no: u64) -> TxRecord {
    let kind = match rng.random_range(0..4) {
        0 => TxKind::Transfer,
        1 => TxKind::Refund,
        2 => TxKind::Fee,
        _ => TxKind::Payment,
    };
    let status = match rng.random_range(0..10) {
        0 => TxStatus::Failed,
        1..=3 => TxStatus::Pending,
        _ => TxStatus::Confirmed,
    };
    TxRecord {
        id: format!("tx-{id:08}"),
        kind,
        status,
        amount_minor: rng.random_range(-50_000..250_000),
        memo: None,
        observed_at_ms: Some(1_000_000 + batch_no * 16),
    }
}
