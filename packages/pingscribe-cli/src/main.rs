//! Pingscribe CLI - normalize ping results across platforms
//!
//! This binary runs the system ping tool (or reads captured transcripts)
//! against one or more destinations concurrently and prints one structured
//! record per target, whatever ping dialect produced the output.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use pingscribe_core::{
    BatchOptions, BatchReport, Dialect, InvocationSpec, PingTarget, TargetOutcome, run_batch,
};

#[derive(Parser)]
#[command(name = "pingscribe")]
#[command(author = "Pingscribe Team")]
#[command(version)]
#[command(about = "Run ping against many destinations and normalize the output")]
#[command(long_about = "
Pingscribe invokes the system ping tool against every destination you give
it, in parallel, and normalizes the per-platform output (Linux iputils,
BusyBox, macOS/BSD, Windows) into one structured record per target.

Arguments that name an existing file are read as captured ping output
instead of being pinged, so transcripts from other machines can be
normalized offline:

  pingscribe 192.0.2.1 one.example.net captures/router.txt --format json
")]
pub struct Cli {
    /// Destinations to ping, or paths to files of captured ping output
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Packets to send per destination
    #[arg(short = 'c', long, default_value = "4")]
    pub count: u32,

    /// Per-destination deadline in seconds
    #[arg(short = 'w', long)]
    pub deadline: Option<u64>,

    /// Overall deadline for the whole batch in seconds
    #[arg(long)]
    pub batch_deadline: Option<u64>,

    /// Network interface to ping from
    #[arg(short = 'I', long)]
    pub interface: Option<String>,

    /// Parse with this dialect instead of auto-detecting
    #[arg(long, value_enum)]
    pub dialect: Option<DialectArg>,

    /// Include per-reply detail in the results
    #[arg(long)]
    pub replies: bool,

    /// Ask ping for receive timestamps on reply lines (Linux only)
    #[arg(long)]
    pub timestamps: bool,

    /// Maximum concurrent ping invocations (default: twice the CPU count)
    #[arg(short = 'j', long)]
    pub max_workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DialectArg {
    Linux,
    Busybox,
    MacosBsd,
    Windows,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Dialect {
        match arg {
            DialectArg::Linux => Dialect::Linux,
            DialectArg::Busybox => Dialect::Busybox,
            DialectArg::MacosBsd => Dialect::MacosBsd,
            DialectArg::Windows => Dialect::Windows,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pingscribe={},pingscribe_core={}", log_level, log_level).into()
            }),
        )
        .with_target(false)
        .init();

    let argv = build_ping_argv(&cli);
    tracing::debug!(?argv, "resolved ping command line");

    let spec = InvocationSpec {
        count: cli.count,
        // Give ping a second past its own deadline to print the summary
        // before the child is killed.
        deadline: cli.deadline.map(|secs| Duration::from_secs(secs + 1)),
        interface: cli.interface.clone(),
        dialect_override: cli.dialect.map(Into::into),
        record_replies: cli.replies,
        argv,
    };
    let options = BatchOptions {
        max_workers: cli.max_workers,
        batch_deadline: cli.batch_deadline.map(Duration::from_secs),
    };
    let targets: Vec<PingTarget> = cli
        .targets
        .iter()
        .map(|input| PingTarget::from_input(input))
        .collect();

    let report = run_batch(targets, spec, options).await?;

    match cli.format {
        OutputFormat::Text => print_text(&report, cli.replies),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.failed_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Resolve the ping command line for this platform. The destination itself
/// is appended per target by the core.
fn build_ping_argv(cli: &Cli) -> Vec<String> {
    let mut argv = vec!["ping".to_string()];

    if cfg!(target_os = "windows") {
        argv.push("-n".to_string());
        argv.push(cli.count.to_string());
        if let Some(secs) = cli.deadline {
            // ping.exe takes the per-reply timeout in milliseconds.
            argv.push("-w".to_string());
            argv.push((secs * 1000).to_string());
        }
    } else {
        argv.push("-c".to_string());
        argv.push(cli.count.to_string());
        if let Some(secs) = cli.deadline {
            if cfg!(target_os = "macos") {
                argv.push("-t".to_string());
            } else {
                argv.push("-w".to_string());
            }
            argv.push(secs.to_string());
        }
        if let Some(interface) = &cli.interface {
            argv.push("-I".to_string());
            argv.push(interface.clone());
        }
        if cli.timestamps && cfg!(target_os = "linux") {
            argv.push("-D".to_string());
        }
    }

    argv
}

fn print_text(report: &BatchReport, show_replies: bool) {
    for result in &report.results {
        match &result.outcome {
            TargetOutcome::Ok { stats } => {
                let counts = format!(
                    "{}/{}",
                    fmt_count(stats.transmitted),
                    fmt_count(stats.received)
                );
                let loss = stats
                    .loss_pct
                    .map(|pct| format!("{:.1}%", pct))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:24} {:>9} {:>7}  {}",
                    result.target,
                    counts,
                    loss,
                    fmt_rtt(stats)
                );
                if show_replies {
                    for reply in &stats.replies {
                        let seq = reply
                            .seq
                            .map(|s| format!("seq={}", s))
                            .unwrap_or_else(|| "seq=-".to_string());
                        let time = reply
                            .time_ms
                            .map(|t| format!("{:.1}ms", t))
                            .unwrap_or_else(|| "-".to_string());
                        let dup = if reply.duplicate { " (dup)" } else { "" };
                        println!("      {:8} {:>9}{}", seq, time, dup);
                    }
                }
            }
            TargetOutcome::Failed { kind, message } => {
                println!("  {:24} {:?}: {}", result.target, kind, message);
            }
        }
    }

    println!();
    println!(
        "{} targets: {} ok, {} failed in {:.1}s",
        report.results.len(),
        report.ok_count(),
        report.failed_count(),
        report.elapsed_ms as f64 / 1000.0
    );
}

fn fmt_count(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// "min/avg/max[/mdev] ms" in the familiar ping layout, or "-" when the
/// dialect reported no round-trip figures.
fn fmt_rtt(stats: &pingscribe_core::PingStats) -> String {
    match (stats.rtt_min, stats.rtt_avg, stats.rtt_max) {
        (Some(min), Some(avg), Some(max)) => match stats.rtt_mdev {
            Some(mdev) => format!("rtt {:.3}/{:.3}/{:.3}/{:.3} ms", min, avg, max, mdev),
            None => format!("rtt {:.3}/{:.3}/{:.3} ms", min, avg, max),
        },
        _ => "-".to_string(),
    }
}
