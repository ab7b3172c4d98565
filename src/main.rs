//! Flip Statistics CLI
//!
//! Runs Focus and/or Control flip sessions from the terminal, renders
//! progress on stderr and prints the test results. Ctrl-C cancels the
//! run at the next checkpoint.
//!
//! With `--metrics-port` the exporter is updated at every checkpoint. After
//! a completed run the process keeps serving the final values until
//! Ctrl-C; a cancelled or failed run exits at once and takes the exporter
//! with it.

use clap::{Parser, ValueEnum};
use flipstat::{
    entropy::{EntropySource, FallbackPolicy, RandomBitSource, SystemEntropy},
    metrics::{MetricsRegistry, ProgressRecorder},
    session::{
        CancellationToken, ComparisonOrchestrator, ComparisonReport, Label, Progress,
        SessionError, SessionResult, SessionRunner, ThreadYield,
    },
    FileConfig, RunMode,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Exit status for a user-cancelled run (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "flipstat", version, about = "Secure coin-flip sessions with z-tests")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trials per session (raised to the configured minimum).
    #[arg(short = 'n', long)]
    trials: Option<u64>,

    /// Which sessions to run.
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Fall back to a non-secure generator if OS entropy is unavailable.
    #[arg(long)]
    allow_insecure: bool,

    /// Print results as TOML.
    #[arg(long)]
    toml: bool,

    /// Serve Prometheus metrics on this port (needs the `metrics` feature).
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Focus,
    Control,
    Compare,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Focus => RunMode::Focus,
            ModeArg::Control => RunMode::Control,
            ModeArg::Compare => RunMode::Compare,
        }
    }
}

/// Results of a finished run.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Outcome {
    Single { session: SessionResult },
    Comparison(ComparisonReport),
}

impl Outcome {
    fn sessions(&self) -> Vec<SessionResult> {
        match self {
            Self::Single { session } => vec![session.clone()],
            Self::Comparison(report) => vec![report.focus.clone(), report.control.clone()],
        }
    }
}

/// Single status line on stderr, redrawn on whole-percent changes.
#[derive(Default)]
struct ProgressLine {
    last: Option<(Label, u64)>,
}

impl ProgressLine {
    fn render(&mut self, progress: &Progress) {
        let percent = (progress.fraction() * 100.0).floor() as u64;
        if self.last == Some((progress.label, percent)) {
            return;
        }
        self.last = Some((progress.label, percent));

        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r[{:>3}%] {:<60}", percent, progress.status());
        if progress.is_complete() {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("Flipstat v{}", flipstat::VERSION);

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                return ExitCode::from(2);
            }
        },
        None => FileConfig::default(),
    };

    // Command-line flags override the file
    if let Some(trials) = cli.trials {
        config.run.trials = trials;
    }
    if let Some(mode) = cli.mode {
        config.run.mode = mode.into();
    }
    if cli.allow_insecure {
        config.run.fallback = FallbackPolicy::AllowInsecure;
    }
    if let Some(port) = cli.metrics_port {
        config.output.metrics_port = port;
    }
    config.output.toml |= cli.toml;

    if let Err(e) = config.run.validate() {
        eprintln!("Invalid configuration: {}", e);
        return ExitCode::from(2);
    }

    let trials = config.run.clamp_trials(config.run.trials);

    let token = CancellationToken::new();
    let handle = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let entropy = match SystemEntropy::open(config.run.fallback) {
        Ok(entropy) => entropy,
        Err(e) => {
            error!("{}", e);
            eprintln!("No secure entropy source; rerun with --allow-insecure to degrade");
            return ExitCode::FAILURE;
        }
    };
    if !entropy.is_secure() {
        warn!("Results are drawn from a NON-SECURE generator");
    }

    let registry = match MetricsRegistry::new() {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!("Failed to create metrics registry: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let serving = start_metrics_server(config.output.metrics_port, &registry);
    let mut recorder = ProgressRecorder::new(Arc::clone(&registry));

    let bits = match RandomBitSource::with_chunk_size(entropy, config.run.chunk_size) {
        Ok(bits) => bits,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    let runner = match SessionRunner::with_checkpoint_interval(bits, config.run.checkpoint_interval)
    {
        Ok(r) => r.with_host(ThreadYield),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    info!(trials, mode = ?config.run.mode, "Starting run");

    let mut line = ProgressLine::default();
    let mut on_progress = |p: &Progress| {
        line.render(p);
        recorder.record(p);
    };
    let result = match config.run.mode {
        RunMode::Focus | RunMode::Control => {
            let label = if config.run.mode == RunMode::Focus {
                Label::Focus
            } else {
                Label::Control
            };
            let mut runner = runner;
            let result = runner
                .run(label, trials, &token, &mut on_progress)
                .map(|session| Outcome::Single { session });
            finish_metrics(&mut recorder, &result, runner.bits());
            result
        }
        RunMode::Compare => {
            let mut orchestrator = ComparisonOrchestrator::new(runner);
            let result = orchestrator
                .run_both(trials, &token, &mut on_progress)
                .map(Outcome::Comparison);
            finish_metrics(&mut recorder, &result, orchestrator.runner().bits());
            result
        }
    };

    match result {
        Ok(outcome) => {
            if config.output.toml {
                match toml::to_string(&outcome) {
                    Ok(text) => print!("{}", text),
                    Err(e) => {
                        error!("Failed to encode results: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_outcome(&outcome, config.run.alpha);
            }
            if serving {
                serve_until_cancelled(&token);
            }
            ExitCode::SUCCESS
        }
        Err(SessionError::Cancelled) => {
            eprintln!();
            eprintln!("Cancelled; no result recorded");
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(e) => {
            error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn finish_metrics<S: EntropySource>(
    recorder: &mut ProgressRecorder,
    result: &Result<Outcome, SessionError>,
    bits: &RandomBitSource<S>,
) {
    let sessions = result.as_ref().map(Outcome::sessions).unwrap_or_default();
    let cancelled = u64::from(matches!(result, Err(SessionError::Cancelled)));
    recorder.finish(&sessions, cancelled, bits);
}

/// Blocks until Ctrl-C so the exporter keeps serving the final values.
fn serve_until_cancelled(token: &CancellationToken) {
    info!("Run finished; still serving metrics, press Ctrl-C to exit");
    while !token.is_cancelled() {
        std::thread::sleep(Duration::from_millis(200));
    }
}

fn print_outcome(outcome: &Outcome, alpha: f64) {
    match outcome {
        Outcome::Single { session } => print_session(session, alpha),
        Outcome::Comparison(report) => {
            print_session(&report.focus, alpha);
            print_session(&report.control, alpha);

            let cmp = &report.comparison;
            println!("Focus vs Control");
            println!("  diff  {:+.4}", cmp.diff);
            if cmp.is_degenerate() {
                println!("  z     {}", cmp.z);
                println!("  p     undefined (zero standard error)");
            } else {
                println!("  z     {:+.3}", cmp.z);
                println!("  p     {:.4}", cmp.p);
                println!("  {}", verdict(cmp.is_significant(alpha), alpha));
            }
        }
    }
}

fn print_session(session: &SessionResult, alpha: f64) {
    println!("{}", session.label());
    println!("  n     {}", session.trials());
    println!("  hits  {}", session.hits());
    println!("  rate  {:.4}", session.rate());
    println!("  z     {:+.3}", session.z());
    println!("  p     {:.4}", session.p());
    println!("  {}", verdict(session.is_significant(alpha), alpha));
}

fn verdict(significant: bool, alpha: f64) -> String {
    if significant {
        format!("significant at alpha = {}", alpha)
    } else {
        format!("not significant at alpha = {}", alpha)
    }
}

/// Starts the exporter on `port` (0 disables it). Returns true if started.
#[cfg(feature = "metrics")]
fn start_metrics_server(port: u16, registry: &Arc<MetricsRegistry>) -> bool {
    use flipstat::metrics::{MetricsServer, MetricsServerConfig};

    if port == 0 {
        return false;
    }
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), Arc::clone(registry));
    // Detached; the process exit tears it down.
    drop(server.spawn());
    true
}

#[cfg(not(feature = "metrics"))]
fn start_metrics_server(port: u16, _registry: &Arc<MetricsRegistry>) -> bool {
    if port != 0 {
        warn!(port, "Metrics server requested but built without the `metrics` feature");
    }
    false
}
