//! Neuro CLI - Command-line interface for Synheart Neuro
//!
//! Commands:
//! - run: Process NDJSON samples into NDJSON frames (streaming mode)
//! - simulate: Emit synthetic samples, or drive a simulated session with them
//! - catalog: Print the adaptation catalog or rank it against a metric vector
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use synheart_neuro::catalog::AdaptationCatalog;
use synheart_neuro::config::PipelineConfig;
use synheart_neuro::selector::AdaptationSelector;
use synheart_neuro::simulator::{MentalState, SimulatedLink, SyntheticSource};
use synheart_neuro::types::{DeviceKind, MetricVector, Sample};
use synheart_neuro::{NeuroError, NeuroProcessor, Session, NEURO_VERSION, PRODUCER_NAME};

/// Neuro - Real-time neuro-adaptive signal engine
#[derive(Parser)]
#[command(name = "neuro")]
#[command(author = "Synheart AI Inc")]
#[command(version = NEURO_VERSION)]
#[command(about = "Turn EEG-like samples into cognitive metrics and UI adaptations", long_about = None)]
struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process NDJSON samples into NDJSON frames (streaming mode)
    Run {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Generate synthetic samples
    Simulate {
        /// Mental state to imitate
        #[arg(long, default_value = "focused")]
        state: MentalState,

        /// Generator seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of samples
        #[arg(long, default_value = "1024")]
        count: usize,

        /// Run samples through a simulated session and emit frames instead
        #[arg(long)]
        process: bool,

        /// With --process, calibrate a baseline over this many milliseconds
        #[arg(long, requires = "process")]
        calibrate_ms: Option<u64>,
    },

    /// Print the adaptation catalog
    Catalog {
        /// Rank the catalog against this metric vector (JSON object)
        #[arg(long)]
        metrics: Option<String>,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), NeuroCliError> {
    if let Commands::Doctor { json } = cli.command {
        return cmd_doctor(cli.config.as_deref(), json);
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { input, flush } => cmd_run(config, &input, flush),

        Commands::Simulate {
            state,
            seed,
            count,
            process,
            calibrate_ms,
        } => cmd_simulate(config, state, seed, count, process, calibrate_ms),

        Commands::Catalog { metrics } => cmd_catalog(&config, metrics.as_deref()),

        Commands::Doctor { .. } => Ok(()),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, NeuroCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(PipelineConfig::from_json(&json)?)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn cmd_run(config: PipelineConfig, input: &Path, flush: bool) -> Result<(), NeuroCliError> {
    let mut processor = NeuroProcessor::with_config(config)?;

    let reader: Box<dyn BufRead> = if input.to_string_lossy() == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(input)?))
    };
    let mut stdout = io::stdout();

    let skipped = stream_frames(&mut processor, reader, &mut stdout, flush)?;

    info!(
        samples = processor.samples_processed(),
        skipped,
        adaptations = processor.history().len(),
        "stream finished"
    );
    Ok(())
}

/// Write one frame per NDJSON sample line. Lines that do not parse are
/// logged and skipped; returns how many were skipped.
fn stream_frames(
    processor: &mut NeuroProcessor,
    reader: impl BufRead,
    mut writer: impl Write,
    flush: bool,
) -> Result<usize, NeuroCliError> {
    let mut skipped = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let sample: Sample = match serde_json::from_str(trimmed) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping unparseable sample");
                skipped += 1;
                continue;
            }
        };

        let frame = processor.process(&sample);
        writeln!(writer, "{}", serde_json::to_string(&frame)?)?;
        if flush {
            writer.flush()?;
        }
    }
    writer.flush()?;

    Ok(skipped)
}

fn cmd_simulate(
    config: PipelineConfig,
    state: MentalState,
    seed: u64,
    count: usize,
    process: bool,
    calibrate_ms: Option<u64>,
) -> Result<(), NeuroCliError> {
    let mut source = SyntheticSource::new(seed, state, config.sample_rate_hz);

    if !process {
        let mut stdout = io::stdout().lock();
        for _ in 0..count {
            writeln!(stdout, "{}", serde_json::to_string(&source.next_sample())?)?;
        }
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(simulate_session(config, source, count, calibrate_ms))
}

/// Feed synthetic samples through a full session over a simulated link
async fn simulate_session(
    config: PipelineConfig,
    mut source: SyntheticSource,
    count: usize,
    calibrate_ms: Option<u64>,
) -> Result<(), NeuroCliError> {
    let sample_period = Duration::from_secs_f64(1.0 / config.sample_rate_hz);
    let session = Session::with_config(config, SimulatedLink::new())?;
    session.connect(DeviceKind::Simulated).await?;
    info!(session = %session.id(), state = source.state().as_str(), "simulating");

    // Pace samples in real time only while a calibration needs the clock
    let paced = calibrate_ms.is_some();
    let feed = async {
        let mut stdout = io::stdout();
        for _ in 0..count {
            let frame = session.process_frame(&source.next_sample())?;
            writeln!(stdout, "{}", serde_json::to_string(&frame)?)?;
            if paced {
                tokio::time::sleep(sample_period).await;
            }
        }
        stdout.flush()?;
        Ok::<(), NeuroCliError>(())
    };

    match calibrate_ms {
        Some(ms) => {
            let (fed, calibrated) = tokio::join!(
                feed,
                session.calibrate_baseline(Duration::from_millis(ms))
            );
            fed?;
            let baseline = calibrated?;
            eprintln!("{}", serde_json::to_string_pretty(&baseline)?);
        }
        None => feed.await?,
    }

    session.disconnect().await;
    Ok(())
}

fn cmd_catalog(config: &PipelineConfig, metrics: Option<&str>) -> Result<(), NeuroCliError> {
    let catalog = AdaptationCatalog::default();

    let Some(metrics_json) = metrics else {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    };

    let parsed: MetricVector = serde_json::from_str(metrics_json)?;
    let metrics = MetricVector::from_fn(|m| parsed.get(m));
    let selector = AdaptationSelector::new(config.weights, config.activation_threshold);

    let report = RankingReport {
        threshold: selector.threshold(),
        selected: selector.select_adaptation(&metrics, &catalog).map(|p| p.id),
        ranking: selector.rank(&metrics, &catalog),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), NeuroCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "neuro_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Neuro version {}", NEURO_VERSION),
    });

    let config_check = match config_path {
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file given, using defaults".to_string(),
        },
        Some(path) if !path.exists() => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: format!("Config file {} does not exist", path.display()),
        },
        Some(path) => match load_config(Some(path)) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid ({} Hz, {} channels, power window {})",
                    config.sample_rate_hz,
                    config.channels.len(),
                    config.power_window
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            },
        },
    };
    checks.push(config_check);

    checks.push(DoctorCheck {
        name: "catalog".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} default adaptation profiles", AdaptationCatalog::default().len()),
    });

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: NEURO_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Neuro Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(NeuroCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error handling

#[derive(Debug)]
enum NeuroCliError {
    Io(io::Error),
    Engine(NeuroError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for NeuroCliError {
    fn from(e: io::Error) -> Self {
        NeuroCliError::Io(e)
    }
}

impl From<NeuroError> for NeuroCliError {
    fn from(e: NeuroError) -> Self {
        NeuroCliError::Engine(e)
    }
}

impl From<serde_json::Error> for NeuroCliError {
    fn from(e: serde_json::Error) -> Self {
        NeuroCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<NeuroCliError> for CliError {
    fn from(e: NeuroCliError) -> Self {
        match e {
            NeuroCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            NeuroCliError::Engine(NeuroError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'neuro doctor --config <file>' for details".to_string()),
            },
            NeuroCliError::Engine(e @ NeuroError::CalibrationInterrupted { .. }) => CliError {
                code: "CALIBRATION_INTERRUPTED".to_string(),
                message: e.to_string(),
                hint: Some("Keep the device connected for the whole calibration window".to_string()),
            },
            NeuroCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            NeuroCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            NeuroCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct RankingReport {
    threshold: f64,
    selected: Option<String>,
    ranking: Vec<synheart_neuro::ProfileScore>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use synheart_neuro::types::SignalFrame;

    #[test]
    fn test_stream_skips_bad_lines_and_keeps_going() {
        let input = concat!(
            r#"{"timestamp":"2024-01-15T10:00:00Z","channels":{"TP9":1.0,"AF7":null},"quality":0.9}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"timestamp":"2024-01-15T10:00:00.004Z","channels":{"TP9":2.0},"quality":0.9}"#,
            "\n",
        );
        let mut processor = NeuroProcessor::new();
        let mut output = Vec::new();

        let skipped =
            stream_frames(&mut processor, Cursor::new(input), &mut output, false).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(processor.samples_processed(), 2);

        let frames: Vec<SignalFrame> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].input, 0.25);
    }
}
