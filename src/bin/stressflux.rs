//! stressflux - command-line interface for EEG Stress Flux
//!
//! Commands:
//! - replay: Replay recorded samples and print level changes (batch mode)
//! - run: Feed stdin records into a live session (streaming mode)
//! - summary: Band summary and mood distribution over a window
//! - doctor: Diagnose configuration, mesh and input health
//! - config: Print the effective configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use eeg_stress_flux::acquisition::Acquisition;
use eeg_stress_flux::fusion::{Mesh, NdjsonRenderTarget};
use eeg_stress_flux::logging::init_tracing;
use eeg_stress_flux::schema::{order_history, RecordAdapter};
use eeg_stress_flux::summary::{BandSummary, MoodDistribution};
use eeg_stress_flux::{
    replay_samples, ComputeError, FluxConfig, IngestEvent, Sample, Session, SystemClock,
    WindowSpec, FLUX_VERSION, PRODUCER_NAME, RECORD_SCHEMA_VERSION,
};

/// Vertices of the built-in shell used when no mesh file is given
const SYNTHETIC_VERTICES: usize = 2000;

/// stressflux - streaming EEG stress scoring and spatial activity fusion
#[derive(Parser)]
#[command(name = "stressflux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Score EEG stress levels and fuse electrode activity", long_about = None)]
struct Cli {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when STRESSFLUX_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded samples and print level changes (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,
    },

    /// Feed NDJSON records from stdin into a live session (streaming mode)
    Run {
        /// Mesh file (x y z or OBJ vertex lines); a synthetic shell otherwise
        #[arg(long)]
        mesh: Option<PathBuf>,

        /// Write render frames as NDJSON to this file
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Stop after this many milliseconds even if stdin stays open
        #[arg(long)]
        duration_ms: Option<u64>,
    },

    /// Band summary and mood distribution over a trailing window
    Summary {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Window such as 15s, 10m, 6h or 3d
        #[arg(short, long, default_value = "10m")]
        window: String,

        /// Window end in ms since the epoch; defaults to the latest sample
        #[arg(long)]
        now_ms: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration, mesh and input health
    Doctor {
        /// Check a mesh file
        #[arg(long)]
        mesh: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level) {
        eprintln!("{}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StressCliError> {
    let Cli {
        config, command, ..
    } = cli;

    match command {
        Commands::Replay {
            input,
            input_format,
        } => cmd_replay(&load_config(config.as_deref())?, &input, input_format),

        Commands::Run {
            mesh,
            frames,
            duration_ms,
        } => cmd_run(
            load_config(config.as_deref())?,
            mesh.as_deref(),
            frames.as_deref(),
            duration_ms,
        ),

        Commands::Summary {
            input,
            input_format,
            window,
            now_ms,
            json,
        } => cmd_summary(
            &load_config(config.as_deref())?,
            &input,
            input_format,
            &window,
            now_ms,
            json,
        ),

        Commands::Doctor { mesh, json } => cmd_doctor(config.as_deref(), mesh.as_deref(), json),

        Commands::Config => {
            println!("{}", load_config(config.as_deref())?.to_json()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<FluxConfig, StressCliError> {
    match path {
        Some(path) => Ok(FluxConfig::from_file(path)?),
        None => Ok(FluxConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, StressCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

/// Parse records and collect every sample, including aggregates derived
/// from band frames
fn load_samples(
    config: &FluxConfig,
    input: &Path,
    input_format: InputFormat,
) -> Result<Vec<Sample>, StressCliError> {
    let input_data = read_input(input)?;
    let records = match input_format {
        InputFormat::Ndjson => RecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RecordAdapter::parse_array(&input_data)?,
    };

    let now = chrono::Utc::now().timestamp_millis();
    let batch = RecordAdapter::split(records, now);
    let mut samples = batch.samples;

    if !batch.bands.is_empty() {
        let mut acquisition = Acquisition::new(&config.acquisition, &config.scoring);
        for frame in &batch.bands {
            samples.extend(acquisition.process(frame, now).sample);
        }
        let stats = acquisition.stats();
        info!(
            frames = stats.frames,
            aggregates = stats.aggregates,
            drowsy = stats.drowsy,
            poor_contact = stats.poor_contact,
            "band frames processed"
        );
    }

    if samples.is_empty() {
        return Err(StressCliError::NoSamples);
    }
    Ok(order_history(samples))
}

fn cmd_replay(
    config: &FluxConfig,
    input: &Path,
    input_format: InputFormat,
) -> Result<(), StressCliError> {
    let samples = load_samples(config, input, input_format)?;
    let outcome = replay_samples(samples, config)?;

    let mut stdout = io::stdout().lock();
    for change in &outcome.changes {
        writeln!(stdout, "{}", serde_json::to_string(change)?)?;
    }
    writeln!(
        stdout,
        "{}",
        serde_json::json!({
            "samples": outcome.samples,
            "changes": outcome.changes.len(),
            "final_status": outcome.final_status,
        })
    )?;
    Ok(())
}

fn cmd_run(
    config: FluxConfig,
    mesh: Option<&Path>,
    frames: Option<&Path>,
    duration_ms: Option<u64>,
) -> Result<(), StressCliError> {
    let mesh = match mesh {
        Some(path) => Mesh::from_xyz_str(&fs::read_to_string(path)?)?,
        None => Mesh::synthetic_shell(SYNTHETIC_VERTICES),
    };
    let writer: Box<dyn Write + Send> = match frames {
        Some(path) => Box::new(io::BufWriter::new(fs::File::create(path)?)),
        None => Box::new(io::sink()),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_session(config, mesh, writer, duration_ms))
}

async fn run_session(
    config: FluxConfig,
    mesh: Mesh,
    writer: Box<dyn Write + Send>,
    duration_ms: Option<u64>,
) -> Result<(), StressCliError> {
    let mut handle = Session::start(
        config,
        Some(mesh),
        NdjsonRenderTarget::new(writer),
        Arc::new(SystemClock),
    )?;

    let printer = match handle.level_changes() {
        Some(mut changes) => tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                match serde_json::to_string(&change) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!(error = %e, "level change not encoded"),
                }
            }
        }),
        None => tokio::spawn(async {}),
    };

    let reader = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut line_num = 0;
        while let Some(line) = lines.next_line().await? {
            line_num += 1;
            if let Some(record) = RecordAdapter::parse_line(&line, line_num)? {
                handle.ingest(IngestEvent::Record(record)).await?;
            }
        }
        Ok::<(), StressCliError>(())
    };

    match duration_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), reader).await {
            Ok(result) => result?,
            Err(_) => info!(duration_ms = ms, "run duration elapsed"),
        },
        None => reader.await?,
    }

    let status = handle.status();
    handle.stop().await?;
    printer
        .await
        .map_err(|e| StressCliError::Session(e.to_string()))?;

    println!("{}", serde_json::json!({ "final_status": status }));
    Ok(())
}

fn cmd_summary(
    config: &FluxConfig,
    input: &Path,
    input_format: InputFormat,
    window: &str,
    now_ms: Option<i64>,
    json: bool,
) -> Result<(), StressCliError> {
    let window = WindowSpec::parse(window)?;
    let samples = load_samples(config, input, input_format)?;
    let now = now_ms
        .or_else(|| samples.last().map(|s| s.timestamp_ms))
        .unwrap_or(0);

    let bands = BandSummary::from_samples(&samples, window, now);
    let moods = MoodDistribution::from_samples(&samples, window, now);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "window": window.to_string(),
                "now_ms": now,
                "bands": bands,
                "moods": moods,
            }))?
        );
        return Ok(());
    }

    println!("Window {} ending at {}", window, now);
    if bands.no_data {
        println!("  no samples in window");
    } else {
        println!("  samples:          {}", bands.sample_count);
        println!("  alpha:            {:.4}", bands.alpha);
        println!("  beta:             {:.4}", bands.beta);
        println!("  theta:            {:.4}", bands.theta);
        println!("  beta/alpha ratio: {:.4}", bands.beta_alpha_ratio);
        println!("  beta/theta ratio: {:.4}", bands.beta_theta_ratio);
    }
    println!("\nMood distribution:");
    for bucket in &moods.buckets {
        println!(
            "  {:<9} {:>5} samples  {:>7.1}",
            bucket.mood.as_str(),
            bucket.count,
            bucket.value
        );
    }
    Ok(())
}

fn cmd_doctor(
    config_path: Option<&Path>,
    mesh: Option<&Path>,
    json: bool,
) -> Result<(), StressCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Flux version {}", FLUX_VERSION),
    });

    checks.push(DoctorCheck {
        name: "record_schema".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", RECORD_SCHEMA_VERSION),
    });

    let config_check = match config_path {
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        },
        Some(path) if !path.exists() => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: "Config file does not exist".to_string(),
        },
        Some(path) => match FluxConfig::from_file(path) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid ({} electrodes, {} ms window)",
                    config.fusion.electrodes.len(),
                    config.window.stress_window_ms
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {}", e),
            },
        },
    };
    checks.push(config_check);

    if let Some(mesh_path) = mesh {
        let mesh_check = if mesh_path.exists() {
            match fs::read_to_string(mesh_path)
                .map_err(ComputeError::from)
                .and_then(|text| Mesh::from_xyz_str(&text))
            {
                Ok(mesh) => DoctorCheck {
                    name: "mesh".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Mesh valid ({} vertices)", mesh.len()),
                },
                Err(e) => DoctorCheck {
                    name: "mesh".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid mesh: {}", e),
                },
            }
        } else {
            DoctorCheck {
                name: "mesh".to_string(),
                status: CheckStatus::Warning,
                message: "Mesh file does not exist; a synthetic shell will be used".to_string(),
            }
        };
        checks.push(mesh_check);
    }

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
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Flux Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StressCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum StressCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoSamples,
    DoctorFailed,
    Session(String),
}

impl From<io::Error> for StressCliError {
    fn from(e: io::Error) -> Self {
        StressCliError::Io(e)
    }
}

impl From<ComputeError> for StressCliError {
    fn from(e: ComputeError) -> Self {
        StressCliError::Compute(e)
    }
}

impl From<serde_json::Error> for StressCliError {
    fn from(e: serde_json::Error) -> Self {
        StressCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StressCliError> for CliError {
    fn from(e: StressCliError) -> Self {
        match e {
            StressCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StressCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Run 'stressflux config' to see the defaults")
                    }
                    ComputeError::WindowError(_) => {
                        ("WINDOW_ERROR", "Use a window such as 15s, 10m, 6h or 3d")
                    }
                    ComputeError::MeshError(_) => {
                        ("MESH_ERROR", "Mesh files hold one 'x y z' or 'v x y z' per line")
                    }
                    ComputeError::SessionClosed(_) => {
                        ("SESSION_CLOSED", "The live session stopped unexpectedly")
                    }
                    _ => (
                        "PARSE_ERROR",
                        "Ensure input records carry kind sample, electrode or bands",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            StressCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StressCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input contains sample or bands records".to_string()),
            },
            StressCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            StressCliError::Session(msg) => CliError {
                code: "SESSION_ERROR".to_string(),
                message: msg,
                hint: None,
            },
        }
    }
}

// Report types

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
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

