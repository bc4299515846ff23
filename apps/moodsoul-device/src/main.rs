//! MoodSoul Device - headless device for bench use.
//!
//! Runs the same interaction engine as the firmware against a real endpoint,
//! with simulated peripherals: gestures typed on stdin, a tone-generating
//! microphone, a file-backed camera, and feedback written to the log or as
//! JSON lines on stdout.

mod config;
mod sim;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use moodsoul_core::{
    AmplitudeMeter, DeviceRuntime, Feedback, JsonLinesFeedback, LoggingFeedback, NullSink,
    Peripherals, PlaybackSink,
};
use tokio::runtime::Runtime;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::DeviceConfig;
use crate::sim::{ConsoleSensors, FileCamera, ResponseRecorder, ToneMicrophone};

/// MoodSoul Device - simulated MoodSoul hardware talking to a real server.
#[derive(Parser, Debug)]
#[command(name = "moodsoul-device")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "MOODSOUL_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Server host (overrides config file).
    #[arg(short = 'H', long, env = "MOODSOUL_SERVER_HOST")]
    host: Option<String>,

    /// Server port (overrides config file).
    #[arg(short = 'p', long, env = "MOODSOUL_SERVER_PORT")]
    port: Option<u16>,

    /// Device identifier (overrides config file).
    #[arg(short = 'i', long, env = "MOODSOUL_DEVICE_ID")]
    device_id: Option<String>,

    /// JPEG served by the simulated camera.
    #[arg(long, value_name = "FILE")]
    image: Option<PathBuf>,

    /// Save every response body into this directory.
    #[arg(long, value_name = "DIR")]
    record_dir: Option<PathBuf>,

    /// Tone frequency of the simulated microphone (Hz).
    #[arg(long, default_value_t = 440.0)]
    tone_hz: f32,

    /// Write feedback events as JSON lines on stdout instead of logging them.
    #[arg(long)]
    json_feedback: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for --json-feedback
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("MoodSoul Device v{}", env!("CARGO_PKG_VERSION"));

    // One cooperative loop: the whole device runs on a single thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    block_on_then_shutdown(runtime, run(args))
}

/// How long shutdown waits for blocking-pool work (the stdin reader) to end.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Drives `future` to completion, then stops the runtime.
///
/// A stdin read parked on the blocking pool cannot be interrupted, and an
/// implicit runtime drop would wait on it until the next line arrives.
fn block_on_then_shutdown<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    output
}

async fn run(args: Args) -> Result<()> {
    // Load configuration
    let mut config =
        DeviceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.server_host = host;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(device_id) = args.device_id {
        config.device_id = Some(device_id);
    }
    if let Some(image) = args.image {
        config.image_path = Some(image);
    }
    if let Some(dir) = args.record_dir {
        config.record_dir = Some(dir);
    }

    let core_config = config.to_core_config();
    core_config
        .validate()
        .context("Invalid configuration")?;

    log::info!(
        "Configuration: device_id={}, endpoint=http://{}{}",
        core_config.device_id,
        core_config.endpoint.addr(),
        core_config.endpoint.path
    );
    match &config.image_path {
        Some(path) => log::info!("Camera serves {}", path.display()),
        None => log::info!("No --image given; camera serves a placeholder frame"),
    }

    let feedback: Arc<dyn Feedback> = if args.json_feedback {
        Arc::new(JsonLinesFeedback::new(std::io::stdout()))
    } else {
        Arc::new(LoggingFeedback)
    };

    let recorder: Box<dyn PlaybackSink> = match &config.record_dir {
        Some(dir) => {
            log::info!("Saving responses to {}", dir.display());
            Box::new(
                ResponseRecorder::new(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?,
            )
        }
        None => Box::new(NullSink),
    };
    let speaker = AmplitudeMeter::new(feedback.clone()).with_inner(recorder);

    let cancel = CancellationToken::new();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    tokio::spawn(sim::read_console(commands_tx, cancel.clone()));

    let io = Peripherals {
        sensors: Box::new(ConsoleSensors::new(commands_rx)),
        microphone: Box::new(ToneMicrophone::new(args.tone_hz)),
        camera: Box::new(FileCamera::new(config.image_path.clone())),
        speaker: Box::new(speaker),
        feedback,
    };

    let mut device =
        DeviceRuntime::new(core_config, io).context("Failed to start device runtime")?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping after the current interaction...");
        shutdown.cancel();
    });

    // Returns once cancelled (signal or `quit`)
    device.run(cancel).await;

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
