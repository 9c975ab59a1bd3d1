use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use media_capture::{
    ArtifactInbox, CaptureMode, CaptureSession, CaptureState, Config, Facing, ImportedFile,
    SimulatedCamera, SimulatedCameraConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "capture-sim", version, about = "Drive a capture session against a simulated camera")]
struct Cli {
    /// Configuration file (toml, yaml, json)
    #[arg(long)]
    config: Option<String>,

    /// Where captured media is written (overrides output.dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Take a still photo
    Photo {
        #[arg(long)]
        facing: Option<Facing>,
        /// Camera directions that refuse access, e.g. `front,rear`
        #[arg(long, value_delimiter = ',')]
        deny: Vec<Facing>,
    },
    /// Record a video clip
    Video {
        #[arg(long)]
        facing: Option<Facing>,
        /// Stop after this many seconds (capped by capture.max_duration_secs)
        #[arg(long)]
        seconds: Option<u32>,
        #[arg(long, value_delimiter = ',')]
        deny: Vec<Facing>,
    },
    /// Attach an existing photo or video file
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;
    let output_dir = cli.output_dir.unwrap_or_else(|| cfg.output.dir.clone());

    info!("capture-sim v{}", env!("CARGO_PKG_VERSION"));
    info!("Max recording duration: {}s", cfg.capture.max_duration_secs);
    info!("Output directory: {}", output_dir.display());

    let deny = match &cli.command {
        Command::Photo { deny, .. } | Command::Video { deny, .. } => deny.clone(),
        Command::Import { .. } => Vec::new(),
    };
    let camera = Arc::new(SimulatedCamera::new(SimulatedCameraConfig {
        denied: deny.into_iter().collect(),
        ..Default::default()
    }));

    let inbox = ArtifactInbox::new();
    let mut session = CaptureSession::new(cfg.capture.clone(), camera.clone()).with_listener(inbox.clone());

    let outcome = match cli.command {
        Command::Photo { facing, .. } => {
            take_photo(&mut session, facing.unwrap_or(cfg.capture.default_facing)).await
        }
        Command::Video { facing, seconds, .. } => {
            record_video(&mut session, facing.unwrap_or(cfg.capture.default_facing), seconds).await
        }
        Command::Import { path } => {
            let file = ImportedFile::open(&path).await?;
            session.import_file(file).map_err(anyhow::Error::from)
        }
    };

    println!("{}", serde_json::to_string_pretty(&session.status())?);

    if let Err(e) = outcome {
        warn!("Capture did not complete: {:#}", e);
        session.release();
        return Err(e);
    }

    if let Some(artifact) = inbox.current() {
        let path = write_artifact(&output_dir, session.id(), &artifact.file_name, artifact.payload()).await?;
        info!("Wrote {} ({} bytes)", path.display(), artifact.len());
    }

    session.release();
    info!("Streams still live after release: {}", camera.ledger().live());

    Ok(())
}

async fn take_photo(session: &mut CaptureSession, facing: Facing) -> Result<()> {
    session.acquire_camera(facing).await?;
    session.wait_ready().await?;
    session.capture_photo()?;
    Ok(())
}

async fn record_video(session: &mut CaptureSession, facing: Facing, seconds: Option<u32>) -> Result<()> {
    session.set_mode(CaptureMode::Video).await?;
    session.acquire_camera(facing).await?;
    session.wait_ready().await?;
    session.start_recording().await?;

    let limit = seconds.unwrap_or(session.max_duration_secs());
    while session.state() == CaptureState::Recording && session.elapsed_secs() < limit {
        if let Some(label) = session.recording_label() {
            info!("Recording {}", label);
        }
        if !session.pump().await {
            break;
        }
    }
    session.stop_recording().await?;

    match session.state() {
        CaptureState::Captured => Ok(()),
        state => anyhow::bail!(
            "Recording ended in {} state: {}",
            state,
            session.last_error().unwrap_or("unknown error")
        ),
    }
}

async fn write_artifact(dir: &Path, session_id: &str, file_name: &str, payload: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let path = dir.join(format!("{}-{}", session_id, file_name));
    tokio::fs::write(&path, payload)
        .await
        .with_context(|| format!("Failed to write artifact: {}", path.display()))?;

    Ok(path)
}
