use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::Facing;

/// Environment variable prefix, e.g. `MEDIA_CAPTURE__MAX_DURATION_SECS=10`
const ENV_PREFIX: &str = "MEDIA";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Capture session settings, fixed for the lifetime of a session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recording auto-stops after this many seconds
    ///
    /// `Config::load` rejects 0; a session built directly from a zero value
    /// raises it to 1 second.
    pub max_duration_secs: u32,
    /// Facing used for the first acquisition
    pub default_facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// JPEG quality for still captures (1-100)
    pub jpeg_quality: u8,
    /// Try the opposite camera once when the requested one is refused
    pub facing_fallback: bool,
    /// How long `wait_ready` waits for the first frame
    pub ready_timeout_ms: u64,
    /// How long the recorder may take to flush its last chunks
    pub finalize_timeout_ms: u64,
    /// Fallback container type when the recorder does not report one
    pub video_mime: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 15,
            default_facing: Facing::Front,
            ideal_width: 1280,
            ideal_height: 720,
            jpeg_quality: 80,
            facing_fallback: true,
            ready_timeout_ms: 5000,
            finalize_timeout_ms: 2000,
            video_mime: "video/webm".to_string(),
        }
    }
}

impl CaptureConfig {
    pub fn with_max_duration(mut self, secs: u32) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_millis(self.finalize_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory where the CLI writes captured artifacts
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("captures"),
        }
    }
}

impl Config {
    /// Load configuration from an optional file, overridden by environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if cfg.capture.max_duration_secs == 0 {
            anyhow::bail!("capture.max_duration_secs must be at least 1");
        }
        cfg.capture.jpeg_quality = cfg.capture.jpeg_quality.clamp(1, 100);

        Ok(cfg)
    }
}
