use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Which physical camera a stream is requested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// User-facing camera
    Front,
    /// Environment-facing camera
    Rear,
}

impl Facing {
    pub fn opposite(self) -> Self {
        match self {
            Facing::Front => Facing::Rear,
            Facing::Rear => Facing::Front,
        }
    }

    /// Platform facing-mode name (`user` / `environment`)
    pub fn facing_mode(self) -> &'static str {
        match self {
            Facing::Front => "user",
            Facing::Rear => "environment",
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Rear => write!(f, "rear"),
        }
    }
}

impl std::str::FromStr for Facing {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(Facing::Front),
            "rear" | "back" | "environment" => Ok(Facing::Rear),
            other => anyhow::bail!("Unknown facing direction: {}", other),
        }
    }
}

/// Parameters for a single stream acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: Facing,
    /// Request a microphone track alongside video
    pub audio: bool,
    /// Preferred frame width in pixels (platform may pick another)
    pub ideal_width: u32,
    /// Preferred frame height in pixels
    pub ideal_height: u32,
}

/// A single rendered video frame (8-bit RGB, row-major)
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl Frame {
    /// Zero-dimension frame reported before the stream has rendered anything
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            rgb: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Encoded media fragment delivered during recording
#[derive(Debug, Clone)]
pub struct MediaChunk {
    /// Position in capture order (0-indexed)
    pub sequence: u64,
    pub data: Vec<u8>,
}

/// Camera/microphone acquisition capability
#[async_trait::async_trait]
pub trait CameraBackend: Send + Sync {
    /// Negotiate a device stream for the requested facing direction
    ///
    /// Fails when the platform refuses access or has no matching device.
    async fn acquire(&self, request: &StreamRequest) -> Result<Box<dyn MediaStream>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// A live device stream (one video track, optionally one audio track)
#[async_trait::async_trait]
pub trait MediaStream: Send {
    fn facing(&self) -> Facing;

    fn has_audio(&self) -> bool;

    /// Wait until the first frame has been rendered
    async fn ready(&mut self) -> Result<()>;

    /// Current frame; zero-sized until the first frame is available
    fn current_frame(&self) -> Frame;

    /// Create a chunked recorder over this stream
    fn recorder(&mut self) -> Result<Box<dyn MediaRecorder>>;

    /// Stop all underlying device tracks
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Chunk-based media recorder attached to a live stream
pub trait MediaRecorder: Send {
    /// Start recording
    ///
    /// Returns a channel receiver that yields chunks in capture order. The
    /// channel closes once the recorder has flushed its last chunk after `stop`.
    fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>>;

    /// Request the recorder to flush and stop
    fn stop(&mut self) -> Result<()>;

    /// Container MIME type of the produced chunks
    fn mime_type(&self) -> &str;
}
