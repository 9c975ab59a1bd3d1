use serde::{Deserialize, Serialize};

use super::artifact::ArtifactMetadata;
use super::state::{CaptureMode, CaptureState};
use crate::device::Facing;

/// Point-in-time view of a capture session, for display by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,

    pub state: CaptureState,

    pub mode: CaptureMode,

    /// Facing of the live stream, or the one the next acquisition will use
    pub facing: Facing,

    /// Whether the live stream has rendered a frame
    pub ready: bool,

    /// Seconds recorded so far (0 outside recording)
    pub elapsed_secs: u32,

    pub max_duration_secs: u32,

    /// Human-readable description of the last failure
    pub last_error: Option<String>,

    pub artifact: Option<ArtifactMetadata>,
}

/// Recording overlay text, e.g. `3s / 15s`
pub fn recording_label(elapsed_secs: u32, max_duration_secs: u32) -> String {
    format!("{}s / {}s", elapsed_secs, max_duration_secs)
}
