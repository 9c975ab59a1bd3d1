use serde::{Deserialize, Serialize};

/// Capture session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// No stream, no artifact
    Idle,
    /// Camera stream active, viewfinder showing
    Live,
    /// Live plus an active recorder and running timer
    Recording,
    /// Artifact finalized, stream released
    Captured,
    /// Acquisition or finalization failed; no stream held
    Error,
}

impl CaptureState {
    /// States in which the session owns a device stream
    pub fn holds_stream(self) -> bool {
        matches!(self, CaptureState::Live | CaptureState::Recording)
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::Live => "live",
            CaptureState::Recording => "recording",
            CaptureState::Captured => "captured",
            CaptureState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Artifact type produced by the next capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
}

impl CaptureMode {
    /// Microphone is only requested when recording video
    pub fn wants_audio(self) -> bool {
        matches!(self, CaptureMode::Video)
    }
}
