use super::state::CaptureState;

/// Capture session failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// Camera/microphone access refused or no matching device
    #[error("Could not access camera: {0}")]
    AcquisitionDenied(String),

    /// Capture attempted before the stream rendered its first frame
    #[error("Camera is not ready yet")]
    NotReady,

    /// Recording attempted without a live stream
    #[error("No active camera stream")]
    NoStream,

    /// Still-image or video finalization produced no usable payload
    #[error("Failed to produce media: {0}")]
    EncodingFailed(String),

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: CaptureState,
    },

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// A [`ReleaseHandle`](super::ReleaseHandle) request superseded the call
    #[error("Capture session was released")]
    Released,
}

impl CaptureError {
    /// Errors that move the session into the `Error` state
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::AcquisitionDenied(_) | CaptureError::EncodingFailed(_))
    }
}
