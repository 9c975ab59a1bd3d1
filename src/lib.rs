pub mod capture;
pub mod config;
pub mod device;
pub mod encode;

pub use capture::{
    Artifact, ArtifactInbox, ArtifactListener, CaptureError, CaptureEvent, CaptureMode,
    CaptureSession, CaptureState, ImportedFile, MediaKind, ReleaseHandle, SessionStatus, SourceTag,
};
pub use config::{CaptureConfig, Config};
pub use device::{
    CameraBackend, Facing, Frame, MediaChunk, MediaRecorder, MediaStream, SimulatedCamera,
    SimulatedCameraConfig, StreamLedger, StreamRequest,
};
pub use encode::{FrameEncoder, JpegEncoder};
