pub mod backend;
pub mod simulated;

pub use backend::{CameraBackend, Facing, Frame, MediaChunk, MediaRecorder, MediaStream, StreamRequest};
pub use simulated::{SimulatedCamera, SimulatedCameraConfig, StreamLedger};
