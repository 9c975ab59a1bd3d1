//! Camera capture workflow
//!
//! This module provides the `CaptureSession` state machine that manages:
//! - Camera stream acquisition with a single facing-direction fallback
//! - Still-photo snapshots and chunked video recording
//! - The one-second recording timer and automatic stop at the duration cap
//! - File import as an alternative to the camera
//! - Hand-off of finished artifacts to the host

mod artifact;
mod error;
mod event;
mod listener;
mod plan;
mod session;
mod state;
mod status;

pub use artifact::{mime_from_extension, Artifact, ArtifactMetadata, ImportedFile, MediaKind, SourceTag};
pub use error::CaptureError;
pub use event::CaptureEvent;
pub use listener::{ArtifactInbox, ArtifactListener};
pub use plan::AcquisitionPlan;
pub use session::{CaptureSession, ReleaseHandle};
pub use state::{CaptureMode, CaptureState};
pub use status::{recording_label, SessionStatus};
