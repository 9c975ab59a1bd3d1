use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::device::Facing;

/// Where an artifact originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "front-camera")]
    FrontCamera,
    #[serde(rename = "rear-camera")]
    RearCamera,
    #[serde(rename = "file-upload")]
    FileUpload,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::FrontCamera => "front-camera",
            SourceTag::RearCamera => "rear-camera",
            SourceTag::FileUpload => "file-upload",
        }
    }
}

impl From<Facing> for SourceTag {
    fn from(facing: Facing) -> Self {
        match facing {
            Facing::Front => SourceTag::FrontCamera,
            Facing::Rear => SourceTag::RearCamera,
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Anything that is not `video/*` is displayed as an image
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// Finalized media produced by a capture or import
///
/// The payload is immutable and shared: clones handed to the host keep
/// pointing at the same bytes even after the session discards its copy.
#[derive(Debug, Clone)]
pub struct Artifact {
    payload: Arc<[u8]>,
    pub mime_type: String,
    pub source: SourceTag,
    pub kind: MediaKind,
    pub file_name: String,
    pub captured_at: DateTime<Utc>,
    /// Recorded length, for video captured from the camera
    pub duration_secs: Option<u32>,
}

impl Artifact {
    pub fn new(payload: Vec<u8>, mime_type: impl Into<String>, source: SourceTag, file_name: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            payload: payload.into(),
            kind: MediaKind::from_mime(&mime_type),
            mime_type,
            source,
            file_name: file_name.into(),
            captured_at: Utc::now(),
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Whether two artifacts share the same payload allocation
    pub fn shares_payload(&self, other: &Artifact) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }

    /// Inline `data:` URL for previewing the artifact
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.payload)
        )
    }

    pub fn metadata(&self) -> ArtifactMetadata {
        ArtifactMetadata {
            mime_type: self.mime_type.clone(),
            source: self.source,
            kind: self.kind,
            file_name: self.file_name.clone(),
            size_bytes: self.payload.len(),
            captured_at: self.captured_at,
            duration_secs: self.duration_secs,
        }
    }
}

/// Serializable description of an artifact (payload excluded)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub mime_type: String,
    pub source: SourceTag,
    pub kind: MediaKind,
    pub file_name: String,
    pub size_bytes: usize,
    pub captured_at: DateTime<Utc>,
    pub duration_secs: Option<u32>,
}

/// A locally selected file offered for import
#[derive(Debug, Clone)]
pub struct ImportedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImportedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, inferring its MIME type from the extension
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening media file: {}", path.display());

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read media file: {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            mime_type: mime_from_extension(path).to_string(),
            name,
            bytes,
        })
    }

    /// Only images and videos can be attached
    pub fn is_supported(&self) -> bool {
        self.mime_type.starts_with("image/") || self.mime_type.starts_with("video/")
    }
}

/// Best-effort MIME type for common photo and video extensions
pub fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "webm" => "video/webm",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "3gp" => "video/3gpp",
        _ => "application/octet-stream",
    }
}
