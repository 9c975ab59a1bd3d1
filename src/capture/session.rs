use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};
use tracing::{debug, error, info, warn};

use super::artifact::{Artifact, ImportedFile, SourceTag};
use super::error::CaptureError;
use super::event::CaptureEvent;
use super::listener::ArtifactListener;
use super::plan::AcquisitionPlan;
use super::state::{CaptureMode, CaptureState};
use super::status::{recording_label, SessionStatus};
use crate::config::CaptureConfig;
use crate::device::{CameraBackend, Facing, MediaChunk, MediaRecorder, MediaStream, StreamRequest};
use crate::encode::{FrameEncoder, JpegEncoder};

const TICK: Duration = Duration::from_secs(1);

/// Requests release of a session from outside its borrow
///
/// Honored at the start of every session operation, when an in-flight
/// acquisition or first-frame wait completes, and before the next event is
/// delivered.
#[derive(Debug, Clone)]
pub struct ReleaseHandle {
    requested: Arc<AtomicBool>,
}

impl ReleaseHandle {
    pub fn request_release(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

/// Recorder, buffered chunks and timer of an in-progress recording
struct ActiveRecording {
    recorder: Box<dyn MediaRecorder>,
    /// `None` once the recorder closed its channel
    chunks_rx: Option<mpsc::Receiver<MediaChunk>>,
    buffer: Vec<MediaChunk>,
    timer: Interval,
    facing: Facing,
}

impl ActiveRecording {
    fn push(&mut self, chunk: MediaChunk) {
        buffer_chunk(&mut self.buffer, chunk);
    }
}

/// Append a chunk in arrival order; empty chunks carry no media
fn buffer_chunk(buffer: &mut Vec<MediaChunk>, chunk: MediaChunk) {
    if chunk.data.is_empty() {
        return;
    }
    if let Some(last) = buffer.last() {
        if chunk.sequence <= last.sequence {
            warn!(
                "Chunk {} arrived after chunk {}; keeping arrival order",
                chunk.sequence, last.sequence
            );
        }
    }
    buffer.push(chunk);
}

/// Camera capture workflow for a single capture widget
///
/// Owns the device stream while `Live` or `Recording` and hands finished
/// artifacts to its [`ArtifactListener`]. At most one stream is held at any
/// time, and a stream is never held together with an artifact.
pub struct CaptureSession {
    id: String,
    config: CaptureConfig,
    backend: Arc<dyn CameraBackend>,
    encoder: Box<dyn FrameEncoder>,
    listener: Box<dyn ArtifactListener>,

    state: CaptureState,
    mode: CaptureMode,
    /// Last-used facing direction
    facing: Facing,
    stream: Option<Box<dyn MediaStream>>,
    ready: bool,
    recording: Option<ActiveRecording>,
    elapsed_secs: u32,
    artifact: Option<Artifact>,
    last_error: Option<String>,
    release_requested: Arc<AtomicBool>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig, backend: Arc<dyn CameraBackend>) -> Self {
        let id = format!("capture-{}", uuid::Uuid::new_v4());
        let mut config = config;
        if config.max_duration_secs == 0 {
            warn!("max_duration_secs of 0 raised to 1 second");
            config.max_duration_secs = 1;
        }

        info!(
            "Creating capture session {} (backend={}, max={}s)",
            id,
            backend.name(),
            config.max_duration_secs
        );

        Self {
            id,
            encoder: Box::new(JpegEncoder::new(config.jpeg_quality)),
            listener: Box::new(|_: Option<Artifact>| {}),
            facing: config.default_facing,
            config,
            backend,
            state: CaptureState::Idle,
            mode: CaptureMode::default(),
            stream: None,
            ready: false,
            recording: None,
            elapsed_secs: 0,
            artifact: None,
            last_error: None,
            release_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_listener(mut self, listener: impl ArtifactListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    pub fn with_encoder(mut self, encoder: impl FrameEncoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn holds_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn max_duration_secs(&self) -> u32 {
        self.config.max_duration_secs
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn release_handle(&self) -> ReleaseHandle {
        ReleaseHandle {
            requested: Arc::clone(&self.release_requested),
        }
    }

    /// Overlay text while recording, e.g. `4s / 15s`
    pub fn recording_label(&self) -> Option<String> {
        (self.state == CaptureState::Recording)
            .then(|| recording_label(self.elapsed_secs, self.config.max_duration_secs))
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id.clone(),
            state: self.state,
            mode: self.mode,
            facing: self.facing,
            ready: self.ready,
            elapsed_secs: self.elapsed_secs,
            max_duration_secs: self.config.max_duration_secs,
            last_error: self.last_error.clone(),
            artifact: self.artifact.as_ref().map(Artifact::metadata),
        }
    }

    // ------------------------------------------------------------------
    // Camera lifecycle
    // ------------------------------------------------------------------

    /// Acquire a camera stream, falling back to the opposite facing once
    pub async fn acquire_camera(&mut self, facing: Facing) -> Result<(), CaptureError> {
        self.honor_release()?;
        match self.state {
            CaptureState::Recording | CaptureState::Captured => {
                return Err(self.invalid("acquire camera"));
            }
            _ => {}
        }

        self.teardown_stream();
        if self.state == CaptureState::Live {
            self.transition(CaptureState::Idle);
        }
        self.facing = facing;

        let plan = AcquisitionPlan::new(facing, self.config.facing_fallback);
        let mut failures = Vec::with_capacity(plan.remaining());

        for (attempt, direction) in plan.enumerate() {
            let request = self.stream_request(direction);
            if attempt > 0 {
                info!("Falling back to {} camera", direction);
            }
            info!(
                "Requesting {} camera ({}, audio={})",
                direction,
                direction.facing_mode(),
                request.audio
            );

            let result = self.backend.acquire(&request).await;
            match result {
                Ok(mut stream) => {
                    if self.release_requested.load(Ordering::SeqCst) {
                        info!("Session {} released during acquisition; stopping new stream", self.id);
                        stream.stop();
                        return self.honor_release();
                    }

                    self.stream = Some(stream);
                    self.facing = direction;
                    self.ready = false;
                    self.last_error = None;
                    self.transition(CaptureState::Live);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to acquire {} camera: {:#}", direction, e);
                    failures.push(format!("{}: {:#}", direction, e));
                }
            }
        }

        self.honor_release()?;
        self.fail(CaptureError::AcquisitionDenied(format!(
            "please ensure camera permissions are granted ({})",
            failures.join("; ")
        )))
    }

    /// Switch to the opposite camera
    pub async fn toggle_facing(&mut self) -> Result<(), CaptureError> {
        self.honor_release()?;
        match self.state {
            CaptureState::Recording | CaptureState::Captured => Err(self.invalid("switch camera")),
            _ => self.acquire_camera(self.facing.opposite()).await,
        }
    }

    /// Switch between photo and video capture
    ///
    /// A live stream is re-acquired on the same facing when the microphone
    /// requirement changes.
    pub async fn set_mode(&mut self, mode: CaptureMode) -> Result<(), CaptureError> {
        self.honor_release()?;
        if self.state == CaptureState::Recording {
            return Err(self.invalid("change mode"));
        }
        if self.mode == mode {
            return Ok(());
        }

        info!("Capture mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;

        let needs_reacquire = self.state == CaptureState::Live
            && self
                .stream
                .as_ref()
                .is_some_and(|s| s.has_audio() != mode.wants_audio());

        if needs_reacquire {
            return self.acquire_camera(self.facing).await;
        }
        Ok(())
    }

    /// Wait for the live stream's first frame
    pub async fn wait_ready(&mut self) -> Result<(), CaptureError> {
        self.honor_release()?;
        match self.state {
            CaptureState::Live => {}
            CaptureState::Recording => return Ok(()),
            _ => return Err(self.invalid("wait for camera")),
        }
        if self.ready {
            return Ok(());
        }

        let timeout = self.config.ready_timeout();
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::NoStream);
        };

        let outcome = tokio::time::timeout(timeout, stream.ready()).await;
        self.honor_release()?;
        match outcome {
            Ok(Ok(())) => {
                self.handle_event(CaptureEvent::FirstFrame).await;
                Ok(())
            }
            Ok(Err(e)) => self.fail(stream_ended(&format!("{:#}", e))),
            Err(_) => {
                warn!("No frame from {} camera after {:?}", self.facing, timeout);
                Err(CaptureError::NotReady)
            }
        }
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    /// Snapshot the current frame as a still image
    pub fn capture_photo(&mut self) -> Result<(), CaptureError> {
        self.honor_release()?;
        if self.state != CaptureState::Live {
            return Err(self.invalid("capture photo"));
        }
        let Some(stream) = self.stream.as_ref() else {
            return Err(CaptureError::NoStream);
        };

        let frame = stream.current_frame();
        if frame.is_empty() {
            debug!("Photo requested before first frame");
            return Err(CaptureError::NotReady);
        }
        self.ready = true;
        let source = SourceTag::from(stream.facing());

        match self.encoder.encode(&frame) {
            Ok(image) if !image.is_empty() => {
                info!(
                    "Captured {}x{} photo from {} ({} bytes)",
                    frame.width,
                    frame.height,
                    source,
                    image.len()
                );
                let artifact = Artifact::new(
                    image,
                    self.encoder.mime_type(),
                    source,
                    self.encoder.file_name(),
                );
                self.finish_capture(artifact);
                Ok(())
            }
            Ok(_) => self.fail(CaptureError::EncodingFailed("encoder produced an empty image".to_string())),
            Err(e) => self.fail(CaptureError::EncodingFailed(format!("{:#}", e))),
        }
    }

    /// Start chunked recording and the one-second timer
    pub async fn start_recording(&mut self) -> Result<(), CaptureError> {
        self.honor_release()?;
        match self.state {
            CaptureState::Live => {}
            CaptureState::Idle | CaptureState::Error => return Err(CaptureError::NoStream),
            _ => return Err(self.invalid("start recording")),
        }
        if self.mode != CaptureMode::Video {
            return Err(self.invalid("start recording in photo mode"));
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::NoStream);
        };

        if !self.ready {
            if stream.current_frame().is_empty() {
                return Err(CaptureError::NotReady);
            }
            self.ready = true;
        }

        let facing = stream.facing();
        let mut recorder = match stream.recorder() {
            Ok(recorder) => recorder,
            Err(e) => return self.fail(CaptureError::EncodingFailed(format!("could not create recorder: {:#}", e))),
        };
        let chunks_rx = match recorder.start() {
            Ok(rx) => rx,
            Err(e) => return self.fail(CaptureError::EncodingFailed(format!("could not start recorder: {:#}", e))),
        };

        self.recording = Some(ActiveRecording {
            recorder,
            chunks_rx: Some(chunks_rx),
            buffer: Vec::new(),
            timer: tokio::time::interval_at(Instant::now() + TICK, TICK),
            facing,
        });
        self.elapsed_secs = 0;
        self.last_error = None;
        info!(
            "Recording from {} camera (max {}s)",
            facing, self.config.max_duration_secs
        );
        self.transition(CaptureState::Recording);
        Ok(())
    }

    /// Finalize the recording into a video artifact
    ///
    /// Outside `Recording` this is a no-op. A pending release discards the
    /// recording instead of finalizing it.
    pub async fn stop_recording(&mut self) -> Result<(), CaptureError> {
        self.honor_release()?;
        if self.state != CaptureState::Recording {
            debug!("stop_recording ignored in {} state", self.state);
            return Ok(());
        }
        let Some(recording) = self.recording.take() else {
            return self.fail(CaptureError::EncodingFailed("recorder missing".to_string()));
        };

        let ActiveRecording {
            mut recorder,
            chunks_rx,
            mut buffer,
            timer,
            facing,
        } = recording;
        drop(timer);

        if let Err(e) = recorder.stop() {
            warn!("Recorder stop failed: {:#}", e);
        }

        if let Some(mut rx) = chunks_rx {
            let timeout = self.config.finalize_timeout();
            let drain = async {
                while let Some(chunk) = rx.recv().await {
                    buffer_chunk(&mut buffer, chunk);
                }
            };
            if tokio::time::timeout(timeout, drain).await.is_err() {
                warn!(
                    "Recorder did not flush within {:?}; finalizing {} buffered chunks",
                    timeout,
                    buffer.len()
                );
            }
        }

        let duration = self.elapsed_secs;
        let mime_type = match recorder.mime_type() {
            "" => self.config.video_mime.clone(),
            mime => mime.to_string(),
        };
        let chunk_count = buffer.len();
        let payload: Vec<u8> = buffer
            .into_iter()
            .flat_map(|chunk| chunk.data)
            .collect();

        if payload.is_empty() {
            return self.fail(CaptureError::EncodingFailed("recording produced no data".to_string()));
        }

        info!(
            "Recording finalized: {}s, {} chunks, {} bytes",
            duration,
            chunk_count,
            payload.len()
        );

        let artifact = Artifact::new(
            payload,
            mime_type.as_str(),
            SourceTag::from(facing),
            video_file_name(&mime_type),
        )
        .with_duration(duration);
        self.finish_capture(artifact);
        Ok(())
    }

    /// Use a local file instead of the camera
    pub fn import_file(&mut self, file: ImportedFile) -> Result<(), CaptureError> {
        self.honor_release()?;
        if self.state == CaptureState::Recording {
            return Err(self.invalid("import a file"));
        }
        if !file.is_supported() {
            return Err(CaptureError::UnsupportedMedia(format!(
                "{} ({})",
                file.name, file.mime_type
            )));
        }
        if file.bytes.is_empty() {
            return Err(CaptureError::UnsupportedMedia(format!("{} is empty", file.name)));
        }

        info!(
            "Importing {} ({}, {} bytes)",
            file.name,
            file.mime_type,
            file.bytes.len()
        );
        let artifact = Artifact::new(file.bytes, file.mime_type, SourceTag::FileUpload, file.name);
        self.finish_capture(artifact);
        Ok(())
    }

    /// Discard the artifact (or error) and reopen the last-used camera
    pub async fn retake(&mut self) -> Result<(), CaptureError> {
        self.honor_release()?;
        match self.state {
            CaptureState::Captured | CaptureState::Error => {}
            _ => return Err(self.invalid("retake")),
        }

        let discarded = self.artifact.take();
        self.last_error = None;
        self.elapsed_secs = 0;
        if let Some(artifact) = discarded {
            info!("Discarding {} artifact", artifact.source);
            self.listener.on_artifact_ready(None);
        }
        self.transition(CaptureState::Idle);

        self.acquire_camera(self.facing).await
    }

    /// Stop all device tracks and clear the session
    ///
    /// Safe in every state; also runs when the session is dropped.
    pub fn release(&mut self) {
        self.release_requested.store(false, Ordering::SeqCst);
        let had_stream = self.stream.is_some();
        self.teardown_stream();
        self.artifact = None;
        self.last_error = None;
        self.elapsed_secs = 0;
        if self.state != CaptureState::Idle {
            self.transition(CaptureState::Idle);
        }
        if had_stream {
            info!("Capture session {} released", self.id);
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Wait for the next platform event
    ///
    /// Returns `None` when nothing is pending in the current state or the
    /// session was released through a [`ReleaseHandle`].
    pub async fn next_event(&mut self) -> Option<CaptureEvent> {
        self.honor_release().ok()?;

        match self.state {
            CaptureState::Live if !self.ready => {
                let stream = self.stream.as_mut()?;
                let outcome = stream.ready().await;
                self.honor_release().ok()?;
                Some(match outcome {
                    Ok(()) => CaptureEvent::FirstFrame,
                    Err(e) => CaptureEvent::StreamEnded(format!("{:#}", e)),
                })
            }
            CaptureState::Recording => {
                let recording = self.recording.as_mut()?;
                match recording.chunks_rx.as_mut() {
                    // Timer first so a busy recorder cannot postpone auto-stop
                    Some(rx) => tokio::select! {
                        biased;
                        _ = recording.timer.tick() => Some(CaptureEvent::Tick),
                        chunk = rx.recv() => Some(match chunk {
                            Some(chunk) => CaptureEvent::Chunk(chunk),
                            None => CaptureEvent::RecorderClosed,
                        }),
                    },
                    None => {
                        recording.timer.tick().await;
                        Some(CaptureEvent::Tick)
                    }
                }
            }
            _ => None,
        }
    }

    /// Apply an event; events that do not apply to the current state are ignored
    pub async fn handle_event(&mut self, event: CaptureEvent) {
        match (self.state, event) {
            (CaptureState::Live, CaptureEvent::FirstFrame) => {
                if !self.ready {
                    self.ready = true;
                    info!("{} camera ready", self.facing);
                }
            }
            (CaptureState::Live, CaptureEvent::StreamEnded(reason)) => {
                if let Err(e) = self.fail(stream_ended(&reason)) {
                    warn!("Live stream lost: {}", e);
                }
            }
            (CaptureState::Recording, CaptureEvent::Tick) => {
                let max = self.config.max_duration_secs;
                self.elapsed_secs = (self.elapsed_secs + 1).min(max);
                debug!("Recording {}", recording_label(self.elapsed_secs, max));
                if self.elapsed_secs >= max {
                    info!("Maximum duration of {}s reached", max);
                    if let Err(e) = self.stop_recording().await {
                        warn!("Auto-stop did not produce a video: {}", e);
                    }
                }
            }
            (CaptureState::Recording, CaptureEvent::Chunk(chunk)) => {
                if let Some(recording) = self.recording.as_mut() {
                    recording.push(chunk);
                }
            }
            (CaptureState::Recording, CaptureEvent::DurationExceeded) => {
                if let Err(e) = self.stop_recording().await {
                    warn!("Stop on duration exceeded failed: {}", e);
                }
            }
            (CaptureState::Recording, CaptureEvent::RecorderClosed) => {
                if let Some(recording) = self.recording.as_mut() {
                    recording.chunks_rx = None;
                }
                warn!("Recorder closed unexpectedly; finalizing");
                if let Err(e) = self.stop_recording().await {
                    warn!("Finalizing closed recorder failed: {}", e);
                }
            }
            (state, event) => {
                debug!("Ignoring {} event in {} state", event.name(), state);
            }
        }
    }

    /// Deliver one pending event; `false` when nothing is pending
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Pump events until the current recording has been finalized
    pub async fn run_recording(&mut self) {
        while self.state == CaptureState::Recording && self.pump().await {}
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Release if a [`ReleaseHandle`] asked for it, rejecting the caller
    fn honor_release(&mut self) -> Result<(), CaptureError> {
        if !self.release_requested.load(Ordering::SeqCst) {
            return Ok(());
        }
        info!("Honoring release request for session {}", self.id);
        self.release();
        Err(CaptureError::Released)
    }

    fn stream_request(&self, facing: Facing) -> StreamRequest {
        StreamRequest {
            facing,
            audio: self.mode.wants_audio(),
            ideal_width: self.config.ideal_width,
            ideal_height: self.config.ideal_height,
        }
    }

    /// Cancel timer and recorder, then stop the device tracks
    fn teardown_stream(&mut self) {
        if let Some(mut recording) = self.recording.take() {
            if let Err(e) = recording.recorder.stop() {
                debug!("Recorder stop during teardown: {:#}", e);
            }
            debug!("Discarding {} unfinalized chunks", recording.buffer.len());
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("Released {} camera stream", stream.facing());
        }
        self.ready = false;
    }

    fn finish_capture(&mut self, artifact: Artifact) {
        self.teardown_stream();
        self.elapsed_secs = 0;
        self.last_error = None;
        self.artifact = Some(artifact.clone());
        self.transition(CaptureState::Captured);
        self.listener.on_artifact_ready(Some(artifact));
    }

    fn fail(&mut self, err: CaptureError) -> Result<(), CaptureError> {
        error!("Capture session {} failed: {}", self.id, err);
        self.teardown_stream();
        self.artifact = None;
        self.elapsed_secs = 0;
        self.last_error = Some(err.to_string());
        self.transition(CaptureState::Error);
        Err(err)
    }

    fn invalid(&self, operation: &'static str) -> CaptureError {
        debug!("Rejected {} in {} state", operation, self.state);
        CaptureError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn transition(&mut self, next: CaptureState) {
        if self.state != next {
            info!("Capture session {}: {} -> {}", self.id, self.state, next);
            self.state = next;
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.stream.is_some() || self.recording.is_some() {
            self.release();
        }
    }
}

fn stream_ended(reason: &str) -> CaptureError {
    CaptureError::AcquisitionDenied(format!("camera stream ended: {}", reason))
}

fn video_file_name(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or_default().trim() {
        "video/mp4" => "capture.mp4",
        "video/quicktime" => "capture.mov",
        _ => "capture.webm",
    }
}
