use crate::device::MediaChunk;

/// Platform events that drive the capture state machine
///
/// Every event is accepted in every state; events that do not apply to the
/// current state are ignored.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Live stream rendered its first frame
    FirstFrame,
    /// Live stream ended before producing a frame
    StreamEnded(String),
    /// One-second recording timer fired
    Tick,
    /// Recorder delivered a chunk of encoded media
    Chunk(MediaChunk),
    /// Platform reported the maximum recording duration was reached
    DurationExceeded,
    /// Recorder closed its chunk channel without being asked to stop
    RecorderClosed,
}

impl CaptureEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureEvent::FirstFrame => "first-frame",
            CaptureEvent::StreamEnded(_) => "stream-ended",
            CaptureEvent::Tick => "tick",
            CaptureEvent::Chunk(_) => "chunk",
            CaptureEvent::DurationExceeded => "duration-exceeded",
            CaptureEvent::RecorderClosed => "recorder-closed",
        }
    }
}
