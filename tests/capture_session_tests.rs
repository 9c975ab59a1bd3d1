// Integration tests for the capture session state machine
//
// These tests drive a CaptureSession against the simulated camera and check
// stream ownership, photo capture, file import and retake behavior.

use anyhow::Result;
use media_capture::{
    ArtifactInbox, CaptureConfig, CaptureError, CaptureMode, CaptureSession, CaptureState, Facing,
    Frame, FrameEncoder, ImportedFile, MediaKind, SimulatedCamera, SimulatedCameraConfig,
    SourceTag,
};
use std::sync::Arc;
use std::time::Duration;

fn session_with(camera: &Arc<SimulatedCamera>) -> (CaptureSession, ArtifactInbox) {
    let inbox = ArtifactInbox::new();
    let session =
        CaptureSession::new(CaptureConfig::default(), camera.clone()).with_listener(inbox.clone());
    (session, inbox)
}

fn camera_denying(facings: &[Facing]) -> Arc<SimulatedCamera> {
    Arc::new(SimulatedCamera::new(SimulatedCameraConfig {
        denied: facings.iter().copied().collect(),
        ..Default::default()
    }))
}

#[tokio::test(start_paused = true)]
async fn test_front_photo_end_to_end() -> Result<()> {
    // Setup: default simulated camera, front facing
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, inbox) = session_with(&camera);

    session.acquire_camera(Facing::Front).await?;
    assert_eq!(session.state(), CaptureState::Live);
    assert_eq!(camera.ledger().live(), 1);

    session.wait_ready().await?;
    assert!(session.is_ready());

    session.capture_photo()?;

    // Verify: stream released, artifact is a front-camera JPEG
    assert_eq!(session.state(), CaptureState::Captured);
    assert!(!session.holds_stream(), "Capture must release the stream");
    assert_eq!(camera.ledger().live(), 0);

    let artifact = session.artifact().expect("artifact stored").clone();
    assert_eq!(artifact.source, SourceTag::FrontCamera);
    assert_eq!(artifact.mime_type, "image/jpeg");
    assert_eq!(artifact.kind, MediaKind::Image);
    assert_eq!(artifact.file_name, "capture.jpg");
    assert_eq!(&artifact.payload()[..2], &[0xFF, 0xD8], "Payload should be a JPEG");

    // Host receives the same payload, not a copy
    assert_eq!(inbox.delivered(), 1);
    let delivered = inbox.current().expect("host received artifact");
    assert!(delivered.shares_payload(&artifact));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_photo_before_first_frame_is_not_ready() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::new(SimulatedCameraConfig {
        first_frame_delay: Duration::from_millis(500),
        ..Default::default()
    }));
    let (mut session, inbox) = session_with(&camera);

    session.acquire_camera(Facing::Rear).await?;

    // Verify: no frame yet, so the photo is refused without side effects
    assert_eq!(session.capture_photo(), Err(CaptureError::NotReady));
    assert_eq!(session.state(), CaptureState::Live, "NotReady must not change state");
    assert!(session.holds_stream());
    assert!(session.last_error().is_none());
    assert_eq!(inbox.delivered(), 0);

    session.wait_ready().await?;
    session.capture_photo()?;
    assert_eq!(session.artifact().map(|a| a.source), Some(SourceTag::RearCamera));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_toggle_never_holds_two_streams() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, _inbox) = session_with(&camera);

    // Setup: start on the front camera and flip nine times
    session.acquire_camera(Facing::Front).await?;
    for i in 0..9 {
        session.toggle_facing().await?;
        assert_eq!(camera.ledger().live(), 1, "Exactly one stream after toggle {}", i);
    }

    // Verify: ten acquisitions, never two at once
    assert_eq!(session.facing(), Facing::Rear);
    assert_eq!(camera.ledger().acquired(), 10);
    assert_eq!(camera.ledger().peak(), 1, "Two streams were held simultaneously");

    session.release();
    assert_eq!(camera.ledger().live(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_denied_permissions_both_facings() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::denying_all());
    let (mut session, inbox) = session_with(&camera);

    let result = session.acquire_camera(Facing::Front).await;

    // Verify: Error state with a message and no stream held
    assert!(matches!(result, Err(CaptureError::AcquisitionDenied(_))));
    assert_eq!(session.state(), CaptureState::Error);
    assert!(session.last_error().is_some());
    assert!(!session.holds_stream());
    assert_eq!(camera.ledger().live(), 0);
    assert_eq!(inbox.delivered(), 0);

    // One attempt for the requested facing, one fallback, nothing more
    let attempted: Vec<Facing> = camera.requests().iter().map(|r| r.facing).collect();
    assert_eq!(attempted, vec![Facing::Front, Facing::Rear]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fallback_to_opposite_facing() -> Result<()> {
    // Setup: rear camera refused
    let camera = camera_denying(&[Facing::Rear]);
    let (mut session, _inbox) = session_with(&camera);

    session.acquire_camera(Facing::Rear).await?;
    assert_eq!(session.state(), CaptureState::Live);
    assert_eq!(session.facing(), Facing::Front);

    session.wait_ready().await?;
    session.capture_photo()?;
    assert_eq!(session.artifact().map(|a| a.source), Some(SourceTag::FrontCamera));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fallback_can_be_disabled() -> Result<()> {
    let camera = camera_denying(&[Facing::Front]);
    let config = CaptureConfig {
        facing_fallback: false,
        ..Default::default()
    };
    let mut session = CaptureSession::new(config, camera.clone());

    assert!(session.acquire_camera(Facing::Front).await.is_err());
    assert_eq!(session.state(), CaptureState::Error);
    assert_eq!(camera.requests().len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_import_replaces_live_stream() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, inbox) = session_with(&camera);

    session.acquire_camera(Facing::Front).await?;
    session.wait_ready().await?;
    assert_eq!(camera.ledger().live(), 1);

    session.import_file(ImportedFile::new("evidence.png", "image/png", vec![0x89, b'P', b'N', b'G']))?;

    // Verify
    assert_eq!(camera.ledger().live(), 0, "Import must release the live stream");
    assert_eq!(session.state(), CaptureState::Captured);
    let artifact = inbox.current().expect("import delivered");
    assert_eq!(artifact.source, SourceTag::FileUpload);
    assert_eq!(artifact.kind, MediaKind::Image);
    assert_eq!(artifact.file_name, "evidence.png");

    Ok(())
}

#[tokio::test]
async fn test_import_from_disk_detects_video() -> Result<()> {
    // Setup: Create a small MP4 file on disk
    let temp_dir = tempfile::TempDir::new()?;
    let path = temp_dir.path().join("clip.mp4");
    std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42")?;

    let file = ImportedFile::open(&path).await?;
    assert_eq!(file.mime_type, "video/mp4");

    let mut session = CaptureSession::new(CaptureConfig::default(), Arc::new(SimulatedCamera::default()));
    session.import_file(file)?;

    let artifact = session.artifact().expect("artifact stored");
    assert_eq!(artifact.kind, MediaKind::Video);
    assert_eq!(artifact.source, SourceTag::FileUpload);

    Ok(())
}

#[tokio::test]
async fn test_import_rejects_unsupported_media() -> Result<()> {
    let mut session = CaptureSession::new(CaptureConfig::default(), Arc::new(SimulatedCamera::default()));

    let text = ImportedFile::new("notes.txt", "text/plain", b"hello".to_vec());
    assert!(matches!(session.import_file(text), Err(CaptureError::UnsupportedMedia(_))));

    let empty = ImportedFile::new("empty.jpg", "image/jpeg", Vec::new());
    assert!(matches!(session.import_file(empty), Err(CaptureError::UnsupportedMedia(_))));

    assert_eq!(session.state(), CaptureState::Idle);
    assert!(session.artifact().is_none());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retake_discards_artifact_and_reopens_camera() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, inbox) = session_with(&camera);

    session.acquire_camera(Facing::Rear).await?;
    session.wait_ready().await?;
    session.capture_photo()?;

    // Host keeps its own handle to the payload
    let held_by_host = inbox.current().expect("artifact delivered");
    let snapshot = held_by_host.payload().to_vec();

    session.retake().await?;

    // Verify: artifact gone, same camera live again
    assert!(session.artifact().is_none());
    assert_eq!(session.state(), CaptureState::Live);
    assert_eq!(session.facing(), Facing::Rear, "Retake reuses the last facing");
    assert_eq!(camera.ledger().live(), 1);

    let notifications = inbox.notifications();
    assert_eq!(notifications.len(), 2);
    assert!(notifications[1].is_none(), "Host is told the artifact was discarded");

    // The host's copy is untouched
    assert_eq!(held_by_host.payload(), snapshot.as_slice());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retake_clears_artifact_even_when_camera_fails() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::denying_all());
    let (mut session, inbox) = session_with(&camera);

    session.import_file(ImportedFile::new("a.jpg", "image/jpeg", vec![1, 2, 3]))?;
    assert_eq!(session.state(), CaptureState::Captured);

    let result = session.retake().await;

    // Verify: artifact cleared before the failed acquisition
    assert!(matches!(result, Err(CaptureError::AcquisitionDenied(_))));
    assert_eq!(session.state(), CaptureState::Error);
    assert!(session.artifact().is_none());
    assert!(inbox.current().is_none());

    // Retake is also how the host recovers from Error
    assert!(session.retake().await.is_err());
    assert_eq!(camera.requests().len(), 4);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retake_only_from_captured_or_error() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, _inbox) = session_with(&camera);

    assert!(matches!(
        session.retake().await,
        Err(CaptureError::InvalidState { state: CaptureState::Idle, .. })
    ));

    session.acquire_camera(Facing::Front).await?;
    assert!(matches!(
        session.retake().await,
        Err(CaptureError::InvalidState { state: CaptureState::Live, .. })
    ));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_audio_requested_only_for_video() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, _inbox) = session_with(&camera);

    session.acquire_camera(Facing::Front).await?;
    session.set_mode(CaptureMode::Video).await?;
    session.set_mode(CaptureMode::Photo).await?;

    let audio: Vec<bool> = camera.requests().iter().map(|r| r.audio).collect();
    assert_eq!(audio, vec![false, true, false]);
    assert_eq!(camera.ledger().peak(), 1);

    let request = &camera.requests()[0];
    assert_eq!((request.ideal_width, request.ideal_height), (1280, 720));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_release_during_acquisition_tears_down_new_stream() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::new(SimulatedCameraConfig {
        acquire_delay: Duration::from_millis(300),
        ..Default::default()
    }));
    let (mut session, _inbox) = session_with(&camera);
    let handle = session.release_handle();

    // Release arrives while the backend is still negotiating
    let (result, _) = tokio::join!(session.acquire_camera(Facing::Front), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.request_release();
    });

    // Verify: the late stream is stopped and the caller learns why
    assert_eq!(result, Err(CaptureError::Released));
    assert_eq!(camera.ledger().acquired(), 1, "Acquisition was allowed to complete");
    assert_eq!(camera.ledger().live(), 0, "New stream was torn down");
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(!session.holds_stream());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_release_request_survives_toggle() -> Result<()> {
    // Setup: live front camera, then the host asks for release
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, _inbox) = session_with(&camera);
    session.acquire_camera(Facing::Front).await?;
    session.release_handle().request_release();

    // A toggle issued afterwards must not reopen the camera
    assert_eq!(session.toggle_facing().await, Err(CaptureError::Released));

    // Verify: nothing is held and the request is not pending anymore
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(!session.holds_stream());
    assert_eq!(camera.ledger().live(), 0);
    assert_eq!(camera.ledger().acquired(), 1, "No new stream was requested");
    assert!(!session.pump().await);

    // The session is usable again once the host reacquires
    session.acquire_camera(Facing::Rear).await?;
    assert_eq!(session.state(), CaptureState::Live);
    assert_eq!(camera.ledger().live(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_release_request_blocks_photo_and_import() -> Result<()> {
    // Setup: ready camera with a pending release
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, inbox) = session_with(&camera);
    session.acquire_camera(Facing::Front).await?;
    session.wait_ready().await?;
    let handle = session.release_handle();
    handle.request_release();

    assert_eq!(session.capture_photo(), Err(CaptureError::Released));
    assert_eq!(camera.ledger().live(), 0);

    handle.request_release();
    let file = ImportedFile::new("late.jpg", "image/jpeg", vec![0xFF, 0xD8]);
    assert_eq!(session.import_file(file), Err(CaptureError::Released));

    // Verify: no artifact reached the host after teardown was requested
    assert_eq!(inbox.delivered(), 0);
    assert!(session.artifact().is_none());
    assert_eq!(session.state(), CaptureState::Idle);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_release_during_wait_ready() -> Result<()> {
    // Setup: slow first frame so the release lands mid-wait
    let camera = Arc::new(SimulatedCamera::new(SimulatedCameraConfig {
        first_frame_delay: Duration::from_millis(500),
        ..Default::default()
    }));
    let (mut session, _inbox) = session_with(&camera);
    session.acquire_camera(Facing::Front).await?;
    let handle = session.release_handle();

    let (result, _) = tokio::join!(session.wait_ready(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.request_release();
    });

    // Verify
    assert_eq!(result, Err(CaptureError::Released));
    assert!(!session.is_ready());
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(camera.ledger().live(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_stream() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());

    {
        let (mut session, _inbox) = session_with(&camera);
        session.acquire_camera(Facing::Front).await?;
        assert_eq!(camera.ledger().live(), 1);
    }

    assert_eq!(camera.ledger().live(), 0);

    Ok(())
}

struct BrokenEncoder;

impl FrameEncoder for BrokenEncoder {
    fn encode(&self, _frame: &Frame) -> Result<Vec<u8>> {
        anyhow::bail!("encoder out of memory")
    }

    fn mime_type(&self) -> &str {
        "image/jpeg"
    }

    fn file_name(&self) -> &str {
        "capture.jpg"
    }
}

#[tokio::test(start_paused = true)]
async fn test_encoding_failure_enters_error() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());
    let mut session = CaptureSession::new(CaptureConfig::default(), camera.clone()).with_encoder(BrokenEncoder);

    session.acquire_camera(Facing::Front).await?;
    session.wait_ready().await?;

    assert!(matches!(session.capture_photo(), Err(CaptureError::EncodingFailed(_))));
    assert_eq!(session.state(), CaptureState::Error);
    assert!(session.last_error().unwrap_or_default().contains("out of memory"));
    assert_eq!(camera.ledger().live(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_operations_rejected_outside_valid_states() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, _inbox) = session_with(&camera);

    assert!(matches!(session.capture_photo(), Err(CaptureError::InvalidState { .. })));
    assert_eq!(session.start_recording().await, Err(CaptureError::NoStream));
    assert!(session.wait_ready().await.is_err());

    session.acquire_camera(Facing::Front).await?;
    session.wait_ready().await?;
    assert!(
        matches!(session.start_recording().await, Err(CaptureError::InvalidState { .. })),
        "Recording requires video mode"
    );

    session.capture_photo()?;
    assert!(session.toggle_facing().await.is_err());
    assert!(session.acquire_camera(Facing::Rear).await.is_err());
    assert_eq!(session.state(), CaptureState::Captured);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_status_snapshot_serializes() -> Result<()> {
    let camera = Arc::new(SimulatedCamera::default());
    let (mut session, _inbox) = session_with(&camera);

    session.acquire_camera(Facing::Rear).await?;
    session.wait_ready().await?;
    session.capture_photo()?;

    // Verify: snapshot serializes with host-facing names
    let json = serde_json::to_value(session.status())?;
    assert_eq!(json["state"], "captured");
    assert_eq!(json["facing"], "rear");
    assert_eq!(json["artifact"]["source"], "rear-camera");
    assert_eq!(json["artifact"]["mime_type"], "image/jpeg");
    assert_eq!(json["max_duration_secs"], 15);

    Ok(())
}

#[test]
fn test_zero_cap_raised_to_one_second() {
    let config = CaptureConfig::default().with_max_duration(0);
    let session = CaptureSession::new(config, Arc::new(SimulatedCamera::default()));

    assert_eq!(session.max_duration_secs(), 1);
}
