// In-process camera used by the CLI driver and the test suite.
//
// Behaves like a browser media device: acquisition can be denied per facing
// direction, the first frame arrives after a configurable delay, and the
// recorder emits chunks on a fixed cadence until stopped.

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backend::{CameraBackend, Facing, Frame, MediaChunk, MediaRecorder, MediaStream, StreamRequest};

/// EBML magic that opens every WebM container
const WEBM_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Accounting of device streams handed out by a backend
#[derive(Debug, Default)]
pub struct StreamLedger {
    live: AtomicUsize,
    peak: AtomicUsize,
    acquired: AtomicUsize,
}

impl StreamLedger {
    /// Streams currently holding device tracks
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live streams ever observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Total successful acquisitions
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    fn open(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Configuration for the simulated camera
#[derive(Debug, Clone)]
pub struct SimulatedCameraConfig {
    /// Facing directions whose acquisition is refused
    pub denied: HashSet<Facing>,
    /// Time from acquisition to the first rendered frame
    pub first_frame_delay: Duration,
    /// Time spent negotiating the device before `acquire` returns
    pub acquire_delay: Duration,
    /// Cadence of recorder data callbacks
    pub chunk_interval: Duration,
    /// Native frame size (the ideal size in the request is ignored)
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for SimulatedCameraConfig {
    fn default() -> Self {
        Self {
            denied: HashSet::new(),
            first_frame_delay: Duration::from_millis(100),
            acquire_delay: Duration::ZERO,
            chunk_interval: Duration::from_millis(250),
            frame_width: 64,
            frame_height: 48,
        }
    }
}

/// Simulated camera backend
pub struct SimulatedCamera {
    config: SimulatedCameraConfig,
    ledger: Arc<StreamLedger>,
    requests: Mutex<Vec<StreamRequest>>,
}

impl SimulatedCamera {
    pub fn new(config: SimulatedCameraConfig) -> Self {
        Self {
            config,
            ledger: Arc::new(StreamLedger::default()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Camera that refuses every facing direction
    pub fn denying_all() -> Self {
        Self::new(SimulatedCameraConfig {
            denied: [Facing::Front, Facing::Rear].into_iter().collect(),
            ..Default::default()
        })
    }

    pub fn ledger(&self) -> Arc<StreamLedger> {
        Arc::clone(&self.ledger)
    }

    /// Every acquisition request received so far, in order
    pub fn requests(&self) -> Vec<StreamRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new(SimulatedCameraConfig::default())
    }
}

#[async_trait::async_trait]
impl CameraBackend for SimulatedCamera {
    async fn acquire(&self, request: &StreamRequest) -> Result<Box<dyn MediaStream>> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        if !self.config.acquire_delay.is_zero() {
            tokio::time::sleep(self.config.acquire_delay).await;
        }

        if self.config.denied.contains(&request.facing) {
            bail!("Permission denied for {} camera", request.facing);
        }

        self.ledger.open();
        info!(
            "Simulated {} camera acquired (audio={}, live={})",
            request.facing,
            request.audio,
            self.ledger.live()
        );

        Ok(Box::new(SimulatedStream {
            facing: request.facing,
            audio: request.audio,
            ready_at: Instant::now() + self.config.first_frame_delay,
            width: self.config.frame_width,
            height: self.config.frame_height,
            chunk_interval: self.config.chunk_interval,
            active: Arc::new(AtomicBool::new(true)),
            ledger: Arc::clone(&self.ledger),
        }))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

struct SimulatedStream {
    facing: Facing,
    audio: bool,
    ready_at: Instant,
    width: u32,
    height: u32,
    chunk_interval: Duration,
    active: Arc<AtomicBool>,
    ledger: Arc<StreamLedger>,
}

#[async_trait::async_trait]
impl MediaStream for SimulatedStream {
    fn facing(&self) -> Facing {
        self.facing
    }

    fn has_audio(&self) -> bool {
        self.audio
    }

    async fn ready(&mut self) -> Result<()> {
        tokio::time::sleep_until(self.ready_at).await;
        if !self.is_active() {
            bail!("Stream stopped before first frame");
        }
        Ok(())
    }

    fn current_frame(&self) -> Frame {
        if !self.is_active() || Instant::now() < self.ready_at {
            return Frame::empty();
        }

        // Diagonal gradient, tinted per facing so captures are distinguishable
        let tint = match self.facing {
            Facing::Front => 0u8,
            Facing::Rear => 128u8,
        };
        let mut rgb = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                rgb.push(((x * 255) / self.width.max(1)) as u8);
                rgb.push(((y * 255) / self.height.max(1)) as u8);
                rgb.push(tint);
            }
        }

        Frame {
            width: self.width,
            height: self.height,
            rgb,
        }
    }

    fn recorder(&mut self) -> Result<Box<dyn MediaRecorder>> {
        if !self.is_active() {
            bail!("Cannot record from a stopped stream");
        }
        Ok(Box::new(SimulatedRecorder {
            interval: self.chunk_interval,
            stream_active: Arc::clone(&self.active),
            stop_tx: None,
        }))
    }

    fn stop(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.ledger.close();
            debug!("Simulated {} camera tracks stopped", self.facing);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        if self.is_active() {
            warn!("Simulated {} stream dropped without stop", self.facing);
            self.stop();
        }
    }
}

struct SimulatedRecorder {
    interval: Duration,
    stream_active: Arc<AtomicBool>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl MediaRecorder for SimulatedRecorder {
    fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>> {
        if self.stop_tx.is_some() {
            bail!("Recorder already started");
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let period = self.interval;
        let stream_active = Arc::clone(&self.stream_active);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            let mut sequence = 0u64;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !stream_active.load(Ordering::SeqCst) {
                            break;
                        }
                        if chunk_tx.send(simulated_chunk(sequence)).await.is_err() {
                            break;
                        }
                        sequence += 1;
                    }
                    _ = &mut stop_rx => {
                        // Flush the partially filled buffer, then close the channel
                        let _ = chunk_tx.send(simulated_chunk(sequence)).await;
                        break;
                    }
                }
            }
        });

        Ok(chunk_rx)
    }

    fn stop(&mut self) -> Result<()> {
        match self.stop_tx.take() {
            Some(tx) => {
                let _ = tx.send(());
                Ok(())
            }
            None => bail!("Recorder not started"),
        }
    }

    fn mime_type(&self) -> &str {
        "video/webm"
    }
}

fn simulated_chunk(sequence: u64) -> MediaChunk {
    let mut data = Vec::new();
    if sequence == 0 {
        data.extend_from_slice(&WEBM_MAGIC);
    }
    data.extend_from_slice(format!("cluster-{:04};", sequence).as_bytes());
    MediaChunk { sequence, data }
}
