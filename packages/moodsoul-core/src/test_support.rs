//! Shared fakes for unit tests.
//!
//! Hardware collaborators, sinks, connectors and a one-shot HTTP server
//! that records the request it receives.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::{CaptureError, CaptureResult};
use crate::feedback::{Feedback, FeedbackEvent, Orientation, UiStatus};
use crate::peripherals::{AudioCapture, Camera, Peripherals, SensorReadings, SensorSource};
use crate::playback::PlaybackSink;
use crate::transport::Connector;

// ─────────────────────────────────────────────────────────────────────────────
// Peripherals
// ─────────────────────────────────────────────────────────────────────────────

/// Camera with a fixed frame and a shared release counter.
pub struct FakeCamera {
    frame: Option<Bytes>,
    pub releases: Arc<Mutex<usize>>,
}

impl FakeCamera {
    pub fn with_frame(frame: Vec<u8>) -> Self {
        Self {
            frame: Some(Bytes::from(frame)),
            releases: Arc::default(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            frame: None,
            releases: Arc::default(),
        }
    }
}

impl Camera for FakeCamera {
    fn try_capture(&mut self) -> Option<Bytes> {
        self.frame.clone()
    }

    fn release(&mut self) {
        *self.releases.lock() += 1;
    }
}

/// Microphone that fills the buffer with one byte value, or always fails.
#[derive(Clone)]
pub struct FakeMicrophone {
    fill: Option<u8>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeMicrophone {
    pub fn filling(value: u8) -> Self {
        Self {
            fill: Some(value),
            calls: Arc::default(),
        }
    }

    pub fn broken() -> Self {
        Self {
            fill: None,
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl AudioCapture for FakeMicrophone {
    async fn record(&mut self, buffer: &mut [u8], _sample_rate: u32) -> CaptureResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fill {
            Some(value) => {
                buffer.fill(value);
                Ok(())
            }
            None => Err(CaptureError::Microphone("i2s read failed".into())),
        }
    }
}

/// Returns queued readings in order, then resting readings forever.
pub struct ScriptedSensors {
    queue: VecDeque<SensorReadings>,
}

impl ScriptedSensors {
    pub fn new(readings: Vec<SensorReadings>) -> Self {
        Self {
            queue: readings.into(),
        }
    }
}

impl SensorSource for ScriptedSensors {
    fn read(&mut self) -> SensorReadings {
        self.queue.pop_front().unwrap_or_default()
    }
}

pub fn peripherals(
    microphone: FakeMicrophone,
    camera: FakeCamera,
    speaker: SharedSink,
    feedback: Arc<RecordingFeedback>,
) -> Peripherals {
    peripherals_with_sensors(
        ScriptedSensors::new(Vec::new()),
        microphone,
        camera,
        speaker,
        feedback,
    )
}

pub fn peripherals_with_sensors(
    sensors: ScriptedSensors,
    microphone: FakeMicrophone,
    camera: FakeCamera,
    speaker: SharedSink,
    feedback: Arc<RecordingFeedback>,
) -> Peripherals {
    Peripherals {
        sensors: Box::new(sensors),
        microphone: Box::new(microphone),
        camera: Box::new(camera),
        speaker: Box::new(speaker),
        feedback,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feedback & Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Records every feedback event.
#[derive(Default)]
pub struct RecordingFeedback {
    events: Mutex<Vec<FeedbackEvent>>,
}

impl RecordingFeedback {
    pub fn statuses(&self) -> Vec<UiStatus> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                FeedbackEvent::Status { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    pub fn orientations(&self) -> Vec<Orientation> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                FeedbackEvent::Orientation { orientation } => Some(*orientation),
                _ => None,
            })
            .collect()
    }

    pub fn mouth_levels(&self) -> Vec<u8> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                FeedbackEvent::MouthLevel { level } => Some(*level),
                _ => None,
            })
            .collect()
    }
}

impl Feedback for RecordingFeedback {
    fn show(&self, status: UiStatus) {
        self.events.lock().push(FeedbackEvent::Status {
            status,
            label: status.label(),
        });
    }

    fn set_orientation(&self, orientation: Orientation) {
        self.events
            .lock()
            .push(FeedbackEvent::Orientation { orientation });
    }

    fn mouth_level(&self, level: u8) {
        self.events.lock().push(FeedbackEvent::MouthLevel { level });
    }
}

/// Cloneable sink; every clone sees the same bytes.
#[derive(Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl PlaybackSink for SharedSink {
    fn on_chunk(&mut self, chunk: &[u8]) {
        self.0.lock().extend_from_slice(chunk);
    }
}

/// Keeps every chunk separately.
#[derive(Default)]
pub struct ChunkRecorder {
    pub chunks: Vec<Vec<u8>>,
    pub ended: bool,
}

impl ChunkRecorder {
    pub fn lengths(&self) -> Vec<usize> {
        self.chunks.iter().map(Vec::len).collect()
    }
}

impl PlaybackSink for ChunkRecorder {
    fn on_chunk(&mut self, chunk: &[u8]) {
        self.chunks.push(chunk.to_vec());
    }

    fn on_end(&mut self) {
        self.ended = true;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streams & Connectors
// ─────────────────────────────────────────────────────────────────────────────

/// Writer that records the data and the largest single write.
#[derive(Default)]
pub struct CountingWriter {
    pub data: Vec<u8>,
    pub max_write: usize,
}

impl AsyncWrite for CountingWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.max_write = self.max_write.max(buf.len());
        self.data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Stream whose writes fail with a connection reset.
pub struct ResetStream;

impl AsyncRead for ResetStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ResetStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

enum FailMode {
    Refuse,
    ResetWrites,
}

/// Connector that never yields a working stream.
pub struct FailingConnector {
    mode: FailMode,
    pub attempts: Arc<AtomicUsize>,
}

impl FailingConnector {
    pub fn refusing() -> Self {
        Self {
            mode: FailMode::Refuse,
            attempts: Arc::default(),
        }
    }

    pub fn resetting_writes() -> Self {
        Self {
            mode: FailMode::ResetWrites,
            attempts: Arc::default(),
        }
    }
}

#[async_trait]
impl Connector for FailingConnector {
    type Stream = ResetStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<ResetStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            FailMode::Refuse => Err(io::ErrorKind::ConnectionRefused.into()),
            FailMode::ResetWrites => Ok(ResetStream),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fake Server
// ─────────────────────────────────────────────────────────────────────────────

/// One-shot HTTP server on 127.0.0.1 that captures the raw request.
pub struct ScriptedServer {
    port: u16,
    request: oneshot::Receiver<Vec<u8>>,
    closed: oneshot::Receiver<()>,
}

impl ScriptedServer {
    /// Reads the request, writes `response` verbatim, then closes.
    pub async fn replying(response: Vec<u8>) -> Self {
        Self::start(Some(response)).await
    }

    /// Reads the request and never answers; holds the socket until the
    /// client goes away, which [`peer_closed`](Self::peer_closed) reports.
    pub async fn silent() -> Self {
        Self::start(None).await
    }

    async fn start(response: Option<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel();
        let (closed_tx, closed_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let _ = tx.send(request);

            match response {
                Some(bytes) => {
                    let _ = socket.write_all(&bytes).await;
                    let _ = socket.shutdown().await;
                }
                None => {
                    let mut buf = [0u8; 256];
                    while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
                    let _ = closed_tx.send(());
                }
            }
        });

        Self {
            port,
            request: rx,
            closed: closed_rx,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether a silent server saw the client close its socket.
    pub async fn peer_closed(self) -> bool {
        self.closed.await.is_ok()
    }

    /// The raw request (head + body) the server received.
    pub async fn request(self) -> Vec<u8> {
        self.request.await.unwrap()
    }
}

/// Reads a request head and a `Content-Length` body.
async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = reader.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before finishing the request head");
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let content_length: usize = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())
                .flatten()
        })
        .unwrap_or(0);

    while data.len() < head_end + content_length {
        let n = reader.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    data
}
