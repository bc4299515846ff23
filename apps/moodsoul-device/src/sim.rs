//! Simulated peripherals for bench runs.
//!
//! Gestures are typed on stdin, the microphone produces a tone, the camera
//! serves a file, and responses are optionally saved to disk.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use moodsoul_core::{
    AccelVector, AudioCapture, Camera, CaptureError, CaptureResult, PlaybackSink, SensorReadings,
    SensorSource, TouchState,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ─────────────────────────────────────────────────────────────────────────────
// Console Sensors
// ─────────────────────────────────────────────────────────────────────────────

/// A line typed on the bench console.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Press and release the touch panel.
    Touch,
    /// One reading over the shake threshold.
    Shake,
    /// Turn the device upside down.
    Flip,
    /// Turn it back upright.
    Unflip,
    /// Start or stop charging.
    Charging(bool),
    /// Lateral vibration for the given duration.
    Buzz(Duration),
    /// Report this battery level.
    Battery(u8),
    Quit,
}

pub const HELP: &str = "commands: touch | shake | flip | unflip | charge on|off | buzz <secs> | battery <pct> | quit";

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = words.next().ok_or_else(|| "empty command".to_string())?;
        let arg = words.next();

        let parsed = match (cmd.to_ascii_lowercase().as_str(), arg) {
            ("touch", None) => Self::Touch,
            ("shake", None) => Self::Shake,
            ("flip", None) => Self::Flip,
            ("unflip", None) => Self::Unflip,
            ("charge", Some("on")) => Self::Charging(true),
            ("charge", Some("off")) => Self::Charging(false),
            ("buzz", Some(secs)) => {
                let secs: f32 = secs.parse().map_err(|_| format!("bad duration: {secs}"))?;
                if !(secs > 0.0 && secs <= 600.0) {
                    return Err(format!("duration out of range: {secs}"));
                }
                Self::Buzz(Duration::from_secs_f32(secs))
            }
            ("battery", Some(pct)) => {
                let pct: u8 = pct.parse().map_err(|_| format!("bad percentage: {pct}"))?;
                Self::Battery(pct.min(100))
            }
            ("quit" | "exit", None) => Self::Quit,
            _ => return Err(format!("unknown command: {}", line.trim())),
        };

        if words.next().is_some() {
            return Err(format!("too many arguments: {}", line.trim()));
        }
        Ok(parsed)
    }
}

/// Reads commands from stdin until EOF or cancellation.
///
/// The stdin read itself runs on the blocking pool and is not interrupted by
/// cancellation; the runtime must be shut down with a timeout afterwards.
pub async fn read_console(commands: mpsc::UnboundedSender<Command>, cancel: CancellationToken) {
    log::info!("[Console] {}", HELP);
    read_commands(BufReader::new(tokio::io::stdin()), commands, cancel).await;
}

/// Parses one command per line from `input` until EOF, `quit` or
/// cancellation. A pending read never delays cancellation.
pub async fn read_commands<R>(
    input: R,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::info!("[Console] stdin closed; gestures disabled");
                break;
            }
            Err(e) => {
                log::warn!("[Console] Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::Quit) => {
                cancel.cancel();
                break;
            }
            Ok(cmd) => {
                if commands.send(cmd).is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("[Console] {} ({})", e, HELP),
        }
    }
}

/// Sensor source driven by console commands.
///
/// Edges (touch, shake) last for one reading; orientation, charging,
/// battery and vibration persist until changed.
pub struct ConsoleSensors {
    commands: mpsc::UnboundedReceiver<Command>,
    touches: VecDeque<TouchState>,
    shake_pending: bool,
    upside_down: bool,
    charging: bool,
    battery: Option<u8>,
    buzz_until: Option<Instant>,
}

impl ConsoleSensors {
    pub fn new(commands: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            commands,
            touches: VecDeque::new(),
            shake_pending: false,
            upside_down: false,
            charging: false,
            battery: None,
            buzz_until: None,
        }
    }

    fn apply(&mut self, cmd: Command) {
        log::debug!("[Console] {:?}", cmd);
        match cmd {
            Command::Touch => {
                self.touches.push_back(TouchState {
                    was_pressed: true,
                    was_released: false,
                });
                self.touches.push_back(TouchState {
                    was_pressed: false,
                    was_released: true,
                });
            }
            Command::Shake => self.shake_pending = true,
            Command::Flip => self.upside_down = true,
            Command::Unflip => self.upside_down = false,
            Command::Charging(on) => self.charging = on,
            Command::Buzz(duration) => self.buzz_until = Some(Instant::now() + duration),
            Command::Battery(pct) => self.battery = Some(pct),
            Command::Quit => {}
        }
    }
}

impl SensorSource for ConsoleSensors {
    fn read(&mut self) -> SensorReadings {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply(cmd);
        }

        let buzzing = self.buzz_until.is_some_and(|until| Instant::now() < until);
        let x = if std::mem::take(&mut self.shake_pending) {
            3.0
        } else {
            0.0
        };
        let y = if buzzing { 1.5 } else { 0.0 };
        let z = if self.upside_down { -1.0 } else { 1.0 };

        SensorReadings {
            accel: AccelVector::new(x, y, z),
            touch: self.touches.pop_front().unwrap_or_default(),
            battery_percent: self.battery,
            charging: self.charging,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Microphone
// ─────────────────────────────────────────────────────────────────────────────

/// Records a sine tone in real time.
pub struct ToneMicrophone {
    frequency_hz: f32,
    amplitude: i16,
}

impl ToneMicrophone {
    pub fn new(frequency_hz: f32) -> Self {
        Self {
            frequency_hz,
            amplitude: i16::MAX / 4,
        }
    }

    /// 16-bit little-endian mono samples filling `len` bytes.
    fn samples(&self, len: usize, sample_rate: u32) -> Vec<i16> {
        let step = std::f32::consts::TAU * self.frequency_hz / sample_rate as f32;
        (0..len / 2)
            .map(|n| {
                let s = (step * n as f32).sin() * f32::from(self.amplitude);
                (s as i16).to_le()
            })
            .collect()
    }
}

#[async_trait]
impl AudioCapture for ToneMicrophone {
    async fn record(&mut self, buffer: &mut [u8], sample_rate: u32) -> CaptureResult<()> {
        if sample_rate == 0 {
            return Err(CaptureError::Microphone("sample rate is zero".into()));
        }
        let samples = self.samples(buffer.len(), sample_rate);
        let bytes: &[u8] = bytemuck::cast_slice(&samples);
        buffer[..bytes.len()].copy_from_slice(bytes);
        buffer[bytes.len()..].fill(0);

        // Capture takes as long as the clip it produces
        let secs = samples.len() as f64 / f64::from(sample_rate);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Camera
// ─────────────────────────────────────────────────────────────────────────────

/// Smallest well-formed JPEG marker pair (SOI, EOI).
const PLACEHOLDER_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];

/// Serves a JPEG read from disk on every capture.
pub struct FileCamera {
    path: Option<PathBuf>,
    outstanding: bool,
}

impl FileCamera {
    /// `None` serves a placeholder frame.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            outstanding: false,
        }
    }
}

impl Camera for FileCamera {
    fn try_capture(&mut self) -> Option<Bytes> {
        let frame = match &self.path {
            Some(path) => match std::fs::read(path) {
                Ok(data) if !data.is_empty() => Bytes::from(data),
                Ok(_) => {
                    log::warn!("[Camera] {} is empty", path.display());
                    return None;
                }
                Err(e) => {
                    log::warn!("[Camera] Failed to read {}: {}", path.display(), e);
                    return None;
                }
            },
            None => Bytes::from_static(PLACEHOLDER_JPEG),
        };
        self.outstanding = true;
        Some(frame)
    }

    fn release(&mut self) {
        if !self.outstanding {
            log::warn!("[Camera] Release without capture");
        }
        self.outstanding = false;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Recorder
// ─────────────────────────────────────────────────────────────────────────────

/// Saves each response body to `response-<n>.bin` in a directory.
pub struct ResponseRecorder {
    dir: PathBuf,
    next_index: u32,
    current: Option<(File, PathBuf, usize)>,
}

impl ResponseRecorder {
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            next_index: 1,
            current: None,
        })
    }

    fn open_next(&mut self) -> Option<(File, PathBuf, usize)> {
        let path = self.dir.join(format!("response-{}.bin", self.next_index));
        self.next_index += 1;
        match File::create(&path) {
            Ok(file) => Some((file, path, 0)),
            Err(e) => {
                log::warn!("[Recorder] Failed to create {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl PlaybackSink for ResponseRecorder {
    fn on_chunk(&mut self, chunk: &[u8]) {
        if self.current.is_none() {
            self.current = self.open_next();
        }
        if let Some((file, path, written)) = self.current.as_mut() {
            match file.write_all(chunk) {
                Ok(()) => *written += chunk.len(),
                Err(e) => {
                    log::warn!("[Recorder] Write to {} failed: {}", path.display(), e);
                    self.current = None;
                }
            }
        }
    }

    fn on_end(&mut self) {
        if let Some((_, path, written)) = self.current.take() {
            log::info!("[Recorder] Saved {} bytes to {}", written, path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn parses_commands() {
        assert_eq!("touch".parse::<Command>(), Ok(Command::Touch));
        assert_eq!(" Shake ".parse::<Command>(), Ok(Command::Shake));
        assert_eq!("charge on".parse::<Command>(), Ok(Command::Charging(true)));
        assert_eq!(
            "buzz 2.5".parse::<Command>(),
            Ok(Command::Buzz(Duration::from_millis(2500)))
        );
        assert_eq!("battery 250".parse::<Command>(), Ok(Command::Battery(100)));
        assert!("buzz".parse::<Command>().is_err());
        assert!("buzz -1".parse::<Command>().is_err());
        assert!("touch twice".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn touch_spans_two_readings() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sensors = ConsoleSensors::new(rx);
        tx.send(Command::Touch).unwrap();

        let first = sensors.read();
        assert!(first.touch.was_pressed && !first.touch.was_released);
        let second = sensors.read();
        assert!(second.touch.was_released);
        assert_eq!(sensors.read().touch, TouchState::default());
    }

    #[test]
    fn shake_is_one_reading_and_flip_persists() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sensors = ConsoleSensors::new(rx);
        tx.send(Command::Shake).unwrap();
        tx.send(Command::Flip).unwrap();

        let first = sensors.read();
        assert_eq!(first.accel, AccelVector::new(3.0, 0.0, -1.0));
        let second = sensors.read();
        assert_eq!(second.accel, AccelVector::new(0.0, 0.0, -1.0));

        tx.send(Command::Unflip).unwrap();
        tx.send(Command::Battery(15)).unwrap();
        let third = sensors.read();
        assert_eq!(third.accel.z, 1.0);
        assert_eq!(third.battery_percent, Some(15));
    }

    #[tokio::test]
    async fn cancel_interrupts_a_pending_console_read() {
        // The writer half stays open, so the next read never completes
        let (input, mut typist) = tokio::io::duplex(256);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let reader = tokio::spawn(read_commands(BufReader::new(input), tx, cancel.clone()));
        typist.write_all(b"touch\n").await.unwrap();
        assert_eq!(rx.recv().await, Some(Command::Touch));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("console reader ignored cancellation")
            .unwrap();
        drop(typist);
    }

    #[tokio::test]
    async fn quit_cancels_the_device() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        read_commands(&b"shake\nbogus\n\nquit\ntouch\n"[..], tx, cancel.clone()).await;

        assert!(cancel.is_cancelled());
        assert_eq!(rx.recv().await, Some(Command::Shake));
        // Nothing after `quit` is forwarded
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn tone_fills_buffer_in_real_time() {
        let mut mic = ToneMicrophone::new(440.0);
        let mut buffer = vec![0xAAu8; 32_000];
        let started = Instant::now();
        mic.record(&mut buffer, 16_000).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(buffer.iter().any(|&b| b != 0));
        assert!(!buffer.iter().all(|&b| b == 0xAA));
        // First sample is sin(0) = 0
        assert_eq!(&buffer[..2], &[0, 0]);
    }

    #[test]
    fn camera_reads_file_or_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 1, 2, 0xFF, 0xD9]).unwrap();

        let mut camera = FileCamera::new(Some(path.clone()));
        assert_eq!(camera.try_capture().map(|b| b.len()), Some(6));
        camera.release();

        let mut missing = FileCamera::new(Some(dir.path().join("nope.jpg")));
        assert!(missing.try_capture().is_none());

        let mut placeholder = FileCamera::new(None);
        assert_eq!(
            placeholder.try_capture().as_deref(),
            Some(PLACEHOLDER_JPEG)
        );
    }

    #[test]
    fn recorder_writes_one_file_per_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = ResponseRecorder::new(dir.path()).unwrap();

        recorder.on_chunk(b"abc");
        recorder.on_chunk(b"def");
        recorder.on_end();
        recorder.on_chunk(b"xyz");
        recorder.on_end();
        // An empty response creates no file
        recorder.on_end();

        assert_eq!(std::fs::read(dir.path().join("response-1.bin")).unwrap(), b"abcdef");
        assert_eq!(std::fs::read(dir.path().join("response-2.bin")).unwrap(), b"xyz");
        assert!(!dir.path().join("response-3.bin").exists());
    }
}
