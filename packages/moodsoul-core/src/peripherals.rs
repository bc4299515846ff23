//! Hardware collaborator interfaces.
//!
//! The core never talks to drivers directly. Microphone, camera, sensors,
//! speaker and display are reached through the narrow traits in this module
//! (and [`PlaybackSink`] / [`Feedback`]), so the interaction engine can run
//! against real hardware, a bench simulator, or test fakes.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CaptureResult;
use crate::feedback::Feedback;
use crate::playback::PlaybackSink;

// ─────────────────────────────────────────────────────────────────────────────
// Audio Capture
// ─────────────────────────────────────────────────────────────────────────────

/// Microphone collaborator.
///
/// Drivers that expose a start/poll interface (`start_recording` followed by
/// `is_recording()` checks) hide the poll loop inside [`record`](Self::record);
/// the core only sees a single await point bounded by the record duration.
#[async_trait]
pub trait AudioCapture: Send {
    /// Records until `buffer` is full.
    ///
    /// # Arguments
    /// * `buffer` - Destination for 16-bit mono PCM; fully overwritten on success
    /// * `sample_rate` - Capture rate in Hz
    async fn record(&mut self, buffer: &mut [u8], sample_rate: u32) -> CaptureResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Camera
// ─────────────────────────────────────────────────────────────────────────────

/// Camera collaborator.
///
/// Every successful [`try_capture`](Self::try_capture) must be matched by
/// exactly one [`release`](Self::release). Use [`CapturedFrame::acquire`]
/// rather than calling these directly.
pub trait Camera: Send {
    /// Grabs a JPEG frame, or `None` if the camera is unavailable.
    fn try_capture(&mut self) -> Option<Bytes>;

    /// Returns the frame buffer to the driver.
    fn release(&mut self);
}

/// A captured frame that releases the camera when dropped.
pub struct CapturedFrame<'a> {
    camera: &'a mut dyn Camera,
    data: Bytes,
}

impl<'a> CapturedFrame<'a> {
    /// Captures a frame, returning `None` (and releasing nothing) on failure.
    pub fn acquire(camera: &'a mut dyn Camera) -> Option<Self> {
        let data = camera.try_capture()?;
        Some(Self { camera, data })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for CapturedFrame<'_> {
    fn drop(&mut self) {
        self.camera.release();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sensors
// ─────────────────────────────────────────────────────────────────────────────

/// Accelerometer reading in g.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccelVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccelVector {
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Device lying flat, screen up.
    #[must_use]
    pub fn resting() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

/// Touch edges observed since the previous reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchState {
    pub was_pressed: bool,
    pub was_released: bool,
}

/// One snapshot of every sensor the dispatcher consults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReadings {
    pub accel: AccelVector,
    pub touch: TouchState,
    /// Battery charge in percent, `None` when unknown.
    pub battery_percent: Option<u8>,
    pub charging: bool,
}

impl Default for SensorReadings {
    fn default() -> Self {
        Self {
            accel: AccelVector::resting(),
            touch: TouchState::default(),
            battery_percent: None,
            charging: false,
        }
    }
}

/// IMU, touch panel and power management, read once per tick.
pub trait SensorSource: Send {
    fn read(&mut self) -> SensorReadings;
}

// ─────────────────────────────────────────────────────────────────────────────
// Peripheral Set
// ─────────────────────────────────────────────────────────────────────────────

/// All collaborators one device needs, owned by the device runtime.
pub struct Peripherals {
    pub sensors: Box<dyn SensorSource>,
    pub microphone: Box<dyn AudioCapture>,
    pub camera: Box<dyn Camera>,
    pub speaker: Box<dyn PlaybackSink>,
    pub feedback: Arc<dyn Feedback>,
}
