//! MoodSoul Core - interaction engine for MoodSoul devices.
//!
//! Turns sensor events (touch, shake, flip, vibration while charging) into
//! network interactions: capture an image and/or a short audio clip, upload
//! them as `multipart/form-data`, and stream the spoken response back to a
//! playback sink while signalling progress to a display.
//!
//! # Architecture
//!
//! ```text
//! DeviceRuntime ──► TriggerDispatcher ──► InteractionMachine ──┬─► Peripherals (mic, camera)
//!   (tick loop)       (which event?)       (one at a time)      ├─► MultipartEncoder (plan)
//!                                                               └─► StreamingClient ──► PlaybackSink
//! ```
//!
//! - [`multipart`]: body layout computed up front, payloads never copied
//! - [`transport`]: one TCP session per interaction, chunked in both directions
//! - [`interaction`]: the `Idle → Capturing → Sending → AwaitingResponse → Playing` machine
//! - [`trigger`]: per-tick event selection with debounce and edge detection
//! - [`device`]: the cooperative loop tying it together
//! - [`state`]: configuration
//! - [`error`]: error types and their outcome mapping
//!
//! # Collaborator Traits
//!
//! Hardware is reached only through traits, so the engine runs unchanged on a
//! device, a bench simulator, or in tests:
//!
//! - [`AudioCapture`](peripherals::AudioCapture), [`Camera`](peripherals::Camera),
//!   [`SensorSource`](peripherals::SensorSource)
//! - [`PlaybackSink`](playback::PlaybackSink) for the response body
//! - [`Feedback`](feedback::Feedback) for status labels and orientation
//! - [`Connector`](transport::Connector) for the byte stream

#![warn(clippy::all)]

pub mod device;
pub mod error;
pub mod feedback;
pub mod interaction;
pub mod multipart;
pub mod peripherals;
pub mod playback;
pub mod protocol_constants;
pub mod state;
pub mod transport;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types at the crate root
pub use device::{DeviceRuntime, TickOutcome};
pub use error::{
    CaptureError, CaptureResult, ConfigError, ErrorCode, TransportError, TransportResult,
};
pub use feedback::{
    Feedback, FeedbackEvent, JsonLinesFeedback, LoggingFeedback, NoopFeedback, Orientation,
    UiStatus,
};
pub use interaction::{
    InteractionMachine, InteractionOutcome, InteractionReport, InteractionRequest,
    InteractionState,
};
pub use multipart::{MultipartEncoder, MultipartPlan, PayloadRef, PlanFields, Segment};
pub use peripherals::{
    AccelVector, AudioCapture, Camera, CapturedFrame, Peripherals, SensorReadings, SensorSource,
    TouchState,
};
pub use playback::{chunk_level, AmplitudeMeter, NullSink, PlaybackSink};
pub use state::{Config, EndpointConfig, FeedbackConfig, TriggerConfig};
pub use transport::{Connector, Payloads, StreamingClient, TcpConnector};
pub use trigger::{TriggerDecision, TriggerDispatcher, TriggerEvent};
