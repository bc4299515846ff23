//! Operator feedback: the closed set of statuses the core can signal.
//!
//! This module provides:
//! - [`UiStatus`], every label the display layer must be able to show
//! - [`Feedback`] trait implemented by display/speaker collaborators
//! - Ready-made emitters (no-op, logging, JSON lines)
//!
//! The core never renders anything itself; it only names states.

mod emitter;

pub use emitter::{Feedback, JsonLinesFeedback, LoggingFeedback, NoopFeedback};

use serde::Serialize;

use crate::error::CaptureError;
use crate::interaction::InteractionOutcome;

/// Status labels surfaced to the display collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UiStatus {
    /// Idle, waiting for a touch.
    Ready,
    /// A touch press was registered (chirp + ring).
    TouchAck,
    /// Recording the user's voice.
    Listening,
    /// Capturing the camera frame / preparing the upload.
    Thinking,
    /// Opening the connection.
    Connecting,
    /// Writing the request.
    Sending,
    /// Playing back the response.
    Speaking,
    /// Reacting to a shake.
    Dizzy,
    /// Battery below the low-battery threshold.
    LowBattery,
    ConnectFailed,
    Timeout,
    WriteFailed,
    CameraFailed,
    MicrophoneFailed,
}

impl UiStatus {
    /// Short on-screen label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "Touch Me",
            Self::TouchAck => "",
            Self::Listening => "Listening...",
            Self::Thinking => "Thinking...",
            Self::Connecting => "Connecting...",
            Self::Sending => "Sending...",
            Self::Speaking => "Speaking...",
            Self::Dizzy => "DIZZY!",
            Self::LowBattery => "LOW BATT",
            Self::ConnectFailed => "Conn Fail",
            Self::Timeout => "Timeout",
            Self::WriteFailed => "Send Fail",
            Self::CameraFailed => "Cam Fail",
            Self::MicrophoneFailed => "Mic Fail",
        }
    }

    /// Whether this status reports a failed interaction.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::ConnectFailed
                | Self::Timeout
                | Self::WriteFailed
                | Self::CameraFailed
                | Self::MicrophoneFailed
        )
    }

    /// Failure label for a transport outcome, `None` on success.
    #[must_use]
    pub fn for_outcome(outcome: InteractionOutcome) -> Option<Self> {
        match outcome {
            InteractionOutcome::Success => None,
            InteractionOutcome::ConnectFailure => Some(Self::ConnectFailed),
            InteractionOutcome::HeaderTimeout => Some(Self::Timeout),
            InteractionOutcome::WriteFailure => Some(Self::WriteFailed),
        }
    }

    /// Failure label for a capture error.
    #[must_use]
    pub fn for_capture_error(err: &CaptureError) -> Self {
        match err {
            CaptureError::CameraUnavailable => Self::CameraFailed,
            CaptureError::Microphone(_) => Self::MicrophoneFailed,
        }
    }
}

/// Display orientation, flipped while the device is upside down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Normal,
    Inverted,
}

/// Everything a feedback collaborator may be asked to present.
///
/// Used by [`JsonLinesFeedback`] as its wire record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeedbackEvent {
    Status { status: UiStatus, label: &'static str },
    Orientation { orientation: Orientation },
    MouthLevel { level: u8 },
}
