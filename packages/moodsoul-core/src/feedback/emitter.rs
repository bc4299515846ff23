//! Feedback collaborator abstraction.
//!
//! The interaction engine depends on the [`Feedback`] trait rather than a
//! concrete display, enabling headless runs and test recording.

use std::io::Write;

use parking_lot::Mutex;

use super::{FeedbackEvent, Orientation, UiStatus};

/// Trait for presenting device state without knowledge of the display.
///
/// # Example
///
/// ```ignore
/// struct Lcd { /* driver handle */ }
///
/// impl Feedback for Lcd {
///     fn show(&self, status: UiStatus) {
///         self.draw_icon(status.label());
///     }
///     fn set_orientation(&self, orientation: Orientation) {
///         self.rotate(orientation);
///     }
/// }
/// ```
pub trait Feedback: Send + Sync {
    /// Shows a status label.
    fn show(&self, status: UiStatus);

    /// Rotates the display.
    fn set_orientation(&self, orientation: Orientation);

    /// Updates the speaking animation (0-100). Optional.
    fn mouth_level(&self, _level: u8) {}
}

/// No-op feedback for headless use or testing.
pub struct NoopFeedback;

impl Feedback for NoopFeedback {
    fn show(&self, _status: UiStatus) {}

    fn set_orientation(&self, _orientation: Orientation) {}
}

/// Logging feedback for debugging and development.
///
/// Logs every status at debug level.
pub struct LoggingFeedback;

impl Feedback for LoggingFeedback {
    fn show(&self, status: UiStatus) {
        log::debug!("[Feedback] status={:?} label={:?}", status, status.label());
    }

    fn set_orientation(&self, orientation: Orientation) {
        log::debug!("[Feedback] orientation={:?}", orientation);
    }

    fn mouth_level(&self, level: u8) {
        log::trace!("[Feedback] mouth={}", level);
    }
}

/// Writes one JSON object per feedback event to any writer.
///
/// Bench setups pipe this into a UI process that draws the device screen.
pub struct JsonLinesFeedback<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesFeedback<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consumes the emitter and returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, event: &FeedbackEvent) {
        let mut out = self.out.lock();
        let written = serde_json::to_writer(&mut *out, event)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            log::warn!("[Feedback] Failed to write event: {}", e);
        }
    }
}

impl<W: Write + Send> Feedback for JsonLinesFeedback<W> {
    fn show(&self, status: UiStatus) {
        self.emit(&FeedbackEvent::Status {
            status,
            label: status.label(),
        });
    }

    fn set_orientation(&self, orientation: Orientation) {
        self.emit(&FeedbackEvent::Orientation { orientation });
    }

    fn mouth_level(&self, level: u8) {
        self.emit(&FeedbackEvent::MouthLevel { level });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_writes_one_object_per_event() {
        let feedback = JsonLinesFeedback::new(Vec::new());
        feedback.show(UiStatus::Speaking);
        feedback.set_orientation(Orientation::Inverted);
        feedback.mouth_level(42);

        let out = String::from_utf8(feedback.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            [
                r#"{"type":"status","status":"speaking","label":"Speaking..."}"#,
                r#"{"type":"orientation","orientation":"inverted"}"#,
                r#"{"type":"mouthLevel","level":42}"#,
            ]
        );
    }
}
