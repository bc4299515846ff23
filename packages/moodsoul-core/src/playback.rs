//! Playback sinks for the streamed response body.
//!
//! The core does not decode audio. It delivers every response chunk, in
//! order, to a [`PlaybackSink`]; decoding and rendering belong to the sink.

use std::sync::Arc;

use crate::feedback::Feedback;

/// Receives response body chunks in arrival order.
pub trait PlaybackSink: Send {
    /// Called once per received chunk. Never called with an empty slice.
    fn on_chunk(&mut self, chunk: &[u8]);

    /// Called once when the response stream has ended. Optional.
    fn on_end(&mut self) {}
}

/// Collects the whole response in memory. Intended for tests and tooling.
impl PlaybackSink for Vec<u8> {
    fn on_chunk(&mut self, chunk: &[u8]) {
        self.extend_from_slice(chunk);
    }
}

/// Discards the response.
pub struct NullSink;

impl PlaybackSink for NullSink {
    fn on_chunk(&mut self, _chunk: &[u8]) {}
}

/// Drives the speaking animation from chunk loudness, optionally forwarding
/// chunks to a real decoder.
///
/// Loudness is the mean absolute value of the bytes read as signed 8-bit
/// samples, doubled and clamped to 0-100. It is a visual proxy only.
pub struct AmplitudeMeter {
    feedback: Arc<dyn Feedback>,
    inner: Option<Box<dyn PlaybackSink>>,
    last_level: u8,
}

impl AmplitudeMeter {
    pub fn new(feedback: Arc<dyn Feedback>) -> Self {
        Self {
            feedback,
            inner: None,
            last_level: 0,
        }
    }

    /// Forwards every chunk to `inner` after metering it.
    #[must_use]
    pub fn with_inner(mut self, inner: Box<dyn PlaybackSink>) -> Self {
        self.inner = Some(inner);
        self
    }

    /// Level computed for the most recent chunk.
    #[must_use]
    pub fn last_level(&self) -> u8 {
        self.last_level
    }
}

/// Mouth level (0-100) for one chunk.
#[must_use]
pub fn chunk_level(chunk: &[u8]) -> u8 {
    if chunk.is_empty() {
        return 0;
    }
    let sum: u64 = chunk
        .iter()
        .map(|&b| u64::from((b as i8).unsigned_abs()))
        .sum();
    let avg = sum / chunk.len() as u64;
    (avg * 2).min(100) as u8
}

impl PlaybackSink for AmplitudeMeter {
    fn on_chunk(&mut self, chunk: &[u8]) {
        self.last_level = chunk_level(chunk);
        self.feedback.mouth_level(self.last_level);
        if let Some(inner) = self.inner.as_mut() {
            inner.on_chunk(chunk);
        }
    }

    fn on_end(&mut self) {
        self.last_level = 0;
        self.feedback.mouth_level(0);
        if let Some(inner) = self.inner.as_mut() {
            inner.on_end();
        }
    }
}
