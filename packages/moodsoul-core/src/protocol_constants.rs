//! Fixed protocol constants that should NOT be changed.
//!
//! These values are shared with the interaction endpoint (multipart field
//! names, trigger tags) or fixed by the audio capture format. Changing them
//! breaks compatibility with the server.

// ─────────────────────────────────────────────────────────────────────────────
// Audio Capture
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed recording duration for a manual interaction (seconds).
pub const RECORD_TIME_SECS: usize = 3;

/// Microphone sample rate (Hz).
pub const SAMPLE_RATE: u32 = 16_000;

/// Bytes per recorded sample (16-bit mono PCM).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Size of the shared audio buffer: one full recording.
///
/// 3 s × 16 kHz × 2 bytes = 96 000 bytes.
pub const AUDIO_BUF_SIZE: usize = RECORD_TIME_SECS * SAMPLE_RATE as usize * BYTES_PER_SAMPLE;

/// Length of the zeroed placeholder clip sent by interactions that skip recording.
pub const DUMMY_AUDIO_LEN: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Chunk size for payload writes and response body reads (bytes).
///
/// Keeps the working set constant regardless of payload size.
pub const CHUNK_SIZE: usize = 1024;

/// Default deadline for receiving the full response header block (ms).
pub const DEFAULT_HEADER_TIMEOUT_MS: u64 = 8000;

/// Longest accepted response header line, terminator included (bytes).
pub const MAX_HEADER_LINE: usize = 2048;

/// Default deadline for establishing the TCP connection (ms).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default interaction endpoint path.
pub const DEFAULT_INTERACT_PATH: &str = "/api/interact";

/// Prefix of every generated multipart boundary token.
pub const BOUNDARY_PREFIX: &str = "------------------------";

// ─────────────────────────────────────────────────────────────────────────────
// Multipart Fields
// ─────────────────────────────────────────────────────────────────────────────

pub const FIELD_DEVICE_ID: &str = "deviceId";
pub const FIELD_TRIGGER: &str = "trigger";
pub const FIELD_IMAGE: &str = "image";
pub const FIELD_AUDIO: &str = "audio";

pub const IMAGE_FILENAME: &str = "capture.jpg";
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";
pub const AUDIO_FILENAME: &str = "audio.pcm";
pub const AUDIO_CONTENT_TYPE: &str = "application/octet-stream";

// ─────────────────────────────────────────────────────────────────────────────
// Trigger Tags
// ─────────────────────────────────────────────────────────────────────────────

/// Sent with interactions started by a shake gesture.
pub const TAG_SHAKE: &str = "SHAKE_EVENT";

/// Sent with interactions started by turning the device upside down.
pub const TAG_UPSIDE_DOWN: &str = "UPSIDE_DOWN";

/// Sent with autonomous observations (vibration while charging).
pub const TAG_AUTO_OBSERVE: &str = "AUTO_OBSERVE";
