//! Centralized error types for the MoodSoul core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Gives every error a machine-readable code via [`ErrorCode`]
//! - Maps transport errors onto the closed [`InteractionOutcome`] taxonomy

use std::io;

use thiserror::Error;

use crate::interaction::InteractionOutcome;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths (logs, status events).
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Capture Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while acquiring the interaction payloads.
///
/// A capture error aborts the interaction before any network activity.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The microphone could not record.
    #[error("Microphone unavailable: {0}")]
    Microphone(String),

    /// The camera did not deliver a frame.
    #[error("Camera unavailable")]
    CameraUnavailable,
}

impl ErrorCode for CaptureError {
    fn code(&self) -> &'static str {
        match self {
            Self::Microphone(_) => "microphone_unavailable",
            Self::CameraUnavailable => "camera_unavailable",
        }
    }
}

/// Convenient Result alias for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

// ─────────────────────────────────────────────────────────────────────────────
// Transport Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during one request/response exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connect was refused or the host was unreachable.
    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// TCP connect did not complete before the deadline.
    #[error("Connect to {0} timed out")]
    ConnectTimeout(String),

    /// Writing the request line, headers or body failed.
    #[error("Request write failed: {0}")]
    Write(#[source] io::Error),

    /// A payload buffer is shorter than the length declared in the plan.
    #[error("Payload {name} has {actual} bytes, plan declares {declared}")]
    PayloadLength {
        name: &'static str,
        declared: usize,
        actual: usize,
    },

    /// The response header block did not end before the deadline.
    #[error("Response headers not received within {0}ms")]
    HeaderTimeout(u64),

    /// A response header line exceeded the line limit without a terminator.
    #[error("Response header line longer than {0} bytes")]
    HeaderLineTooLong(usize),

    /// The peer closed or reset the connection before the header block ended.
    #[error("Connection closed before response headers ended")]
    HeaderClosed(#[source] Option<io::Error>),
}

impl TransportError {
    /// Maps the error onto the terminal outcome reported for the interaction.
    ///
    /// Header-phase disconnects and oversized header lines count as
    /// `HeaderTimeout`: in every case a usable header block never arrived.
    #[must_use]
    pub fn outcome(&self) -> InteractionOutcome {
        match self {
            Self::Connect { .. } | Self::ConnectTimeout(_) => InteractionOutcome::ConnectFailure,
            Self::Write(_) | Self::PayloadLength { .. } => InteractionOutcome::WriteFailure,
            Self::HeaderTimeout(_) | Self::HeaderLineTooLong(_) | Self::HeaderClosed(_) => {
                InteractionOutcome::HeaderTimeout
            }
        }
    }
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect_failed",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::Write(_) => "write_failed",
            Self::PayloadLength { .. } => "payload_length_mismatch",
            Self::HeaderTimeout(_) => "header_timeout",
            Self::HeaderLineTooLong(_) => "header_line_too_long",
            Self::HeaderClosed(_) => "header_closed",
        }
    }
}

/// Convenient Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration rejected by [`Config::validate`](crate::state::Config::validate).
#[derive(Debug, Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        "configuration_error"
    }
}
