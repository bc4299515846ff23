//! Streaming HTTP transport for interactions.
//!
//! One TCP connection carries one interaction:
//!
//! ```text
//! connect ─► request line + headers ─► body (1 KiB chunks) ─► skip response headers ─► stream body
//!                                                              (deadline)              (until peer closes)
//! ```
//!
//! - [`ConnectionSession`]: owns the socket for one exchange, closed on every exit path
//! - [`StreamingClient`]: sequences the phases and maps errors to an [`InteractionOutcome`]
//! - [`Connector`]: opens the byte stream (TCP in production, in-memory in tests)
//!
//! [`InteractionOutcome`]: crate::interaction::InteractionOutcome

mod client;
mod session;

pub use client::{Payloads, Phase, PhaseObserver, StreamingClient};
pub use session::{request_head, write_chunked, BodyStats, ConnectionSession};

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens the byte stream for one session.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Connects to `host:port`. Exactly one attempt; no retry.
    async fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        // Chunks are already sized; don't let Nagle hold them back
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("[Transport] Failed to set TCP_NODELAY: {}", e);
        }
        Ok(stream)
    }
}
