//! One request/response exchange over an owned byte stream.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{timeout_at, Instant};

use crate::error::{TransportError, TransportResult};
use crate::multipart::{MultipartPlan, Segment};
use crate::playback::PlaybackSink;
use crate::protocol_constants::{CHUNK_SIZE, MAX_HEADER_LINE};
use crate::state::EndpointConfig;

use super::client::Payloads;

/// Builds the request line and header block for a planned body.
///
/// `Connection: close` asks the server to end the response by closing the
/// socket, which is how the body length is delimited on the read side.
#[must_use]
pub fn request_head(endpoint: &EndpointConfig, plan: &MultipartPlan) -> String {
    format!(
        "POST {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Content-Length: {}\r\n\
         Content-Type: {}\r\n\
         Connection: close\r\n\
         \r\n",
        endpoint.path,
        endpoint.host_header(),
        plan.content_length(),
        plan.content_type()
    )
}

/// Writes `data` in pieces of at most `chunk_size` bytes, in order.
///
/// Returns the number of bytes written (always `data.len()` on success).
pub async fn write_chunked<W>(writer: &mut W, data: &[u8], chunk_size: usize) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    for chunk in data.chunks(chunk_size.max(1)) {
        writer.write_all(chunk).await?;
    }
    Ok(data.len())
}

/// Fills `buf` from `reader` until it is full or the stream ends.
///
/// A read error after some bytes were received still returns those bytes.
async fn read_chunk<R>(reader: &mut R, buf: &mut [u8]) -> (usize, Option<io::Error>)
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (filled, Some(e)),
        }
    }
    (filled, None)
}

/// Counters for a streamed response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyStats {
    pub chunks: usize,
    pub bytes: usize,
    /// The body ended with a read error rather than an orderly close.
    pub truncated: bool,
}

/// Owns the socket for exactly one interaction.
///
/// The stream is closed when the session is dropped, so every early return
/// in the exchange tears the connection down.
pub struct ConnectionSession<S: AsyncRead + AsyncWrite + Unpin> {
    stream: BufReader<S>,
    peer: String,
    bytes_written: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ConnectionSession<S> {
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        let peer = peer.into();
        log::debug!("[Transport] Session opened to {}", peer);
        Self {
            stream: BufReader::with_capacity(CHUNK_SIZE, stream),
            peer,
            bytes_written: 0,
        }
    }

    /// Bytes written so far (request head included).
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> TransportResult<()> {
        self.stream
            .get_mut()
            .write_all(bytes)
            .await
            .map_err(TransportError::Write)?;
        self.bytes_written += bytes.len();
        Ok(())
    }

    /// Writes the request head, then every plan segment in order.
    ///
    /// Payload segments are taken from the start of their buffer and written
    /// in [`CHUNK_SIZE`] pieces.
    pub async fn write_request(
        &mut self,
        head: &str,
        plan: &MultipartPlan,
        payloads: &Payloads<'_>,
    ) -> TransportResult<()> {
        self.write_raw(head.as_bytes()).await?;
        let body_start = self.bytes_written;

        for segment in plan.segments() {
            match segment {
                Segment::Literal(bytes) => self.write_raw(bytes).await?,
                Segment::Payload { source, len } => {
                    let buffer = payloads.get(*source).unwrap_or_default();
                    if buffer.len() < *len {
                        return Err(TransportError::PayloadLength {
                            name: source.field_name(),
                            declared: *len,
                            actual: buffer.len(),
                        });
                    }
                    let written = write_chunked(self.stream.get_mut(), &buffer[..*len], CHUNK_SIZE)
                        .await
                        .map_err(TransportError::Write)?;
                    self.bytes_written += written;
                }
            }
        }

        self.stream
            .get_mut()
            .flush()
            .await
            .map_err(TransportError::Write)?;

        debug_assert_eq!(self.bytes_written - body_start, plan.content_length());
        log::debug!(
            "[Transport] Request written to {}: {} body bytes",
            self.peer,
            self.bytes_written - body_start
        );
        Ok(())
    }

    /// Reads and discards response header lines until the blank line.
    ///
    /// The deadline covers the whole header block, measured from the call.
    /// Each line is read through a [`MAX_HEADER_LINE`] cap, so a peer that
    /// never sends a line terminator cannot grow the buffer.
    /// Returns the number of header lines read (status line included).
    pub async fn skip_response_headers(&mut self, limit: Duration) -> TransportResult<usize> {
        let deadline = Instant::now() + limit;
        let mut line = Vec::with_capacity(128);
        let mut lines = 0;

        loop {
            line.clear();
            let mut limited = (&mut self.stream).take(MAX_HEADER_LINE as u64);
            let read = timeout_at(deadline, limited.read_until(b'\n', &mut line))
                .await
                .map_err(|_| TransportError::HeaderTimeout(limit.as_millis() as u64))?
                .map_err(|e| TransportError::HeaderClosed(Some(e)))?;

            if read == 0 {
                return Err(TransportError::HeaderClosed(None));
            }
            if read == MAX_HEADER_LINE && !line.ends_with(b"\n") {
                log::warn!(
                    "[Transport] Response from {} has a header line over {} bytes",
                    self.peer,
                    MAX_HEADER_LINE
                );
                return Err(TransportError::HeaderLineTooLong(MAX_HEADER_LINE));
            }
            if line == b"\r\n" || line == b"\n" {
                return Ok(lines);
            }
            if lines == 0 {
                log::info!(
                    "[Transport] Response from {}: {}",
                    self.peer,
                    String::from_utf8_lossy(&line).trim_end()
                );
            }
            lines += 1;
        }
    }

    /// Streams the response body to `sink` in [`CHUNK_SIZE`] chunks until
    /// the peer closes the connection.
    ///
    /// Only the final chunk may be shorter than [`CHUNK_SIZE`].
    pub async fn stream_body(&mut self, sink: &mut dyn PlaybackSink) -> BodyStats {
        let mut buf = [0u8; CHUNK_SIZE];
        let mut stats = BodyStats::default();

        loop {
            let (len, error) = read_chunk(&mut self.stream, &mut buf).await;
            if len > 0 {
                sink.on_chunk(&buf[..len]);
                stats.chunks += 1;
                stats.bytes += len;
            }
            if let Some(e) = error {
                log::warn!(
                    "[Transport] Response from {} ended with error after {} bytes: {}",
                    self.peer,
                    stats.bytes,
                    e
                );
                stats.truncated = true;
                break;
            }
            if len < CHUNK_SIZE {
                break;
            }
        }

        sink.on_end();
        stats
    }

    /// Shuts the write side down and drops the stream.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.get_mut().shutdown().await {
            log::debug!("[Transport] Shutdown of {} failed: {}", self.peer, e);
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Drop for ConnectionSession<S> {
    fn drop(&mut self) {
        log::debug!(
            "[Transport] Session to {} closed ({} bytes written)",
            self.peer,
            self.bytes_written
        );
    }
}
