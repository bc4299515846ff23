//! Streaming client: one blocking-style exchange per interaction.

use tokio::time::timeout;

use crate::error::{ErrorCode, TransportError, TransportResult};
use crate::interaction::InteractionOutcome;
use crate::multipart::{MultipartPlan, PayloadRef};
use crate::playback::PlaybackSink;
use crate::state::EndpointConfig;

use super::session::{request_head, BodyStats, ConnectionSession};
use super::{Connector, TcpConnector};

/// Payload buffers referenced by a [`MultipartPlan`].
///
/// Only the first `len` bytes named by each payload segment are sent.
#[derive(Debug, Clone, Copy)]
pub struct Payloads<'a> {
    pub image: Option<&'a [u8]>,
    pub audio: &'a [u8],
}

impl<'a> Payloads<'a> {
    #[must_use]
    pub fn get(&self, source: PayloadRef) -> Option<&'a [u8]> {
        match source {
            PayloadRef::Image => self.image,
            PayloadRef::Audio => Some(self.audio),
        }
    }
}

/// Network phases of an exchange, reported as they begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Sending,
    AwaitingResponse,
    Playing,
}

/// Observes phase changes during [`StreamingClient::send_and_receive`].
pub trait PhaseObserver {
    fn on_phase(&mut self, phase: Phase);
}

impl PhaseObserver for () {
    fn on_phase(&mut self, _phase: Phase) {}
}

/// Records every phase in order.
impl PhaseObserver for Vec<Phase> {
    fn on_phase(&mut self, phase: Phase) {
        self.push(phase);
    }
}

/// Sends one multipart request and streams the response to a sink.
pub struct StreamingClient<C: Connector = TcpConnector> {
    endpoint: EndpointConfig,
    connector: C,
}

impl StreamingClient<TcpConnector> {
    /// Creates a client that connects over TCP.
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self::with_connector(endpoint, TcpConnector)
    }
}

impl<C: Connector> StreamingClient<C> {
    /// Creates a client with a custom connector.
    pub fn with_connector(endpoint: EndpointConfig, connector: C) -> Self {
        Self {
            endpoint,
            connector,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Runs a full exchange and reduces it to an [`InteractionOutcome`].
    ///
    /// A response that arrives and ends, for any reason, after the header
    /// block counts as [`InteractionOutcome::Success`]. The connection is
    /// closed before this returns on every path.
    ///
    /// # Arguments
    /// * `plan` - Body layout, fixed before the first byte is written
    /// * `payloads` - Buffers backing the plan's payload segments
    /// * `sink` - Receives the response body in arrival order
    /// * `observer` - Notified as each network phase begins
    pub async fn send_and_receive(
        &self,
        plan: &MultipartPlan,
        payloads: Payloads<'_>,
        sink: &mut dyn PlaybackSink,
        observer: &mut dyn PhaseObserver,
    ) -> InteractionOutcome {
        match self.exchange(plan, payloads, sink, observer).await {
            Ok(stats) => {
                log::info!(
                    "[Transport] Exchange complete: {} bytes in {} chunks{}",
                    stats.bytes,
                    stats.chunks,
                    if stats.truncated { " (truncated)" } else { "" }
                );
                InteractionOutcome::Success
            }
            Err(e) => {
                log::warn!("[Transport] Exchange failed [{}]: {}", e.code(), e);
                e.outcome()
            }
        }
    }

    /// Like [`send_and_receive`](Self::send_and_receive) but keeps the error.
    pub async fn exchange(
        &self,
        plan: &MultipartPlan,
        payloads: Payloads<'_>,
        sink: &mut dyn PlaybackSink,
        observer: &mut dyn PhaseObserver,
    ) -> TransportResult<BodyStats> {
        observer.on_phase(Phase::Connecting);
        let mut session = self.connect().await?;

        observer.on_phase(Phase::Sending);
        let head = request_head(&self.endpoint, plan);
        session.write_request(&head, plan, &payloads).await?;

        observer.on_phase(Phase::AwaitingResponse);
        session
            .skip_response_headers(self.endpoint.header_timeout())
            .await?;

        observer.on_phase(Phase::Playing);
        let stats = session.stream_body(sink).await;
        session.close().await;
        Ok(stats)
    }

    async fn connect(&self) -> TransportResult<ConnectionSession<C::Stream>> {
        let addr = self.endpoint.addr();
        log::debug!("[Transport] Connecting to {}", addr);

        let stream = timeout(
            self.endpoint.connect_timeout(),
            self.connector
                .connect(&self.endpoint.host, self.endpoint.port),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout(addr.clone()))?
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;

        Ok(ConnectionSession::new(stream, addr))
    }
}
