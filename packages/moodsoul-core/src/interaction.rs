//! Interaction state machine.
//!
//! One interaction walks `Idle → Capturing → Sending → AwaitingResponse →
//! Playing → Idle`. Every failure returns to `Idle` and is reported once;
//! nothing is retried and no history is kept.

use std::fmt;

use serde::Serialize;

use crate::error::{CaptureError, CaptureResult, ErrorCode};
use crate::feedback::{Feedback, UiStatus};
use crate::multipart::{MultipartEncoder, MultipartPlan, PlanFields};
use crate::peripherals::{AudioCapture, CapturedFrame, Peripherals};
use crate::protocol_constants::{AUDIO_BUF_SIZE, DUMMY_AUDIO_LEN, SAMPLE_RATE};
use crate::state::EndpointConfig;
use crate::transport::{Connector, Payloads, Phase, PhaseObserver, StreamingClient, TcpConnector};
use crate::trigger::TriggerEvent;

/// Lifecycle state of the (single) interaction slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionState {
    #[default]
    Idle,
    Capturing,
    Sending,
    AwaitingResponse,
    Playing,
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Sending => "sending",
            Self::AwaitingResponse => "awaiting_response",
            Self::Playing => "playing",
        };
        f.write_str(s)
    }
}

/// Terminal result of the network part of an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionOutcome {
    Success,
    ConnectFailure,
    HeaderTimeout,
    WriteFailure,
}

impl InteractionOutcome {
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// The data sent for one interaction, borrowed from machine-owned buffers.
#[derive(Debug, Clone, Copy)]
pub struct InteractionRequest<'a> {
    pub device_id: &'a str,
    pub trigger: Option<&'static str>,
    pub image: Option<&'a [u8]>,
    pub audio: &'a [u8],
}

impl<'a> InteractionRequest<'a> {
    /// Plan fields describing this request.
    #[must_use]
    pub fn fields(&self) -> PlanFields<'a> {
        PlanFields {
            device_id: self.device_id,
            trigger: self.trigger,
            image_len: self.image.map(<[u8]>::len),
            audio_len: self.audio.len(),
        }
    }

    /// Lays out the body with a fresh boundary from `encoder`.
    #[must_use]
    pub fn plan(&self, encoder: &MultipartEncoder) -> MultipartPlan {
        encoder.plan(&self.fields())
    }

    #[must_use]
    pub fn payloads(&self) -> Payloads<'a> {
        Payloads {
            image: self.image,
            audio: self.audio,
        }
    }
}

/// What happened to one [`InteractionMachine::run`] call.
#[derive(Debug)]
pub enum InteractionReport {
    /// The network exchange ran to a terminal outcome.
    Completed(InteractionOutcome),
    /// Capture failed; no connection was opened.
    CaptureFailed(CaptureError),
    /// The machine was not idle (or there was nothing to run).
    Rejected(InteractionState),
}

impl InteractionReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(InteractionOutcome::Success))
    }

    /// Failure label to show, if this report is a failure.
    #[must_use]
    pub fn failure_status(&self) -> Option<UiStatus> {
        match self {
            Self::Completed(outcome) => UiStatus::for_outcome(*outcome),
            Self::CaptureFailed(e) => Some(UiStatus::for_capture_error(e)),
            Self::Rejected(_) => None,
        }
    }
}

/// Mirrors transport phases into the machine state and the display.
struct PhaseTracker<'a> {
    state: &'a mut InteractionState,
    feedback: &'a dyn Feedback,
}

impl PhaseTracker<'_> {
    fn enter(&mut self, next: InteractionState) {
        if *self.state != next {
            log::debug!("[Interaction] {} -> {}", self.state, next);
            *self.state = next;
        }
    }
}

impl PhaseObserver for PhaseTracker<'_> {
    fn on_phase(&mut self, phase: Phase) {
        match phase {
            Phase::Connecting => self.feedback.show(UiStatus::Connecting),
            Phase::Sending => self.feedback.show(UiStatus::Sending),
            Phase::AwaitingResponse => self.enter(InteractionState::AwaitingResponse),
            Phase::Playing => {
                self.enter(InteractionState::Playing);
                self.feedback.show(UiStatus::Speaking);
            }
        }
    }
}

/// Runs interactions one at a time.
///
/// Owns the audio buffer, allocated once at [`AUDIO_BUF_SIZE`] and reused for
/// every interaction. Recording overwrites all of it; gesture interactions
/// zero the first [`DUMMY_AUDIO_LEN`] bytes and send only those.
pub struct InteractionMachine<C: Connector = TcpConnector> {
    state: InteractionState,
    device_id: String,
    audio: Vec<u8>,
    encoder: MultipartEncoder,
    client: StreamingClient<C>,
}

impl InteractionMachine<TcpConnector> {
    pub fn new(device_id: impl Into<String>, endpoint: EndpointConfig) -> Self {
        Self::with_client(device_id, StreamingClient::new(endpoint))
    }
}

impl<C: Connector> InteractionMachine<C> {
    pub fn with_client(device_id: impl Into<String>, client: StreamingClient<C>) -> Self {
        Self {
            state: InteractionState::Idle,
            device_id: device_id.into(),
            audio: vec![0; AUDIO_BUF_SIZE],
            encoder: MultipartEncoder::new(),
            client,
        }
    }

    #[must_use]
    pub fn state(&self) -> InteractionState {
        self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == InteractionState::Idle
    }

    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn enter(&mut self, next: InteractionState) {
        log::debug!("[Interaction] {} -> {}", self.state, next);
        self.state = next;
    }

    /// Runs one interaction to completion.
    ///
    /// Blocks the caller for the whole capture and network exchange. The
    /// machine is `Idle` again when this returns, whatever the result.
    ///
    /// # Arguments
    /// * `trigger` - What started the interaction; decides tag, image and audio
    /// * `io` - Hardware collaborators; the camera frame is released before return
    pub async fn run(&mut self, trigger: TriggerEvent, io: &mut Peripherals) -> InteractionReport {
        if trigger == TriggerEvent::None || !self.is_idle() {
            log::debug!(
                "[Interaction] Rejected {:?} while {}",
                trigger,
                self.state
            );
            return InteractionReport::Rejected(self.state);
        }

        log::info!("[Interaction] Starting {:?}", trigger);
        let feedback = io.feedback.clone();
        self.enter(InteractionState::Capturing);

        let audio_len = match self
            .capture_audio(trigger, io.microphone.as_mut(), &*feedback)
            .await
        {
            Ok(len) => len,
            Err(e) => return self.abort_capture(e, &*feedback),
        };

        let frame = if trigger.needs_image() {
            feedback.show(UiStatus::Thinking);
            match CapturedFrame::acquire(io.camera.as_mut()) {
                Some(frame) => Some(frame),
                None => return self.abort_capture(CaptureError::CameraUnavailable, &*feedback),
            }
        } else {
            None
        };

        let request = InteractionRequest {
            device_id: &self.device_id,
            trigger: trigger.tag(),
            image: frame.as_ref().map(CapturedFrame::bytes),
            audio: &self.audio[..audio_len],
        };
        let plan = request.plan(&self.encoder);
        log::debug!(
            "[Interaction] Planned {} bytes (image: {:?}, audio: {})",
            plan.content_length(),
            request.image.map(<[u8]>::len),
            audio_len
        );

        log::debug!("[Interaction] {} -> {}", self.state, InteractionState::Sending);
        self.state = InteractionState::Sending;
        let mut tracker = PhaseTracker {
            state: &mut self.state,
            feedback: &*feedback,
        };
        let outcome = self
            .client
            .send_and_receive(&plan, request.payloads(), io.speaker.as_mut(), &mut tracker)
            .await;

        drop(frame);
        self.enter(InteractionState::Idle);

        if let Some(status) = UiStatus::for_outcome(outcome) {
            feedback.show(status);
        }
        log::info!("[Interaction] {:?} finished: {:?}", trigger, outcome);
        InteractionReport::Completed(outcome)
    }

    /// Fills the audio buffer for `trigger` and returns the length to send.
    async fn capture_audio(
        &mut self,
        trigger: TriggerEvent,
        microphone: &mut dyn AudioCapture,
        feedback: &dyn Feedback,
    ) -> CaptureResult<usize> {
        if trigger.records_audio() {
            feedback.show(UiStatus::Listening);
            microphone.record(&mut self.audio, SAMPLE_RATE).await?;
            Ok(self.audio.len())
        } else {
            self.audio[..DUMMY_AUDIO_LEN].fill(0);
            Ok(DUMMY_AUDIO_LEN)
        }
    }

    fn abort_capture(&mut self, err: CaptureError, feedback: &dyn Feedback) -> InteractionReport {
        log::warn!("[Interaction] Capture failed [{}]: {}", err.code(), err);
        self.enter(InteractionState::Idle);
        feedback.show(UiStatus::for_capture_error(&err));
        InteractionReport::CaptureFailed(err)
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: InteractionState) {
        self.state = state;
    }
}
