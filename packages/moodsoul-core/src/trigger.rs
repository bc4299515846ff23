//! Trigger dispatcher: turns one tick of sensor readings into at most one
//! interaction.
//!
//! Sources, highest priority first:
//!
//! | Event               | Condition                                      | Image | Audio    |
//! |---------------------|------------------------------------------------|-------|----------|
//! | `ManualTouch`       | touch released                                 | yes   | recorded |
//! | `ShakeGesture`      | `\|ax\|` over threshold, debounced             | no    | dummy    |
//! | `UpsideDownGesture` | `az` crosses below the upside-down limit       | no    | dummy    |
//! | `AutoObserve`       | charging and sustained lateral vibration       | yes   | dummy    |
//!
//! Every source is evaluated on every tick so its timers and edge state stay
//! current, even when the machine is busy or a higher-priority source wins.

use tokio::time::Instant;

use crate::feedback::Orientation;
use crate::interaction::InteractionState;
use crate::peripherals::SensorReadings;
use crate::protocol_constants::{TAG_AUTO_OBSERVE, TAG_SHAKE, TAG_UPSIDE_DOWN};
use crate::state::TriggerConfig;

/// What one tick asks the interaction machine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerEvent {
    ManualTouch,
    ShakeGesture,
    UpsideDownGesture,
    AutoObserve,
    #[default]
    None,
}

impl TriggerEvent {
    /// Value of the `trigger` part, `None` for a manual touch.
    #[must_use]
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Self::ShakeGesture => Some(TAG_SHAKE),
            Self::UpsideDownGesture => Some(TAG_UPSIDE_DOWN),
            Self::AutoObserve => Some(TAG_AUTO_OBSERVE),
            Self::ManualTouch | Self::None => None,
        }
    }

    /// Whether a camera frame must be captured.
    #[must_use]
    pub fn needs_image(self) -> bool {
        matches!(self, Self::ManualTouch | Self::AutoObserve)
    }

    /// Whether the microphone records a full clip.
    #[must_use]
    pub fn records_audio(self) -> bool {
        self == Self::ManualTouch
    }

    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

/// Result of one [`TriggerDispatcher::evaluate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerDecision {
    /// Interaction to start; `None` when nothing fired or the machine is busy.
    pub event: TriggerEvent,
    /// Display rotation to apply, on either orientation edge.
    pub orientation: Option<Orientation>,
    /// A touch press was seen (chirp + ring).
    pub touch_ack: bool,
}

/// Per-source detection state, carried between ticks.
pub struct TriggerDispatcher {
    config: TriggerConfig,
    last_shake: Option<Instant>,
    upside_down: bool,
    vibration_since: Option<Instant>,
    last_auto_observe: Option<Instant>,
}

impl TriggerDispatcher {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            last_shake: None,
            upside_down: false,
            vibration_since: None,
            last_auto_observe: None,
        }
    }

    /// Whether the last readings left the device upside down.
    #[must_use]
    pub fn is_upside_down(&self) -> bool {
        self.upside_down
    }

    /// Evaluates all sources for one tick.
    ///
    /// # Arguments
    /// * `readings` - Sensor snapshot for this tick
    /// * `now` - Monotonic time of the snapshot
    /// * `state` - Current machine state; any event is dropped unless `Idle`
    pub fn evaluate(
        &mut self,
        readings: &SensorReadings,
        now: Instant,
        state: InteractionState,
    ) -> TriggerDecision {
        let idle = state == InteractionState::Idle;

        let touch = readings.touch.was_released;
        let shake = self.detect_shake(readings, now);
        let (flipped, orientation) = self.track_orientation(readings);
        let observe = self.detect_auto_observe(readings, now);

        let event = if touch {
            TriggerEvent::ManualTouch
        } else if shake {
            TriggerEvent::ShakeGesture
        } else if flipped {
            TriggerEvent::UpsideDownGesture
        } else if observe {
            TriggerEvent::AutoObserve
        } else {
            TriggerEvent::None
        };

        let event = if !idle && !event.is_none() {
            log::debug!("[Trigger] Dropped {:?}: machine is {}", event, state);
            TriggerEvent::None
        } else {
            event
        };
        if !event.is_none() {
            log::info!("[Trigger] {:?}", event);
        }

        TriggerDecision {
            event,
            orientation,
            touch_ack: idle && readings.touch.was_pressed,
        }
    }

    fn detect_shake(&mut self, readings: &SensorReadings, now: Instant) -> bool {
        if readings.accel.x.abs() <= self.config.shake_threshold_g {
            return false;
        }
        let debounced = self
            .last_shake
            .map_or(true, |t| now.duration_since(t) > self.config.shake_debounce());
        if debounced {
            self.last_shake = Some(now);
        }
        debounced
    }

    /// Returns `(entered_upside_down, orientation_change)`.
    fn track_orientation(&mut self, readings: &SensorReadings) -> (bool, Option<Orientation>) {
        let z = readings.accel.z;
        if !self.upside_down && z < self.config.upside_down_z {
            self.upside_down = true;
            (true, Some(Orientation::Inverted))
        } else if self.upside_down && z > self.config.upright_z {
            self.upside_down = false;
            (false, Some(Orientation::Normal))
        } else {
            (false, None)
        }
    }

    fn detect_auto_observe(&mut self, readings: &SensorReadings, now: Instant) -> bool {
        let cfg = &self.config;
        let due = self
            .last_auto_observe
            .map_or(true, |t| now.duration_since(t) > cfg.auto_observe_interval());
        if !cfg.auto_observe || !readings.charging || !due {
            self.vibration_since = None;
            return false;
        }

        let accel = readings.accel;
        let vibrating =
            accel.x.abs() > cfg.vibration_threshold_g || accel.y.abs() > cfg.vibration_threshold_g;
        if !vibrating {
            self.vibration_since = None;
            return false;
        }

        let since = *self.vibration_since.get_or_insert(now);
        if now.duration_since(since) > cfg.vibration_hold() {
            self.vibration_since = None;
            self.last_auto_observe = Some(now);
            true
        } else {
            false
        }
    }
}
