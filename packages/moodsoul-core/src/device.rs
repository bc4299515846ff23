//! Device runtime: the single cooperative loop.
//!
//! Each tick reads the sensors once, lets the [`TriggerDispatcher`] decide,
//! and runs at most one interaction to completion before the next tick.
//! Shutdown is only observed between ticks; an interaction in flight always
//! finishes (or times out) first.

use std::time::Duration;

use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::feedback::UiStatus;
use crate::interaction::{InteractionMachine, InteractionReport};
use crate::peripherals::Peripherals;
use crate::state::Config;
use crate::transport::{Connector, StreamingClient, TcpConnector};
use crate::trigger::{TriggerDispatcher, TriggerEvent};

/// What one [`DeviceRuntime::tick`] did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing fired.
    Quiet,
    /// The battery gate skipped trigger evaluation.
    LowBattery,
    /// An interaction ran.
    Interaction {
        trigger: TriggerEvent,
        report: InteractionReport,
    },
}

/// Owns the dispatcher, the machine and every peripheral.
pub struct DeviceRuntime<C: Connector = TcpConnector> {
    config: Config,
    dispatcher: TriggerDispatcher,
    machine: InteractionMachine<C>,
    io: Peripherals,
    battery_low: bool,
}

impl DeviceRuntime<TcpConnector> {
    /// Creates a runtime that talks to `config.endpoint` over TCP.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: Config, io: Peripherals) -> Result<Self, ConfigError> {
        let client = StreamingClient::new(config.endpoint.clone());
        Self::with_client(config, io, client)
    }
}

impl<C: Connector> DeviceRuntime<C> {
    /// Creates a runtime around an existing client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn with_client(
        config: Config,
        io: Peripherals,
        client: StreamingClient<C>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            dispatcher: TriggerDispatcher::new(config.triggers.clone()),
            machine: InteractionMachine::with_client(config.device_id.clone(), client),
            config,
            io,
            battery_low: false,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn machine(&self) -> &InteractionMachine<C> {
        &self.machine
    }

    #[must_use]
    pub fn dispatcher(&self) -> &TriggerDispatcher {
        &self.dispatcher
    }

    /// Runs one iteration of the loop.
    pub async fn tick(&mut self) -> TickOutcome {
        let readings = self.io.sensors.read();
        let feedback = self.io.feedback.clone();
        let cfg = &self.config.feedback;

        if let Some(level) = readings
            .battery_percent
            .filter(|&p| p < cfg.low_battery_percent)
        {
            if !self.battery_low {
                log::warn!("[Device] Battery low ({}%), pausing triggers", level);
                self.battery_low = true;
            }
            feedback.show(UiStatus::LowBattery);
            sleep(cfg.low_battery_pause()).await;
            return TickOutcome::LowBattery;
        }
        if self.battery_low {
            log::info!("[Device] Battery recovered");
            self.battery_low = false;
            feedback.show(UiStatus::Ready);
        }

        let decision = self
            .dispatcher
            .evaluate(&readings, Instant::now(), self.machine.state());

        if let Some(orientation) = decision.orientation {
            feedback.set_orientation(orientation);
        }
        if decision.touch_ack {
            feedback.show(UiStatus::TouchAck);
        }

        let trigger = decision.event;
        if trigger.is_none() {
            return TickOutcome::Quiet;
        }

        if trigger == TriggerEvent::ShakeGesture {
            feedback.show(UiStatus::Dizzy);
        }
        let report = self.machine.run(trigger, &mut self.io).await;

        let hold = self.settle_time(trigger, &report);
        if trigger == TriggerEvent::ShakeGesture && report.failure_status().is_none() {
            feedback.show(UiStatus::Dizzy);
        }
        if !hold.is_zero() {
            sleep(hold).await;
        }
        feedback.show(UiStatus::Ready);

        TickOutcome::Interaction { trigger, report }
    }

    /// How long the last label stays up before returning to Ready.
    fn settle_time(&self, trigger: TriggerEvent, report: &InteractionReport) -> Duration {
        let cfg = &self.config.feedback;
        if report.failure_status().is_some() {
            cfg.failure_hold()
        } else if trigger == TriggerEvent::ShakeGesture {
            cfg.dizzy_hold()
        } else {
            Duration::ZERO
        }
    }

    /// Ticks at `tick_interval_ms` until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) {
        log::info!(
            "[Device] Running as {:?} against {}{}",
            self.config.device_id,
            self.config.endpoint.addr(),
            self.config.endpoint.path
        );
        self.io.feedback.show(UiStatus::Ready);

        let mut ticker = interval(self.config.tick_interval());
        // Interactions overrun the tick; don't replay the missed ones
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let TickOutcome::Interaction { trigger, report } = self.tick().await {
                log::debug!("[Device] {:?} -> {:?}", trigger, report);
            }
        }

        log::info!("[Device] Stopped");
    }
}
