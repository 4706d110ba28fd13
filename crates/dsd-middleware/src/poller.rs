//! [`ChannelPoller`] – turns a polled host into a stream of change events.
//!
//! The host only answers queries, so the poller samples it every
//! `interval` and reports differences as [`Input`] events:
//!
//! 1. [`Input::VehicleChanged`] when the active vehicle differs from the
//!    last observation (the first observation is the baseline supplied by
//!    the caller, so an unchanged vehicle never fires).
//! 2. [`Input::ChannelChanged`] for every subscribed channel whose value
//!    changed. The first sample of a channel reports `old: None`.
//! 3. [`Input::Tick`] when the simulated clock changed.
//!
//! Channel changes are emitted before the tick of the same sample, so a
//! control movement is evaluated before the deadline is checked.
//!
//! A failing read skips that item for the current sample; it is retried on
//! the next one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use dsd_hal::ControlChannels;
use dsd_types::{Input, VehicleId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Polls a [`ControlChannels`] host and diffs successive samples.
pub struct ChannelPoller {
    host: Arc<dyn ControlChannels>,
    interval: Duration,
    channels: Vec<String>,
    last_values: HashMap<String, f32>,
    last_time: Option<NaiveTime>,
    last_vehicle: Option<VehicleId>,
}

impl ChannelPoller {
    /// Create a poller with no channel subscriptions and no vehicle
    /// baseline.
    pub fn new(host: Arc<dyn ControlChannels>, interval: Duration) -> Self {
        Self {
            host,
            interval,
            channels: Vec::new(),
            last_values: HashMap::new(),
            last_time: None,
            last_vehicle: None,
        }
    }

    /// Treat `vehicle` as already observed.
    pub fn with_vehicle_baseline(mut self, vehicle: Option<VehicleId>) -> Self {
        self.last_vehicle = vehicle;
        self
    }

    /// Add `channels` to the subscription set. Duplicates are ignored.
    pub fn subscribe<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for channel in channels {
            let channel = channel.into();
            if !self.channels.contains(&channel) {
                self.channels.push(channel);
            }
        }
    }

    /// The subscribed channel names, in subscription order.
    pub fn subscriptions(&self) -> &[String] {
        &self.channels
    }

    /// Sample the host once and return the resulting events.
    pub fn poll(&mut self) -> Vec<Input> {
        let mut inputs = Vec::new();

        match self.host.vehicle_id() {
            Ok(vehicle) if vehicle != self.last_vehicle => {
                let old = std::mem::replace(&mut self.last_vehicle, vehicle.clone());
                inputs.push(Input::VehicleChanged { new: vehicle, old });
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "vehicle identity read failed"),
        }

        for channel in &self.channels {
            let new = match self.host.get(channel) {
                Ok(v) => v,
                Err(e) => {
                    debug!(channel = %channel, error = %e, "channel read failed");
                    continue;
                }
            };
            let old = self.last_values.insert(channel.clone(), new);
            if old != Some(new) {
                inputs.push(Input::ChannelChanged {
                    channel: channel.clone(),
                    new,
                    old,
                });
            }
        }

        match self.host.current_time() {
            Ok(now) if Some(now) != self.last_time => {
                let previous = self.last_time.replace(now);
                inputs.push(Input::Tick { now, previous });
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "clock read failed"),
        }

        inputs
    }

    /// Run the poller on a Tokio task, forwarding events into `sink` until
    /// stopped or until the receiving side is dropped.
    pub fn spawn(mut self, sink: mpsc::UnboundedSender<Input>) -> PollerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_ms = self.interval.as_millis() as u64,
                channels = self.channels.len(),
                "channel poller started"
            );
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        for input in self.poll() {
                            if sink.send(input).is_err() {
                                debug!("poller sink closed");
                                return;
                            }
                        }
                    }
                }
            }
            info!("channel poller stopped");
        });
        PollerHandle {
            stop: Some(stop_tx),
            join,
        }
    }
}

/// Handle to a running poller task.
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the poller to stop, then wait for its task to finish.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.join).await {
            debug!(error = %e, "poller task ended abnormally");
        }
    }
}
