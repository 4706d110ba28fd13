//! In-process simulated host for tests and the interactive console.
//!
//! [`SimHost`] stands in for the vehicle simulation: it stores channel
//! values, a time-of-day clock and the active vehicle, and records every
//! write the vigilance core performs so tests can assert on stop and
//! isolation commands. [`SimPedal`] and [`SimAlert`] do the same for the
//! foot switch and the audible warning.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveTime;
//! use dsd_hal::{ControlChannels, SimHost};
//!
//! let host = SimHost::builder()
//!     .with_vehicle("RSC", "Class66Pack02")
//!     .with_standard_panel()
//!     .at_time(NaiveTime::from_hms_opt(12, 30, 0).unwrap())
//!     .build();
//!
//! host.move_control("Reverser", 1.0);
//! assert_eq!(host.get("Reverser").unwrap(), 1.0);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveTime, TimeDelta};
use dsd_types::{DsdError, VehicleId, channels};
use tracing::{debug, warn};

use crate::alert::AlertActuator;
use crate::channels::ControlChannels;
use crate::pedal::{PedalEvent, PedalHandler, PedalSwitch};

/// Channels present on a typical cab, all starting at `0.0`.
const STANDARD_PANEL: &[&str] = &[
    "AWSReset",
    "Bell",
    "Horn",
    "Regulator",
    channels::REVERSER,
    "TrainBrakeControl",
    channels::EMERGENCY_BRAKE,
];

// ────────────────────────────────────────────────────────────────────────────
// Simulated host
// ────────────────────────────────────────────────────────────────────────────

struct HostState {
    values: BTreeMap<String, f32>,
    time: NaiveTime,
    vehicle: Option<VehicleId>,
    writes: Vec<(String, f32)>,
    failing: HashSet<String>,
    offline: bool,
}

/// A simulated vehicle host. Always shared behind an [`Arc`].
pub struct SimHost {
    state: Mutex<HostState>,
}

impl SimHost {
    /// Start building a simulated host.
    pub fn builder() -> SimHostBuilder {
        SimHostBuilder::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Driver-side control movement. Creates the channel if the panel does
    /// not have it yet. Not recorded as a write.
    pub fn move_control(&self, channel: &str, value: f32) {
        self.lock().values.insert(channel.to_string(), value);
    }

    /// Current value of `channel`, if present.
    pub fn value(&self, channel: &str) -> Option<f32> {
        self.lock().values.get(channel).copied()
    }

    /// Set the simulated clock.
    pub fn set_time(&self, time: NaiveTime) {
        self.lock().time = time;
    }

    /// Advance the simulated clock by `secs` (wrapping at midnight) and
    /// return the new time. Offsets beyond what a [`TimeDelta`] can hold
    /// leave the clock where it is.
    pub fn advance(&self, secs: i64) -> NaiveTime {
        let mut state = self.lock();
        match TimeDelta::try_seconds(secs) {
            Some(delta) => state.time += delta,
            None => warn!(secs, "clock offset out of range; clock unchanged"),
        }
        state.time
    }

    /// The simulated clock.
    pub fn time(&self) -> NaiveTime {
        self.lock().time
    }

    /// Replace the active vehicle (`None` unloads it).
    pub fn load_vehicle(&self, vehicle: Option<VehicleId>) {
        debug!(vehicle = ?vehicle, "sim host vehicle changed");
        self.lock().vehicle = vehicle;
    }

    /// Every `(channel, value)` written through [`ControlChannels::set`], in
    /// order.
    pub fn writes(&self) -> Vec<(String, f32)> {
        self.lock().writes.clone()
    }

    /// Number of writes performed on `channel`.
    pub fn writes_to(&self, channel: &str) -> usize {
        self.lock().writes.iter().filter(|(c, _)| c == channel).count()
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Make every subsequent get/set on `channel` fail.
    pub fn fail_channel(&self, channel: &str) {
        self.lock().failing.insert(channel.to_string());
    }

    /// Make every host call fail (`true`) or succeed again (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }
}

fn unavailable(channel: &str, details: &str) -> DsdError {
    DsdError::ChannelUnavailable {
        channel: channel.to_string(),
        details: details.to_string(),
    }
}

impl ControlChannels for SimHost {
    fn get(&self, channel: &str) -> Result<f32, DsdError> {
        let state = self.lock();
        if state.offline || state.failing.contains(channel) {
            return Err(unavailable(channel, "simulated failure"));
        }
        state
            .values
            .get(channel)
            .copied()
            .ok_or_else(|| unavailable(channel, "not exposed by this vehicle"))
    }

    fn set(&self, channel: &str, value: f32) -> Result<(), DsdError> {
        let mut state = self.lock();
        if state.offline || state.failing.contains(channel) {
            return Err(unavailable(channel, "simulated failure"));
        }
        if !state.values.contains_key(channel) {
            return Err(unavailable(channel, "not exposed by this vehicle"));
        }
        state.values.insert(channel.to_string(), value);
        state.writes.push((channel.to_string(), value));
        Ok(())
    }

    fn channel_names(&self) -> Result<Vec<String>, DsdError> {
        let state = self.lock();
        if state.offline {
            return Err(DsdError::HostUnavailable("simulated failure".into()));
        }
        Ok(state.values.keys().cloned().collect())
    }

    fn current_time(&self) -> Result<NaiveTime, DsdError> {
        let state = self.lock();
        if state.offline {
            return Err(DsdError::HostUnavailable("simulated failure".into()));
        }
        Ok(state.time)
    }

    fn vehicle_id(&self) -> Result<Option<VehicleId>, DsdError> {
        let state = self.lock();
        if state.offline {
            return Err(DsdError::HostUnavailable("simulated failure".into()));
        }
        Ok(state.vehicle.clone())
    }
}

/// Builder for [`SimHost`].
pub struct SimHostBuilder {
    values: BTreeMap<String, f32>,
    time: NaiveTime,
    vehicle: Option<VehicleId>,
}

impl Default for SimHostBuilder {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            time: NaiveTime::MIN,
            vehicle: None,
        }
    }
}

impl SimHostBuilder {
    /// Load `vendor.name` as the active vehicle.
    pub fn with_vehicle(mut self, vendor: impl Into<String>, name: impl Into<String>) -> Self {
        self.vehicle = Some(VehicleId::new(vendor, name));
        self
    }

    /// Expose `channel` with an initial `value`.
    pub fn with_channel(mut self, channel: impl Into<String>, value: f32) -> Self {
        self.values.insert(channel.into(), value);
        self
    }

    /// Expose the channels of a typical cab (reverser, regulator, brake,
    /// horn, bell, AWS reset and the default emergency brake).
    pub fn with_standard_panel(mut self) -> Self {
        for channel in STANDARD_PANEL {
            self.values.entry((*channel).to_string()).or_insert(0.0);
        }
        self
    }

    /// Start the simulated clock at `time`.
    pub fn at_time(mut self, time: NaiveTime) -> Self {
        self.time = time;
        self
    }

    pub fn build(self) -> Arc<SimHost> {
        Arc::new(SimHost {
            state: Mutex::new(HostState {
                values: self.values,
                time: self.time,
                vehicle: self.vehicle,
                writes: Vec::new(),
                failing: HashSet::new(),
                offline: false,
            }),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated pedal
// ────────────────────────────────────────────────────────────────────────────

/// A simulated foot switch. [`press`][Self::press] and
/// [`lift`][Self::lift] invoke the bound handler synchronously.
#[derive(Default)]
pub struct SimPedal {
    handler: Mutex<Option<PedalHandler>>,
}

impl SimPedal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn emit(&self, event: PedalEvent) {
        let handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        match handler.as_ref() {
            Some(handler) => handler(event),
            None => debug!(?event, "sim pedal edge with no binding"),
        }
    }

    pub fn press(&self) {
        self.emit(PedalEvent::Depressed);
    }

    pub fn lift(&self) {
        self.emit(PedalEvent::Released);
    }

    /// `true` while a handler is installed.
    pub fn is_bound(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl PedalSwitch for SimPedal {
    fn bind(&self, handler: PedalHandler) -> Result<(), DsdError> {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
        Ok(())
    }

    fn release(&self) -> Result<(), DsdError> {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated alert
// ────────────────────────────────────────────────────────────────────────────

/// A simulated alert that counts start/stop calls.
#[derive(Debug, Default)]
pub struct SimAlert {
    active: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl SimAlert {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of `start` calls so far.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls so far.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AlertActuator for SimAlert {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn set_records_writes_and_updates_value() {
        let host = SimHost::builder().with_standard_panel().build();
        host.set("EmergencyBrake", 1.0).unwrap();
        assert_eq!(host.value("EmergencyBrake"), Some(1.0));
        assert_eq!(host.writes(), vec![("EmergencyBrake".to_string(), 1.0)]);
        assert_eq!(host.writes_to("EmergencyBrake"), 1);
    }

    #[test]
    fn driver_movement_is_not_a_write() {
        let host = SimHost::builder().with_standard_panel().build();
        host.move_control("Reverser", 1.0);
        assert!(host.writes().is_empty());
        assert_eq!(host.get("Reverser").unwrap(), 1.0);
    }

    #[test]
    fn unknown_channel_is_unavailable() {
        let host = SimHost::builder().build();
        assert!(matches!(
            host.get("Bell"),
            Err(DsdError::ChannelUnavailable { .. })
        ));
        assert!(host.set("Bell", 1.0).is_err());
    }

    #[test]
    fn failing_channel_rejects_reads_and_writes() {
        let host = SimHost::builder().with_standard_panel().build();
        host.fail_channel("EmergencyBrake");
        assert!(host.get("EmergencyBrake").is_err());
        assert!(host.set("EmergencyBrake", 1.0).is_err());
        assert!(host.writes().is_empty());
    }

    #[test]
    fn offline_host_fails_every_query() {
        let host = SimHost::builder()
            .with_vehicle("RSC", "GEML")
            .with_standard_panel()
            .build();
        host.set_offline(true);
        assert!(host.vehicle_id().is_err());
        assert!(host.current_time().is_err());
        assert!(host.channel_names().is_err());
        host.set_offline(false);
        assert_eq!(host.vehicle_id().unwrap(), Some(VehicleId::new("RSC", "GEML")));
    }

    #[test]
    fn clock_advances_and_wraps_at_midnight() {
        let host = SimHost::builder()
            .at_time(NaiveTime::from_hms_opt(23, 59, 58).unwrap())
            .build();
        assert_eq!(host.advance(4), NaiveTime::from_hms_opt(0, 0, 2).unwrap());
        host.set_time(noon());
        assert_eq!(host.current_time().unwrap(), noon());
    }

    #[test]
    fn oversized_clock_offset_leaves_clock_unchanged() {
        let host = SimHost::builder().at_time(noon()).build();
        assert_eq!(host.advance(99_999_999_999_999_999), noon());
        assert_eq!(host.advance(i64::MIN), noon());
        assert_eq!(host.time(), noon());
    }

    #[test]
    fn vehicle_can_be_loaded_and_unloaded() {
        let host = SimHost::builder().build();
        assert_eq!(host.vehicle_id().unwrap(), None);
        host.load_vehicle(Some(VehicleId::new("DTG", "Class378Pack01")));
        assert!(host.vehicle_id().unwrap().is_some());
        host.load_vehicle(None);
        assert_eq!(host.vehicle_id().unwrap(), None);
    }

    #[test]
    fn sim_pedal_invokes_bound_handler_until_released() {
        let pedal = SimPedal::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        pedal
            .bind(Box::new(move |event| {
                if event == PedalEvent::Depressed {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .unwrap();

        pedal.press();
        pedal.lift();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        pedal.release().unwrap();
        assert!(!pedal.is_bound());
        pedal.press();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sim_alert_counts_calls() {
        let alert = SimAlert::new();
        alert.start();
        alert.start();
        assert!(alert.is_active());
        alert.stop();
        assert!(!alert.is_active());
        assert_eq!(alert.starts(), 2);
        assert_eq!(alert.stops(), 1);
    }
}
