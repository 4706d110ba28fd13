//! [`VigilanceEngine`] – the driver-vigilance state machine.
//!
//! The engine consumes [`Input`] events one at a time and drives three
//! states:
//!
//! | From | Trigger | Guard | Action | To |
//! |---|---|---|---|---|
//! | `Inactive` | reverser moved | reverser off neutral | | `NeedsAck` |
//! | `NeedsAck` | pedal depressed | | | `Confirmed` |
//! | `NeedsAck` | tick past deadline | | emergency stop | `NeedsAck` |
//! | `Confirmed` | pedal released | reverser off neutral | emergency stop | `NeedsAck` |
//! | `Confirmed` | reverser moved | reverser in neutral | | `Inactive` |
//! | `Confirmed` | important control moved | deliberate | deadline reset | `Confirmed` |
//! | `Confirmed` | tick past deadline | | | `NeedsAck` |
//!
//! Anything else is ignored and leaves both state and deadline untouched.
//!
//! Entering `NeedsAck` starts the alert and arms the short window; entering
//! `Confirmed` silences it and arms the long window; entering `Inactive`
//! clears the deadline.
//!
//! The reverser is always read live from the host. An unreadable reverser
//! counts as off neutral, so a host fault can only ever demand more
//! attention from the driver, never less.

use std::sync::Arc;

use chrono::NaiveTime;
use dsd_hal::{AlertActuator, ControlChannels};
use dsd_middleware::EventBus;
use dsd_types::{Event, EventPayload, Input, VigilanceState, channels};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::profile::{BehaviorProfile, Thresholds};
use crate::timing::{Timing, deadline_reached};

const SOURCE: &str = "dsd-kernel::engine";

/// Outcome of [`VigilanceEngine::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No rule matched; state and deadline are unchanged.
    Ignored,
    /// A rule matched without a state change (deadline reset).
    Handled,
    /// The engine (re-)entered `to`. `from == to` for the `NeedsAck`
    /// timeout self-loop.
    Transition {
        from: VigilanceState,
        to: VigilanceState,
    },
}

impl Dispatch {
    pub fn is_transition(&self) -> bool {
        matches!(self, Dispatch::Transition { .. })
    }
}

/// The vigilance state machine bound to one vehicle.
///
/// # Example
///
/// ```
/// use dsd_hal::{SimAlert, SimHost};
/// use dsd_kernel::engine::{Dispatch, VigilanceEngine};
/// use dsd_kernel::profile::BehaviorProfile;
/// use dsd_types::{Input, VigilanceState};
///
/// let host = SimHost::builder().with_standard_panel().build();
/// let alert = SimAlert::new();
/// let mut engine = VigilanceEngine::new(host.clone(), alert.clone(), BehaviorProfile::new("p"));
///
/// host.move_control("Reverser", 1.0);
/// let dispatch = engine.handle(&Input::ChannelChanged {
///     channel: "Reverser".into(),
///     new: 1.0,
///     old: Some(0.0),
/// });
/// assert!(dispatch.is_transition());
/// assert_eq!(engine.state(), VigilanceState::NeedsAck);
/// ```
pub struct VigilanceEngine {
    host: Arc<dyn ControlChannels>,
    alert: Arc<dyn AlertActuator>,
    profile: BehaviorProfile,
    timing: Timing,
    thresholds: Thresholds,
    bus: Option<EventBus>,
    rng: StdRng,
    state: VigilanceState,
    deadline: Option<NaiveTime>,
    last_tick: Option<NaiveTime>,
}

impl VigilanceEngine {
    /// A new engine in `Inactive` with default timing and thresholds.
    pub fn new(
        host: Arc<dyn ControlChannels>,
        alert: Arc<dyn AlertActuator>,
        profile: BehaviorProfile,
    ) -> Self {
        Self {
            host,
            alert,
            profile,
            timing: Timing::default(),
            thresholds: Thresholds::default(),
            bus: None,
            rng: StdRng::from_entropy(),
            state: VigilanceState::Inactive,
            deadline: None,
            last_tick: None,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Publish transitions, stop commands and faults on `bus`.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Seed the drift generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> VigilanceState {
        self.state
    }

    pub fn deadline(&self) -> Option<NaiveTime> {
        self.deadline
    }

    pub fn profile(&self) -> &BehaviorProfile {
        &self.profile
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Most recent simulated time seen on a tick.
    pub fn last_tick(&self) -> Option<NaiveTime> {
        self.last_tick
    }

    /// Demand acknowledgement straight away if the reverser is already off
    /// neutral when the engine is bound.
    pub fn check_initial_reverser(&mut self) -> Dispatch {
        if self.state == VigilanceState::Inactive && !self.reverser_neutral() {
            let now = self.now();
            return self.transition(VigilanceState::NeedsAck, now);
        }
        Dispatch::Ignored
    }

    /// Apply one input to the state machine.
    pub fn handle(&mut self, input: &Input) -> Dispatch {
        match input {
            Input::ChannelChanged { channel, new, old } => {
                self.on_channel_changed(channel, *new, *old)
            }
            Input::Tick { now, .. } => self.on_tick(*now),
            Input::PedalDepressed => self.on_pedal_depressed(),
            Input::PedalReleased => self.on_pedal_released(),
            // Vehicle changes are the session's concern.
            Input::VehicleChanged { .. } => Dispatch::Ignored,
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Triggers
    // ────────────────────────────────────────────────────────────────────────

    fn on_channel_changed(&mut self, channel: &str, new: f32, old: Option<f32>) -> Dispatch {
        let mut dispatch = Dispatch::Ignored;

        if self.state == VigilanceState::Confirmed
            && self.profile.is_important(channel)
            && self.thresholds.is_deliberate(new, old)
        {
            let deadline = self.timing.confirm_deadline(self.now());
            self.deadline = Some(deadline);
            debug!(channel, %deadline, "important control moved; deadline reset");
            self.publish(EventPayload::DeadlineReset { deadline });
            dispatch = Dispatch::Handled;
        }

        if channel == channels::REVERSER {
            match self.state {
                VigilanceState::Inactive if !self.reverser_neutral() => {
                    let now = self.now();
                    dispatch = self.transition(VigilanceState::NeedsAck, now);
                }
                VigilanceState::Confirmed if self.reverser_neutral() => {
                    let now = self.now();
                    dispatch = self.transition(VigilanceState::Inactive, now);
                }
                _ => {}
            }
        }

        dispatch
    }

    fn on_tick(&mut self, now: NaiveTime) -> Dispatch {
        self.last_tick = Some(now);

        for drift in self.profile.drifts() {
            if let Err(e) = drift.apply(self.host.as_ref(), &mut self.rng) {
                debug!(channel = %drift.channel, error = %e, "drift write failed");
            }
        }

        let Some(deadline) = self.deadline else {
            return Dispatch::Ignored;
        };
        if !deadline_reached(now, deadline) {
            return Dispatch::Ignored;
        }

        match self.state {
            VigilanceState::NeedsAck => {
                warn!(%deadline, %now, "acknowledgement window expired");
                self.issue_stop();
                self.transition(VigilanceState::NeedsAck, now)
            }
            VigilanceState::Confirmed => {
                info!(%deadline, %now, "no control activity; acknowledgement required");
                self.transition(VigilanceState::NeedsAck, now)
            }
            VigilanceState::Inactive => Dispatch::Ignored,
        }
    }

    fn on_pedal_depressed(&mut self) -> Dispatch {
        match self.state {
            VigilanceState::NeedsAck => {
                let now = self.now();
                self.transition(VigilanceState::Confirmed, now)
            }
            _ => Dispatch::Ignored,
        }
    }

    fn on_pedal_released(&mut self) -> Dispatch {
        if self.state != VigilanceState::Confirmed || self.reverser_neutral() {
            return Dispatch::Ignored;
        }
        warn!("pedal released with reverser engaged");
        self.issue_stop();
        let now = self.now();
        self.transition(VigilanceState::NeedsAck, now)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Actions
    // ────────────────────────────────────────────────────────────────────────

    fn transition(&mut self, to: VigilanceState, now: NaiveTime) -> Dispatch {
        let from = self.state;
        self.state = to;
        match to {
            VigilanceState::NeedsAck => {
                self.alert.start();
                self.deadline = Some(self.timing.ack_deadline(now));
            }
            VigilanceState::Confirmed => {
                self.alert.stop();
                self.deadline = Some(self.timing.confirm_deadline(now));
            }
            VigilanceState::Inactive => {
                self.deadline = None;
            }
        }
        info!(
            from = %from,
            to = %to,
            deadline = ?self.deadline,
            profile = self.profile.name(),
            "vigilance state entered"
        );
        self.publish(EventPayload::StateChanged { from, to });
        Dispatch::Transition { from, to }
    }

    fn issue_stop(&mut self) {
        let channel = self.profile.stop_channel().to_string();
        match self.host.set(&channel, 1.0) {
            Ok(()) => {
                warn!(channel = %channel, "emergency stop commanded");
                self.publish(EventPayload::EmergencyStop { channel });
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "emergency stop write failed");
                self.publish(EventPayload::Fault {
                    component: channel,
                    message: e.to_string(),
                });
            }
        }
    }

    fn publish(&self, payload: EventPayload) {
        if let Some(bus) = &self.bus {
            bus.publish(Event::new(SOURCE, payload));
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Host queries
    // ────────────────────────────────────────────────────────────────────────

    fn reverser_neutral(&self) -> bool {
        match self.host.get(channels::REVERSER) {
            Ok(value) => self.thresholds.is_neutral(value),
            Err(e) => {
                warn!(error = %e, "reverser unreadable; treating as engaged");
                false
            }
        }
    }

    /// Live host time, falling back to the last tick, then to midnight.
    fn now(&self) -> NaiveTime {
        match self.host.current_time() {
            Ok(now) => now,
            Err(e) => match self.last_tick {
                Some(tick) => {
                    debug!(error = %e, "clock unreadable; using last tick");
                    tick
                }
                None => {
                    warn!(error = %e, "clock unreadable and no tick seen; using midnight");
                    NaiveTime::MIN
                }
            },
        }
    }
}
