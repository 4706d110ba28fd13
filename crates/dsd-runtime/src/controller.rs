//! [`SessionController`] – the synchronous half of a session.
//!
//! Owns the optional engine for the currently loaded vehicle and the
//! `needs_restart` flag. The async [`Session`][crate::session::Session]
//! feeds it one [`Input`] at a time from its loop task.

use chrono::NaiveTime;
use dsd_kernel::{BehaviorProfile, Dispatch, VigilanceEngine};
use dsd_middleware::EventBus;
use dsd_types::{Event, EventPayload, Input, VehicleId, VigilanceState};
use serde::Serialize;
use tracing::info;

const SOURCE: &str = "dsd-runtime::controller";

/// Point-in-time view of a session, for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub vehicle: Option<VehicleId>,
    pub profile: Option<String>,
    pub state: VigilanceState,
    pub deadline: Option<NaiveTime>,
    pub running: bool,
    pub needs_restart: bool,
}

pub struct SessionController {
    vehicle: Option<VehicleId>,
    engine: Option<VigilanceEngine>,
    needs_restart: bool,
    bus: Option<EventBus>,
}

impl SessionController {
    /// A controller with no vehicle loaded. It only waits for a vehicle
    /// change.
    pub fn idle() -> Self {
        Self {
            vehicle: None,
            engine: None,
            needs_restart: false,
            bus: None,
        }
    }

    /// A controller driving `engine` for `vehicle`.
    pub fn bound(vehicle: VehicleId, engine: VigilanceEngine) -> Self {
        Self {
            vehicle: Some(vehicle),
            engine: Some(engine),
            needs_restart: false,
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Route one input. A vehicle change only raises `needs_restart`; the
    /// engine never sees it.
    pub fn handle(&mut self, input: &Input) -> Dispatch {
        if let Input::VehicleChanged { new, old } = input {
            if !self.needs_restart {
                info!(old = ?old, new = ?new, "vehicle changed; session restart required");
                self.needs_restart = true;
                if let Some(bus) = &self.bus {
                    bus.publish(Event::new(
                        SOURCE,
                        EventPayload::RestartRequired {
                            vehicle: new.clone(),
                        },
                    ));
                }
            }
            return Dispatch::Ignored;
        }

        match self.engine.as_mut() {
            Some(engine) => engine.handle(input),
            None => Dispatch::Ignored,
        }
    }

    pub fn needs_restart(&self) -> bool {
        self.needs_restart
    }

    /// `true` while an engine is bound.
    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    /// Engine state, or `Inactive` when idle.
    pub fn state(&self) -> VigilanceState {
        self.engine
            .as_ref()
            .map(VigilanceEngine::state)
            .unwrap_or_default()
    }

    pub fn deadline(&self) -> Option<NaiveTime> {
        self.engine.as_ref().and_then(VigilanceEngine::deadline)
    }

    pub fn profile(&self) -> Option<&BehaviorProfile> {
        self.engine.as_ref().map(VigilanceEngine::profile)
    }

    pub fn profile_name(&self) -> Option<&str> {
        self.profile().map(BehaviorProfile::name)
    }

    pub fn vehicle(&self) -> Option<&VehicleId> {
        self.vehicle.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            vehicle: self.vehicle.clone(),
            profile: self.profile_name().map(str::to_string),
            state: self.state(),
            deadline: self.deadline(),
            running: self.is_running(),
            needs_restart: self.needs_restart,
        }
    }
}
