//! [`Session`] – one vehicle's worth of vigilance.
//!
//! A session binds the profile resolved for the currently loaded vehicle to
//! a [`VigilanceEngine`] and wires the event sources into it:
//!
//! ```text
//!  ChannelPoller ──┐
//!  PedalSwitch ────┼──► mpsc inbox ──► loop task ──► SessionController ──► VigilanceEngine
//!  Session::inject ┘                     (locks the controller per event)
//! ```
//!
//! The loop task is the only consumer of the inbox, so events are applied
//! strictly in arrival order.
//!
//! When the host reports a different vehicle the session does not rebind
//! itself; it raises [`Session::needs_restart`] and the owner (usually the
//! [`Supervisor`][crate::supervisor::Supervisor]) closes it and starts a
//! fresh one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::NaiveTime;
use dsd_hal::{AlertActuator, ControlChannels, PedalSwitch};
use dsd_kernel::{BehaviorProfile, ProfileResolver, Thresholds, Timing, VigilanceEngine};
use dsd_middleware::{ChannelPoller, EventBus, PollerHandle};
use dsd_types::{DsdError, Event, EventPayload, Input, VehicleId, VigilanceState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::controller::{SessionController, SessionStatus};

const SOURCE: &str = "dsd-runtime::session";

/// Tunables shared by every session a builder starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// How often the host is sampled.
    pub poll_interval: Duration,
    pub timing: Timing,
    pub thresholds: Thresholds,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timing: Timing::default(),
            thresholds: Thresholds::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Everything needed to start sessions against one host. Cheap to clone.
#[derive(Clone)]
pub struct SessionBuilder {
    host: Arc<dyn ControlChannels>,
    pedal: Arc<dyn PedalSwitch>,
    alert: Arc<dyn AlertActuator>,
    resolver: Arc<ProfileResolver>,
    settings: SessionSettings,
    bus: EventBus,
}

impl SessionBuilder {
    pub fn with_resolver(mut self, resolver: ProfileResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Start a session for whatever vehicle the host currently reports.
    ///
    /// # Errors
    ///
    /// Fails only when the host's vehicle identity cannot be queried or the
    /// pedal cannot be bound. Every other collaborator fault is logged and
    /// the session carries on.
    pub async fn start(&self) -> Result<Session, DsdError> {
        let vehicle = self.host.vehicle_id()?;
        let (inbox, rx) = mpsc::unbounded_channel();

        let Some(vehicle) = vehicle else {
            info!("no vehicle loaded; session idle");
            let poller = ChannelPoller::new(self.host.clone(), self.settings.poll_interval)
                .with_vehicle_baseline(None)
                .spawn(inbox.clone());
            let controller = SessionController::idle().with_bus(self.bus.clone());
            return Ok(Session::assemble(self, controller, inbox, rx, poller, false));
        };

        let profile = self.prepare_profile(&vehicle);
        for isolation in profile.isolations() {
            if !isolation.settle.is_zero() {
                debug!(settle_ms = isolation.settle.as_millis() as u64, "waiting before isolation");
                tokio::time::sleep(isolation.settle).await;
            }
            match isolation.apply(self.host.as_ref()) {
                Ok(()) => info!(
                    channel = %isolation.channel,
                    value = isolation.value,
                    "built-in vigilance device isolated"
                ),
                Err(e) => {
                    warn!(channel = %isolation.channel, error = %e, "isolation write failed");
                    self.publish(EventPayload::Fault {
                        component: isolation.channel.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut engine = VigilanceEngine::new(self.host.clone(), self.alert.clone(), profile.clone())
            .with_timing(self.settings.timing)
            .with_thresholds(self.settings.thresholds)
            .with_bus(self.bus.clone());
        engine.check_initial_reverser();

        let pedal_inbox = inbox.clone();
        let bound = self.pedal.bind(Box::new(move |event| {
            if pedal_inbox.send(event.into()).is_err() {
                debug!("pedal edge after session closed");
            }
        }));
        if let Err(e) = bound {
            self.alert.stop();
            return Err(e);
        }

        let mut poller = ChannelPoller::new(self.host.clone(), self.settings.poll_interval)
            .with_vehicle_baseline(Some(vehicle.clone()));
        poller.subscribe(profile.subscriptions());
        let poller = poller.spawn(inbox.clone());

        info!(vehicle = %vehicle, profile = profile.name(), "session started");
        self.publish(EventPayload::SessionStarted {
            vehicle: vehicle.clone(),
            profile: profile.name().to_string(),
        });

        let controller = SessionController::bound(vehicle, engine).with_bus(self.bus.clone());
        Ok(Session::assemble(self, controller, inbox, rx, poller, true))
    }

    /// Resolve the vehicle's profile and drop important channels the
    /// vehicle does not expose.
    fn prepare_profile(&self, vehicle: &VehicleId) -> BehaviorProfile {
        let profile = self.resolver.resolve(vehicle);
        match self.host.channel_names() {
            Ok(available) => {
                let pruned = profile.pruned_to(&available);
                for missing in profile
                    .important_channels()
                    .iter()
                    .filter(|c| !pruned.is_important(c))
                {
                    debug!(channel = %missing, vehicle = %vehicle, "vehicle lacks channel; not watched");
                }
                pruned
            }
            Err(e) => {
                warn!(error = %e, "channel list unavailable; watching full profile");
                profile
            }
        }
    }

    fn publish(&self, payload: EventPayload) {
        self.bus.publish(Event::new(SOURCE, payload));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// A running session. Call [`close`][Session::close] to tear it down.
pub struct Session {
    controller: Arc<Mutex<SessionController>>,
    inbox: mpsc::UnboundedSender<Input>,
    poller: PollerHandle,
    worker: JoinHandle<()>,
    pedal: Arc<dyn PedalSwitch>,
    alert: Arc<dyn AlertActuator>,
    pedal_bound: bool,
}

impl Session {
    /// Collect the collaborators for a new session.
    pub fn builder(
        host: Arc<dyn ControlChannels>,
        pedal: Arc<dyn PedalSwitch>,
        alert: Arc<dyn AlertActuator>,
    ) -> SessionBuilder {
        SessionBuilder {
            host,
            pedal,
            alert,
            resolver: Arc::new(ProfileResolver::builtin()),
            settings: SessionSettings::default(),
            bus: EventBus::default(),
        }
    }

    fn assemble(
        builder: &SessionBuilder,
        controller: SessionController,
        inbox: mpsc::UnboundedSender<Input>,
        rx: mpsc::UnboundedReceiver<Input>,
        poller: PollerHandle,
        pedal_bound: bool,
    ) -> Self {
        let controller = Arc::new(Mutex::new(controller));
        let worker = tokio::spawn(drive(controller.clone(), rx));
        Self {
            controller,
            inbox,
            poller,
            worker,
            pedal: builder.pedal.clone(),
            alert: builder.alert.clone(),
            pedal_bound,
        }
    }

    fn controller(&self) -> MutexGuard<'_, SessionController> {
        lock(&self.controller)
    }

    /// Queue an input as if it came from the poller or the pedal.
    pub fn inject(&self, input: Input) -> Result<(), DsdError> {
        self.inbox
            .send(input)
            .map_err(|e| DsdError::Channel(e.to_string()))
    }

    pub fn needs_restart(&self) -> bool {
        self.controller().needs_restart()
    }

    pub fn is_running(&self) -> bool {
        self.controller().is_running()
    }

    pub fn state(&self) -> VigilanceState {
        self.controller().state()
    }

    pub fn deadline(&self) -> Option<NaiveTime> {
        self.controller().deadline()
    }

    pub fn profile_name(&self) -> Option<String> {
        self.controller().profile_name().map(str::to_string)
    }

    /// The profile in force, after pruning.
    pub fn profile(&self) -> Option<BehaviorProfile> {
        self.controller().profile().cloned()
    }

    pub fn status(&self) -> SessionStatus {
        self.controller().status()
    }

    /// Unbind the pedal, stop the poller and drain the loop task, then
    /// silence the alert.
    ///
    /// The alert is stopped last: until the loop task has exited, a queued
    /// input can still move the engine into `NeedsAck` and restart it.
    pub async fn close(self) {
        if self.pedal_bound {
            if let Err(e) = self.pedal.release() {
                warn!(error = %e, "pedal release failed");
            }
        }
        self.poller.stop().await;
        drop(self.inbox);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "session loop ended abnormally");
        }
        self.alert.stop();
        info!("session closed");
    }
}

fn lock(controller: &Mutex<SessionController>) -> MutexGuard<'_, SessionController> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn drive(controller: Arc<Mutex<SessionController>>, mut rx: mpsc::UnboundedReceiver<Input>) {
    while let Some(input) = rx.recv().await {
        let dispatch = lock(&controller).handle(&input);
        trace!(?input, ?dispatch, "input dispatched");
    }
    debug!("session inbox closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsd_hal::{PedalHandler, SimAlert, SimHost, SimPedal};
    use dsd_middleware::Topic;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn fast() -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_millis(5),
            ..SessionSettings::default()
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..400 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    fn rig(
        host: Arc<SimHost>,
    ) -> (Arc<SimHost>, Arc<SimPedal>, Arc<SimAlert>, SessionBuilder) {
        let pedal = SimPedal::new();
        let alert = SimAlert::new();
        let builder = Session::builder(host.clone(), pedal.clone(), alert.clone()).with_settings(fast());
        (host, pedal, alert, builder)
    }

    fn geml() -> Arc<SimHost> {
        SimHost::builder()
            .with_vehicle("RSC", "GEML")
            .with_standard_panel()
            .with_channel("ThrottleAndBrake", 0.0)
            .at_time(at(12, 30, 0))
            .build()
    }

    struct BrokenPedal;

    impl PedalSwitch for BrokenPedal {
        fn bind(&self, _handler: PedalHandler) -> Result<(), DsdError> {
            Err(DsdError::PedalUnavailable("no device".into()))
        }

        fn release(&self) -> Result<(), DsdError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn no_vehicle_means_idle_until_one_loads() {
        let host = SimHost::builder().with_standard_panel().build();
        let (host, pedal, _alert, builder) = rig(host);

        let session = builder.start().await.unwrap();
        assert!(!session.is_running());
        assert!(!pedal.is_bound());
        assert_eq!(session.profile_name(), None);

        host.load_vehicle(Some(VehicleId::new("RSC", "GEML")));
        assert!(eventually(|| session.needs_restart()).await);
        session.close().await;
    }

    #[tokio::test]
    async fn engaged_reverser_at_start_demands_acknowledgement() {
        let host = geml();
        host.move_control("Reverser", 1.0);
        let (_host, pedal, alert, builder) = rig(host);

        let session = builder.start().await.unwrap();
        assert!(session.is_running());
        assert_eq!(session.state(), VigilanceState::NeedsAck);
        assert_eq!(session.deadline(), Some(at(12, 30, 6)));
        assert_eq!(session.profile_name().as_deref(), Some("class_360"));
        assert!(alert.is_active());
        assert!(pedal.is_bound());
        session.close().await;
    }

    #[tokio::test]
    async fn pedal_and_clock_drive_the_engine() {
        let (host, pedal, _alert, builder) = rig(geml());
        let session = builder.start().await.unwrap();

        host.move_control("Reverser", 1.0);
        assert!(eventually(|| session.state() == VigilanceState::NeedsAck).await);

        pedal.press();
        assert!(eventually(|| session.state() == VigilanceState::Confirmed).await);

        host.advance(60);
        assert!(eventually(|| session.state() == VigilanceState::NeedsAck).await);

        host.advance(6);
        assert!(eventually(|| host.writes_to("EmergencyBrake") >= 1).await);
        session.close().await;
    }

    #[tokio::test]
    async fn injected_inputs_reach_the_engine() {
        let (host, _pedal, _alert, builder) = rig(geml());
        let session = builder.start().await.unwrap();

        host.move_control("Reverser", 1.0);
        session
            .inject(Input::ChannelChanged {
                channel: "Reverser".into(),
                new: 1.0,
                old: Some(0.0),
            })
            .unwrap();
        session.inject(Input::PedalDepressed).unwrap();
        assert!(eventually(|| session.state() == VigilanceState::Confirmed).await);
        session.close().await;
    }

    #[tokio::test]
    async fn isolation_is_written_at_start() {
        let host = SimHost::builder()
            .with_vehicle("DTG", "Class378Pack01")
            .with_standard_panel()
            .with_channel("DSD", 1.0)
            .build();
        let (host, _pedal, _alert, builder) = rig(host);

        let session = builder.start().await.unwrap();
        assert_eq!(host.value("DSD"), Some(0.0));
        assert_eq!(host.writes_to("DSD"), 1);
        session.close().await;
    }

    #[tokio::test]
    async fn missing_channels_are_pruned_from_the_profile() {
        let host = SimHost::builder()
            .with_vehicle("Nobody", "Generic")
            .with_channel("Reverser", 0.0)
            .with_channel("Horn", 0.0)
            .with_channel("EmergencyBrake", 0.0)
            .build();
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let (_host, _pedal, _alert, builder) = rig(host);

        let session = builder.with_bus(bus).start().await.unwrap();
        assert_eq!(session.profile_name().as_deref(), Some("generic"));
        let profile = session.profile().unwrap();
        assert_eq!(profile.important_channels(), ["Horn", "Reverser"]);
        assert!(matches!(
            alerts.try_recv().map(|e| e.payload),
            Some(EventPayload::SessionStarted { profile, .. }) if profile == "generic"
        ));
        session.close().await;
    }

    #[tokio::test]
    async fn config_override_selects_profile() {
        let host = SimHost::builder()
            .with_vehicle("DTG", "Class 325")
            .with_standard_panel()
            .with_channel("DSDIsolate", 0.0)
            .build();
        let (host, _pedal, _alert, builder) = rig(host);
        let resolver = ProfileResolver::builtin()
            .with_overrides([(VehicleId::new("DTG", "Class 325"), "class_325")])
            .unwrap();

        let session = builder.with_resolver(resolver).start().await.unwrap();
        assert_eq!(session.profile_name().as_deref(), Some("class_325"));
        assert_eq!(host.value("DSDIsolate"), Some(1.0));
        session.close().await;
    }

    #[tokio::test]
    async fn close_releases_everything() {
        let host = geml();
        host.move_control("Reverser", 1.0);
        let (_host, pedal, alert, builder) = rig(host);

        let session = builder.start().await.unwrap();
        assert!(alert.is_active());
        session.close().await;

        assert!(!alert.is_active());
        assert!(!pedal.is_bound());
    }

    #[tokio::test]
    async fn close_silences_alert_raised_by_a_queued_input() {
        let (host, pedal, alert, builder) = rig(geml());
        let session = builder.start().await.unwrap();
        assert!(!alert.is_active());

        host.move_control("Reverser", 1.0);
        session
            .inject(Input::ChannelChanged {
                channel: "Reverser".into(),
                new: 1.0,
                old: Some(0.0),
            })
            .unwrap();
        session.close().await;

        assert!(!alert.is_active());
        assert!(!pedal.is_bound());
    }

    #[tokio::test]
    async fn every_isolation_modifier_is_written_in_order() {
        let host = SimHost::builder()
            .with_vehicle("Nobody", "Twin")
            .with_standard_panel()
            .with_channel("DSD", 1.0)
            .with_channel("VigilOff", 0.0)
            .build();
        let default = BehaviorProfile::new("twin")
            .with_important(["Horn"])
            .with_isolation("DSD", 0.0, Duration::ZERO)
            .with_isolation("VigilOff", 1.0, Duration::ZERO);
        let (host, _pedal, _alert, builder) = rig(host);

        let session = builder
            .with_resolver(ProfileResolver::new(Default::default(), default))
            .start()
            .await
            .unwrap();
        assert_eq!(
            host.writes(),
            vec![("DSD".to_string(), 0.0), ("VigilOff".to_string(), 1.0)]
        );
        session.close().await;
    }

    #[tokio::test]
    async fn unreadable_vehicle_identity_fails_start() {
        let host = geml();
        host.set_offline(true);
        let (_host, _pedal, _alert, builder) = rig(host);
        assert!(matches!(
            builder.start().await,
            Err(DsdError::HostUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn unbindable_pedal_fails_start() {
        let builder = Session::builder(geml(), Arc::new(BrokenPedal), SimAlert::new());
        assert!(matches!(
            builder.start().await,
            Err(DsdError::PedalUnavailable(_))
        ));
    }
}
