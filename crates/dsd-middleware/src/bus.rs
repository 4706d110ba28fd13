//! Headless, typed, topic-based broadcast bus for outbound notifications.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the vigilance engine. Publishing never blocks and never fails because
//! nobody is listening.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::StateTransitions`] | State changes and deadline resets |
//! | [`Topic::Actuation`] | Emergency-stop commands |
//! | [`Topic::SystemAlerts`] | Session lifecycle and collaborator faults |
//!
//! Every event is also copied onto a global channel ([`EventBus::subscribe`])
//! for observers that want the whole stream.

use dsd_types::{Event, EventPayload};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// State changes and deadline resets.
    StateTransitions,
    /// Emergency-stop commands issued to the host.
    Actuation,
    /// Session lifecycle and collaborator faults.
    SystemAlerts,
}

impl Topic {
    /// The lane an event belongs on, derived from its payload.
    pub fn for_payload(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::StateChanged { .. } | EventPayload::DeadlineReset { .. } => {
                Topic::StateTransitions
            }
            EventPayload::EmergencyStop { .. } => Topic::Actuation,
            EventPayload::SessionStarted { .. }
            | EventPayload::RestartRequired { .. }
            | EventPayload::Fault { .. } => Topic::SystemAlerts,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    all: broadcast::Sender<Event>,
    state_transitions: broadcast::Sender<Event>,
    actuation: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every channel independently and is
    /// raised to 1 if zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (all, _) = broadcast::channel(capacity);
        let (state_transitions, _) = broadcast::channel(capacity);
        let (actuation, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            all,
            state_transitions,
            actuation,
            system_alerts,
        }
    }

    /// Publish `event` on the lane matching its payload and on the global
    /// channel.
    ///
    /// Returns the number of receivers handed the event. `0` means nobody is
    /// listening, which is a normal condition.
    pub fn publish(&self, event: Event) -> usize {
        let topic = Topic::for_payload(&event.payload);
        let on_topic = self.topic_sender(topic).send(event.clone()).unwrap_or(0);
        let on_all = self.all.send(event).unwrap_or(0);
        on_topic + on_all
    }

    /// Subscribe to a specific [`Topic`] lane.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic: Some(topic),
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to every event regardless of topic.
    pub fn subscribe(&self) -> TopicReceiver {
        TopicReceiver {
            topic: None,
            receiver: self.all.subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::StateTransitions => &self.state_transitions,
            Topic::Actuation => &self.actuation,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// A receiver bound to one [`Topic`] lane, or to the global channel.
pub struct TopicReceiver {
    topic: Option<Topic>,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event.
    ///
    /// Lagging is logged and skipped; returns `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "event bus receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "event bus receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to (`None` for the global
    /// channel).
    pub fn topic(&self) -> Option<Topic> {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsd_types::VigilanceState;

    fn state_change() -> Event {
        Event::new(
            "dsd-kernel::engine",
            EventPayload::StateChanged {
                from: VigilanceState::Inactive,
                to: VigilanceState::NeedsAck,
            },
        )
    }

    fn stop() -> Event {
        Event::new(
            "dsd-kernel::engine",
            EventPayload::EmergencyStop {
                channel: "EmergencyBrake".to_string(),
            },
        )
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(state_change()), 0);
    }

    #[test]
    fn zero_capacity_bus_still_delivers() {
        let bus = EventBus::new(0);
        let mut all = bus.subscribe();
        assert_eq!(bus.publish(stop()), 1);
        assert!(all.try_recv().is_some());
    }

    #[test]
    fn payloads_route_to_expected_topics() {
        assert_eq!(
            Topic::for_payload(&state_change().payload),
            Topic::StateTransitions
        );
        assert_eq!(Topic::for_payload(&stop().payload), Topic::Actuation);
        assert_eq!(
            Topic::for_payload(&EventPayload::RestartRequired { vehicle: None }),
            Topic::SystemAlerts
        );
    }

    #[tokio::test]
    async fn topic_subscriber_receives_matching_event() {
        let bus = EventBus::default();
        let mut actuation = bus.subscribe_to(Topic::Actuation);

        let event = stop();
        assert_eq!(bus.publish(event.clone()), 1);

        let received = actuation.recv().await.expect("actuation event");
        assert_eq!(received.id, event.id);
        assert_eq!(actuation.topic(), Some(Topic::Actuation));
    }

    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);

        bus.publish(state_change());

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), alerts.recv()).await;
        assert!(result.is_err(), "SystemAlerts must not see a state change");
    }

    #[tokio::test]
    async fn global_subscriber_sees_every_topic() {
        let bus = EventBus::default();
        let mut all = bus.subscribe();

        bus.publish(state_change());
        bus.publish(stop());

        assert!(matches!(
            all.recv().await.map(|e| e.payload),
            Some(EventPayload::StateChanged { .. })
        ));
        assert!(matches!(
            all.recv().await.map(|e| e.payload),
            Some(EventPayload::EmergencyStop { .. })
        ));
        assert!(all.try_recv().is_none());
    }

    #[tokio::test]
    async fn slow_subscriber_skips_lagged_events() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe_to(Topic::Actuation);
        for _ in 0..20 {
            bus.publish(stop());
        }
        // Lag is absorbed; the newest buffered events are still delivered.
        assert!(slow.recv().await.is_some());
    }
}
