use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Well-known channel names shared by most vehicles.
pub mod channels {
    /// Reverser handle position. Magnitude below the neutral band means
    /// "not engaged".
    pub const REVERSER: &str = "Reverser";
    /// Default emergency-stop channel.
    pub const EMERGENCY_BRAKE: &str = "EmergencyBrake";
    /// Emergency-stop channel used by some multiple-unit vehicles.
    pub const EMERGENCY_STOP: &str = "EmergencyStop";
    /// Combined power/brake handle, used as the drift target on vehicles
    /// whose panel only reports clock changes.
    pub const THROTTLE_AND_BRAKE: &str = "ThrottleAndBrake";
}

/// Vigilance state of the driver's safety device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VigilanceState {
    /// Reverser in neutral (or off). Initial state.
    #[default]
    Inactive,
    /// The driver must depress the pedal within the short window.
    NeedsAck,
    /// The pedal is held; the long window is running.
    Confirmed,
}

impl fmt::Display for VigilanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VigilanceState::Inactive => write!(f, "inactive"),
            VigilanceState::NeedsAck => write!(f, "needs_ack"),
            VigilanceState::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Two-part vehicle identity reported by the host: the vendor and the
/// vehicle (pack) name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId {
    pub vendor: String,
    pub name: String,
}

impl VehicleId {
    pub fn new(vendor: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            name: name.into(),
        }
    }

    /// Parse the `"Vendor.Name"` form used in configuration files. The
    /// vendor ends at the first dot; the name may itself contain dots.
    pub fn parse(key: &str) -> Option<Self> {
        let (vendor, name) = key.split_once('.')?;
        if vendor.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(vendor, name))
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.vendor, self.name)
    }
}

/// Inbound event delivered to the vigilance engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Input {
    /// A subscribed channel changed value. `old` is `None` on the first
    /// observation after subscribing.
    ChannelChanged {
        channel: String,
        new: f32,
        old: Option<f32>,
    },
    /// The host's simulated clock advanced.
    Tick {
        now: NaiveTime,
        previous: Option<NaiveTime>,
    },
    PedalDepressed,
    PedalReleased,
    /// The host's active vehicle changed (including loaded/unloaded).
    VehicleChanged {
        new: Option<VehicleId>,
        old: Option<VehicleId>,
    },
}

/// Outbound notification published on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "dsd-kernel::engine"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current wall-clock time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    StateChanged {
        from: VigilanceState,
        to: VigilanceState,
    },
    EmergencyStop {
        channel: String,
    },
    /// An important control was moved and the long window restarted.
    DeadlineReset {
        deadline: NaiveTime,
    },
    SessionStarted {
        vehicle: VehicleId,
        profile: String,
    },
    RestartRequired {
        vehicle: Option<VehicleId>,
    },
    Fault {
        component: String,
        message: String,
    },
}

/// Error type spanning host channel failures, pedal binding and
/// configuration problems.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DsdError {
    #[error("Channel {channel} unavailable: {details}")]
    ChannelUnavailable { channel: String, details: String },

    #[error("Host unavailable: {0}")]
    HostUnavailable(String),

    #[error("Pedal unavailable: {0}")]
    PedalUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event channel error: {0}")]
    Channel(String),
}
