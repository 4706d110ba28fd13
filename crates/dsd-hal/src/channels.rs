//! Generic `ControlChannels` trait for exchanging control values with the
//! host vehicle simulation.
//!
//! The vigilance core reads the reverser, writes the emergency-stop and
//! isolation channels, and observes the simulated clock and the active
//! vehicle exclusively through this trait, so a host link can be swapped
//! without touching the state machine.

use chrono::NaiveTime;
use dsd_types::{DsdError, VehicleId};

/// A host exposing named numeric control channels.
///
/// Implementations are shared between the poller and the engine, so every
/// method takes `&self`; use interior mutability where state is kept.
pub trait ControlChannels: Send + Sync {
    /// Return the current value of `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`DsdError::ChannelUnavailable`] if the vehicle does not expose
    /// the channel or the host cannot be reached.
    fn get(&self, channel: &str) -> Result<f32, DsdError>;

    /// Write `value` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`DsdError::ChannelUnavailable`] if the write cannot be applied.
    fn set(&self, channel: &str, value: f32) -> Result<(), DsdError>;

    /// Names of every channel the active vehicle exposes.
    fn channel_names(&self) -> Result<Vec<String>, DsdError>;

    /// The host's simulated time of day.
    fn current_time(&self) -> Result<NaiveTime, DsdError>;

    /// The active vehicle, or `None` when nothing is loaded.
    fn vehicle_id(&self) -> Result<Option<VehicleId>, DsdError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Minimal in-process panel used only for tests.
    struct FixedPanel {
        values: Mutex<HashMap<String, f32>>,
    }

    impl ControlChannels for FixedPanel {
        fn get(&self, channel: &str) -> Result<f32, DsdError> {
            self.values
                .lock()
                .unwrap()
                .get(channel)
                .copied()
                .ok_or_else(|| DsdError::ChannelUnavailable {
                    channel: channel.to_string(),
                    details: "not exposed".to_string(),
                })
        }

        fn set(&self, channel: &str, value: f32) -> Result<(), DsdError> {
            self.values.lock().unwrap().insert(channel.to_string(), value);
            Ok(())
        }

        fn channel_names(&self) -> Result<Vec<String>, DsdError> {
            Ok(self.values.lock().unwrap().keys().cloned().collect())
        }

        fn current_time(&self) -> Result<NaiveTime, DsdError> {
            Ok(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
        }

        fn vehicle_id(&self) -> Result<Option<VehicleId>, DsdError> {
            Ok(None)
        }
    }

    #[test]
    fn trait_object_get_and_set() {
        let panel: Box<dyn ControlChannels> = Box::new(FixedPanel {
            values: Mutex::new(HashMap::new()),
        });
        assert!(panel.get("Reverser").is_err());

        panel.set("Reverser", 1.0).unwrap();
        assert!((panel.get("Reverser").unwrap() - 1.0).abs() < f32::EPSILON);
        assert_eq!(panel.channel_names().unwrap(), vec!["Reverser".to_string()]);
    }
}
