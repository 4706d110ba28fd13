//! [`BehaviorProfile`] – per-vehicle vigilance behavior.
//!
//! A profile is plain data: which channels count as proof of attentiveness,
//! where to send the emergency-stop command, and an ordered list of
//! [`Modifier`]s that the engine applies at fixed lifecycle points:
//!
//! - [`Isolation`] – once, at bind time, before any channel is observed:
//!   switch off the vehicle's own vigilance device so only this engine can
//!   command a stop.
//! - [`Drift`] – on every clock tick, before the deadline is evaluated:
//!   nudge a channel by a tiny random step for panels that otherwise report
//!   nothing but the clock.
//!
//! New vehicle quirks are new data or new modifier variants; there is no
//! profile hierarchy.

use std::time::Duration;

use dsd_hal::ControlChannels;
use dsd_types::{DsdError, channels};
use rand::Rng;

/// Perturbation applied by [`Drift`], as a fraction of full scale.
pub const DRIFT_STEP: f32 = 0.001;

// ────────────────────────────────────────────────────────────────────────────
// Modifiers
// ────────────────────────────────────────────────────────────────────────────

/// Disable a competing built-in vigilance device by writing a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Isolation {
    /// The built-in device's enable/isolate channel.
    pub channel: String,
    /// Value that takes the built-in device out of service.
    pub value: f32,
    /// Delay before the write, letting the vehicle finish its own start-up.
    pub settle: Duration,
}

impl Isolation {
    /// Write the isolation value. The settle delay is the caller's
    /// responsibility.
    pub fn apply(&self, host: &dyn ControlChannels) -> Result<(), DsdError> {
        host.set(&self.channel, self.value)
    }
}

/// Nudge a channel by ±`step` on every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Drift {
    pub channel: String,
    pub step: f32,
}

impl Drift {
    /// Read the channel, add or subtract `step` at random, write it back and
    /// return the written value.
    pub fn apply<R: Rng>(
        &self,
        host: &dyn ControlChannels,
        rng: &mut R,
    ) -> Result<f32, DsdError> {
        let current = host.get(&self.channel)?;
        let next = if rng.gen_bool(0.5) {
            current + self.step
        } else {
            current - self.step
        };
        host.set(&self.channel, next)?;
        Ok(next)
    }
}

/// A capability modifier attached to a profile.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Isolation(Isolation),
    Drift(Drift),
}

// ────────────────────────────────────────────────────────────────────────────
// Thresholds
// ────────────────────────────────────────────────────────────────────────────

/// Channel-value predicates, as fractions of full scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Reverser magnitudes strictly below this are neutral.
    pub neutral_band: f32,
    /// Important-channel deltas strictly above this are deliberate.
    pub movement: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            neutral_band: 0.5,
            movement: 0.1,
        }
    }
}

impl Thresholds {
    /// `true` when a reverser at `value` is in the neutral band.
    pub fn is_neutral(&self, value: f32) -> bool {
        value.abs() < self.neutral_band
    }

    /// `true` when a change from `old` to `new` is a deliberate movement.
    /// A change from an unknown value never is.
    pub fn is_deliberate(&self, new: f32, old: Option<f32>) -> bool {
        match old {
            Some(old) => (new - old).abs() > self.movement,
            None => false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BehaviorProfile
// ────────────────────────────────────────────────────────────────────────────

/// Immutable per-vehicle behavior descriptor.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use dsd_kernel::profile::BehaviorProfile;
///
/// let profile = BehaviorProfile::new("class_66_ap")
///     .with_important(["AWSReset", "Horn", "Reverser"])
///     .with_isolation("DSDIsolation", 1.0, Duration::from_secs(2));
///
/// assert!(profile.is_important("Horn"));
/// assert_eq!(profile.stop_channel(), "EmergencyBrake");
/// assert!(profile.isolations().next().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorProfile {
    name: String,
    important_channels: Vec<String>,
    stop_channel: String,
    modifiers: Vec<Modifier>,
}

impl BehaviorProfile {
    /// A profile with no important channels, the default stop channel and
    /// no modifiers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            important_channels: Vec::new(),
            stop_channel: channels::EMERGENCY_BRAKE.to_string(),
            modifiers: Vec::new(),
        }
    }

    /// Add `channels` to the important set. Duplicates are ignored.
    pub fn with_important<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for channel in channels {
            let channel = channel.into();
            if !self.important_channels.contains(&channel) {
                self.important_channels.push(channel);
            }
        }
        self
    }

    pub fn with_stop_channel(mut self, channel: impl Into<String>) -> Self {
        self.stop_channel = channel.into();
        self
    }

    pub fn with_isolation(mut self, channel: impl Into<String>, value: f32, settle: Duration) -> Self {
        self.modifiers.push(Modifier::Isolation(Isolation {
            channel: channel.into(),
            value,
            settle,
        }));
        self
    }

    pub fn with_drift(mut self, channel: impl Into<String>) -> Self {
        self.modifiers.push(Modifier::Drift(Drift {
            channel: channel.into(),
            step: DRIFT_STEP,
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn important_channels(&self) -> &[String] {
        &self.important_channels
    }

    pub fn stop_channel(&self) -> &str {
        &self.stop_channel
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn is_important(&self, channel: &str) -> bool {
        self.important_channels.iter().any(|c| c == channel)
    }

    /// Isolation modifiers, in declaration order.
    pub fn isolations(&self) -> impl Iterator<Item = &Isolation> {
        self.modifiers.iter().filter_map(|m| match m {
            Modifier::Isolation(i) => Some(i),
            Modifier::Drift(_) => None,
        })
    }

    /// Drift modifiers, in declaration order.
    pub fn drifts(&self) -> impl Iterator<Item = &Drift> {
        self.modifiers.iter().filter_map(|m| match m {
            Modifier::Drift(d) => Some(d),
            Modifier::Isolation(_) => None,
        })
    }

    /// Channels a session must observe: the important set plus the
    /// reverser.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut subscribed = self.important_channels.clone();
        if !self.is_important(channels::REVERSER) {
            subscribed.push(channels::REVERSER.to_string());
        }
        subscribed
    }

    /// A copy whose important set only keeps channels in `available`.
    pub fn pruned_to(&self, available: &[String]) -> Self {
        let mut pruned = self.clone();
        pruned
            .important_channels
            .retain(|c| available.iter().any(|a| a == c));
        pruned
    }
}
