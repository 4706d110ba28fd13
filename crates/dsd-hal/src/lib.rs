//! `dsd-hal` – Host & Hardware Abstraction
//!
//! Narrow interfaces to everything the vigilance core does not own: the
//! host simulation's control channels, the foot-pedal switch, and the audio
//! alert.
//!
//! # Modules
//!
//! - [`channels`] – [`ControlChannels`][channels::ControlChannels]: channel
//!   get/set, the simulated clock and the active vehicle identity.
//! - [`pedal`] – [`PedalSwitch`][pedal::PedalSwitch]: depress/release
//!   notifications from the physical switch.
//! - [`alert`] – [`AlertActuator`][alert::AlertActuator]: idempotent
//!   start/stop of the audible warning, plus a log-only implementation.
//! - [`sim`] – in-process [`SimHost`][sim::SimHost],
//!   [`SimPedal`][sim::SimPedal] and [`SimAlert`][sim::SimAlert] for tests
//!   and the interactive console.

pub mod alert;
pub mod channels;
pub mod pedal;
pub mod sim;

pub use alert::{AlertActuator, TracingAlert};
pub use channels::ControlChannels;
pub use pedal::{PedalEvent, PedalHandler, PedalSwitch};
pub use sim::{SimAlert, SimHost, SimHostBuilder, SimPedal};
