//! `dsd-middleware` – Event Plumbing
//!
//! Moves data between the host, the vigilance core and observers without
//! caring about its meaning.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based broadcast bus for outbound notifications
//!   (state changes, stop commands, faults), built on Tokio broadcast
//!   channels.
//! - [`poller`] – [`ChannelPoller`]: polls a
//!   [`ControlChannels`][dsd_hal::ControlChannels] host at a fixed interval
//!   and turns value differences into inbound
//!   [`Input`][dsd_types::Input] events.

pub mod bus;
pub mod poller;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use poller::{ChannelPoller, PollerHandle};
