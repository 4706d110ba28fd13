//! `dsd-kernel` – Vigilance core
//!
//! Decides when the driver must prove attentiveness and when to stop the
//! train. Everything here is synchronous; the async plumbing lives in
//! `dsd-runtime`.
//!
//! # Modules
//!
//! - [`profile`] – [`BehaviorProfile`][profile::BehaviorProfile]: which
//!   controls count as activity, where the stop command goes, and the
//!   isolation/drift modifiers a vehicle needs.
//! - [`catalog`] – the built-in profiles and the vehicle table that ships
//!   with the watchdog.
//! - [`resolver`] – [`ProfileResolver`][resolver::ProfileResolver]: exact
//!   `vendor.name` lookup with a default fallback.
//! - [`timing`] – reaction windows and midnight-aware deadline checks.
//! - [`engine`] – [`VigilanceEngine`][engine::VigilanceEngine]: the
//!   `Inactive` / `NeedsAck` / `Confirmed` state machine.

pub mod catalog;
pub mod engine;
pub mod profile;
pub mod resolver;
pub mod timing;

pub use engine::{Dispatch, VigilanceEngine};
pub use profile::{BehaviorProfile, Drift, Isolation, Modifier, Thresholds};
pub use resolver::ProfileResolver;
pub use timing::Timing;
