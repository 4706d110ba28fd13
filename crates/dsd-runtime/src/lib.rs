//! `dsd-runtime` – Session plumbing
//!
//! Binds the synchronous vigilance core to a live host.
//!
//! # Modules
//!
//! - [`session`] – [`Session`][session::Session]: resolves the loaded
//!   vehicle's profile, isolates the built-in device, and runs the poller,
//!   pedal binding and engine loop on Tokio.
//! - [`controller`] – [`SessionController`][controller::SessionController]:
//!   the single ordering point every input passes through; turns a vehicle
//!   change into a restart request.
//! - [`supervisor`] – [`Supervisor`][supervisor::Supervisor]: replaces the
//!   session whenever it asks for a restart.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP export (`OTEL_EXPORTER_OTLP_ENDPOINT`).

pub mod controller;
pub mod session;
pub mod supervisor;
pub mod telemetry;

pub use controller::{SessionController, SessionStatus};
pub use session::{Session, SessionBuilder, SessionSettings};
pub use supervisor::Supervisor;
pub use telemetry::{init_tracing, TracerProviderGuard};
