//! Generic `PedalSwitch` trait for the driver's foot switch.

use dsd_types::{DsdError, Input};

/// A debounced edge reported by the switch driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PedalEvent {
    Depressed,
    Released,
}

impl From<PedalEvent> for Input {
    fn from(event: PedalEvent) -> Self {
        match event {
            PedalEvent::Depressed => Input::PedalDepressed,
            PedalEvent::Released => Input::PedalReleased,
        }
    }
}

/// Callback invoked on every pedal edge. Runs on the driver's own thread
/// and must not block.
pub type PedalHandler = Box<dyn Fn(PedalEvent) + Send + Sync>;

/// A foot switch delivering depress/release edges asynchronously.
pub trait PedalSwitch: Send + Sync {
    /// Install `handler`, replacing any previous binding.
    ///
    /// # Errors
    ///
    /// Returns [`DsdError::PedalUnavailable`] if the device cannot be opened.
    fn bind(&self, handler: PedalHandler) -> Result<(), DsdError>;

    /// Drop the current binding. Edges arriving afterwards are discarded.
    fn release(&self) -> Result<(), DsdError>;
}
