//! Generic `AlertActuator` trait for the audible vigilance warning.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

/// An on/off audible warning.
///
/// Both operations must be idempotent: the engine calls `start` on every
/// entry into the acknowledgement state (including self-loops) and `stop`
/// unconditionally on teardown.
pub trait AlertActuator: Send + Sync {
    /// Begin sounding the warning. No-op if already sounding.
    fn start(&self);

    /// Silence the warning. No-op if already silent.
    fn stop(&self);

    /// `true` while the warning is sounding.
    fn is_active(&self) -> bool;
}

/// An alert that only reports through `tracing`. Used where no audio device
/// is wired in.
#[derive(Debug, Default)]
pub struct TracingAlert {
    active: AtomicBool,
}

impl TracingAlert {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertActuator for TracingAlert {
    fn start(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            warn!("vigilance alert sounding");
        }
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("vigilance alert silenced");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_alert_toggle_is_idempotent() {
        let alert = TracingAlert::new();
        assert!(!alert.is_active());

        alert.start();
        alert.start();
        assert!(alert.is_active());

        alert.stop();
        alert.stop();
        assert!(!alert.is_active());
    }
}
