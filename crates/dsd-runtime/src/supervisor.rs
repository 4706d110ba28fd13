//! [`Supervisor`] – keeps exactly one session alive for the host.
//!
//! A session never rebinds itself to a new vehicle. The supervisor polls
//! [`Session::needs_restart`], closes the stale session and starts a fresh
//! one, so the new vehicle gets its own profile, isolation write and
//! initial reverser check. A session that fails to start is retried on the
//! next check.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dsd_types::DsdError;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::controller::SessionStatus;
use crate::session::{Session, SessionBuilder};

pub struct Supervisor {
    builder: SessionBuilder,
    current: Mutex<Option<Session>>,
    restarts: AtomicUsize,
}

impl Supervisor {
    pub fn new(builder: SessionBuilder) -> Arc<Self> {
        Arc::new(Self {
            builder,
            current: Mutex::new(None),
            restarts: AtomicUsize::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a session if there is none, or replace the current one if it
    /// asked for a restart. Returns `true` when a session was started.
    pub async fn check(&self) -> Result<bool, DsdError> {
        let stale = {
            let mut current = self.lock();
            match current.as_ref().map(Session::needs_restart) {
                Some(false) => return Ok(false),
                Some(true) => current.take(),
                None => None,
            }
        };

        if let Some(stale) = stale {
            info!("restarting session for new vehicle");
            stale.close().await;
            self.restarts.fetch_add(1, Ordering::SeqCst);
        }

        let session = self.builder.start().await?;
        *self.lock() = Some(session);
        Ok(true)
    }

    /// Status of the current session, if one is running.
    pub fn status(&self) -> Option<SessionStatus> {
        self.lock().as_ref().map(Session::status)
    }

    /// Number of sessions replaced after a vehicle change.
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Check every `interval` until `shutdown` is raised, then close the
    /// current session.
    pub async fn run(self: Arc<Self>, shutdown: Arc<AtomicBool>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            if let Err(e) = self.check().await {
                error!(error = %e, "session start failed; retrying");
            }
        }
        self.shutdown().await;
    }

    /// Close the current session, if any.
    pub async fn shutdown(&self) {
        let current = self.lock().take();
        if let Some(session) = current {
            session.close().await;
        }
    }
}
