//! The hold supervisor: acquire + periodic keep-alive + guaranteed release.
//!
//! Holding is the recommended lifecycle for users: the supervisor heartbeats
//! the name on a background thread so it survives the backend's auto-release
//! window, and the returned handle releases it exactly once.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::manager::NameManager;

const KEEP_ALIVE_ATTEMPTS: usize = 3;
const KEEP_ALIVE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Acquires a name for the family and keeps it alive until the returned
/// [`Hold`] is released.
pub fn hold(manager: Arc<dyn NameManager>, family: &str) -> Result<Hold> {
    let name = manager.acquire(family)?;
    Ok(supervise(manager, family, name))
}

/// Acquires a specific name and keeps it alive until the returned [`Hold`]
/// is released. Fails like [`NameManager::try_acquire`].
pub fn try_hold(manager: Arc<dyn NameManager>, family: &str, name: &str) -> Result<Hold> {
    manager.try_acquire(family, name)?;
    Ok(supervise(manager, family, name.to_string()))
}

/// A held name together with its background keep-alive loop.
pub struct Hold {
    manager: Arc<dyn NameManager>,
    family: String,
    name: String,
    errors: Receiver<Error>,
    stop: Option<Sender<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Hold {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// The hold's error channel. It delivers at most one
    /// [`Error::Background`] message, when the keep-alive loop gives up
    /// after retries, and is closed once the hold is released.
    pub fn errors(&self) -> Receiver<Error> {
        self.errors.clone()
    }

    /// Stops the heartbeat, waits for it to exit, closes the error channel,
    /// and releases the name.
    pub fn release(mut self) -> Result<()> {
        self.stop_heartbeat();
        self.manager.release(&self.family, &self.name)
    }

    fn stop_heartbeat(&mut self) {
        // Dropping the sender wakes the loop's select.
        self.stop.take();
        if let Some(handle) = self.heartbeat.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Hold {
    /// Dropping without [`Hold::release`] stops the heartbeat but leaves the
    /// name held; the backend's auto-release then reclaims it.
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

fn supervise(manager: Arc<dyn NameManager>, family: &str, name: String) -> Hold {
    let (err_tx, err_rx) = bounded(1);
    let (stop_tx, stop_rx) = bounded::<()>(0);

    let heartbeat = match manager.keep_alive_interval().filter(|i| !i.is_zero()) {
        None => None,
        Some(interval) => {
            let manager = Arc::clone(&manager);
            let clock = Arc::clone(manager.clock());
            let family = family.to_string();
            let name = name.clone();
            Some(thread::spawn(move || {
                keep_alive_loop(&*manager, &*clock, interval, &family, &name, &err_tx, &stop_rx);
            }))
        }
    };

    Hold {
        manager,
        family: family.to_string(),
        name,
        errors: err_rx,
        stop: Some(stop_tx),
        heartbeat,
    }
}

fn keep_alive_loop(
    manager: &dyn NameManager,
    clock: &dyn Clock,
    interval: Duration,
    family: &str,
    name: &str,
    errors: &Sender<Error>,
    stop: &Receiver<()>,
) {
    loop {
        let tick = clock.after(interval);
        crossbeam_channel::select! {
            // Fires on release: the stop sender is dropped.
            recv(stop) -> _ => return,
            recv(tick) -> _ => {}
        }

        let mut outcome = Ok(());
        for attempt in 1..=KEEP_ALIVE_ATTEMPTS {
            outcome = manager.keep_alive(family, name);
            if outcome.is_ok() {
                break;
            }
            if attempt < KEEP_ALIVE_ATTEMPTS {
                thread::sleep(KEEP_ALIVE_RETRY_DELAY);
            }
        }
        if let Err(err) = outcome {
            tracing::error!(family, name, error = %err, "cannot keep name alive");
            let _ = errors.try_send(Error::Background {
                family: family.to_string(),
                name: name.to_string(),
                reason: err.to_string(),
            });
            return;
        }
    }
}
