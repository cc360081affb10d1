use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::Result;
use crate::types::Name;

/// Acquisition and release of names under a global lock.
///
/// A given name cannot be acquired twice for the same family without having
/// been released first, no matter how many processes talk to the same
/// backend. After being acquired a name should be kept alive, otherwise
/// backends configured with an auto-release threshold reclaim it; the
/// [`crate::hold`] supervisor does this automatically and is almost always
/// preferable to driving `acquire`/`keep_alive`/`release` by hand.
pub trait NameManager: Send + Sync {
    /// Acquires a name for the given family and returns it.
    fn acquire(&self, family: &str) -> Result<String>;

    /// Acquires a specific name. Fails with [`crate::Error::NotExist`] when
    /// the name was never minted and [`crate::Error::InUse`] when it is
    /// currently held.
    fn try_acquire(&self, family: &str, name: &str) -> Result<()>;

    /// Heartbeats a held name so it is not automatically released. A
    /// keep-alive on a free or unknown name is a silent no-op.
    fn keep_alive(&self, family: &str, name: &str) -> Result<()>;

    /// Releases a name. Releasing a free or unknown name is a silent no-op;
    /// a released name can be acquired again.
    fn release(&self, family: &str, name: &str) -> Result<()>;

    /// Lists every registered name, free or held.
    fn list(&self) -> Result<Vec<Name>>;

    /// Deregisters all names. After this call, `list` returns nothing.
    fn reset(&self) -> Result<()>;

    /// Cadence of the background heartbeat for held names; `None` disables
    /// the heartbeat loop.
    fn keep_alive_interval(&self) -> Option<Duration>;

    /// The clock timestamps and heartbeats are read from.
    fn clock(&self) -> &Arc<dyn Clock>;
}

impl fmt::Debug for dyn NameManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("dyn NameManager").finish_non_exhaustive()
    }
}
