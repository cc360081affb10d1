//! Backend registry and connection-string routing.
//!
//! A connection string has the shape `<scheme>://<driver-specific>`. The
//! registry maps the scheme to a driver factory. It is assembled explicitly
//! at process startup rather than through global init-time registration, so
//! drivers stay decoupled and testable in isolation.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::clock::SystemClock;
use crate::config::{expand_home, BackendUrl};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::manager::NameManager;
use crate::rest::RestBackend;
use crate::store_file::FileStore;
use crate::store_memory::MemoryStore;

/// Factory for one connection-string scheme. Receives the URL stripped of
/// `<scheme>://`.
pub type CreateFn = fn(&str) -> Result<Arc<dyn NameManager>>;

pub struct Backend {
    /// Scheme prefix, e.g. `local` for `local://...` URLs.
    pub scheme: &'static str,
    /// Human-readable description, including the URL format.
    pub description: &'static str,
    pub create: CreateFn,
}

#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<&'static str, Backend>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in backends (`mem`, `local`, `rest`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Backend {
            scheme: "mem",
            description: "In-process backend.\n\n\
                The mem backend keeps all state in memory. Names are only \
                coordinated within the current process, which makes it \
                suitable for tests and for `serve` with an ephemeral \
                server.\n\n\
                URL format: \"mem://<label>[;autoReleaseAfter=<duration>]\".",
            create: create_memory,
        });
        registry.register(Backend {
            scheme: "local",
            description: "Local backend.\n\n\
                The local backend does not rely on any external service: it \
                keeps the list of names in an embedded key-value file and \
                enforces the global lock with an exclusive file lock.\n\n\
                URL format: \"local://<path>[;autoReleaseAfter=<duration>]\", \
                where <path> is where the database file is located (\"~/\" \
                expands to the home directory).",
            create: create_local,
        });
        registry.register(Backend {
            scheme: "rest",
            description: "REST backend.\n\n\
                The rest backend communicates with a namepool server.\n\n\
                URL format: \"rest://<host:port>[;keepAliveInterval=<duration>]\".",
            create: create_rest,
        });
        registry
    }

    /// Registers a backend. Registering the same scheme twice is a
    /// programmer error.
    pub fn register(&mut self, backend: Backend) {
        if self.backends.contains_key(backend.scheme) {
            panic!("backend '{}' is already registered", backend.scheme);
        }
        self.backends.insert(backend.scheme, backend);
    }

    /// The registered backends, in scheme order.
    pub fn backends(&self) -> impl Iterator<Item = &Backend> {
        self.backends.values()
    }

    /// Creates a name manager from a connection string such as
    /// `local://~/.namepool`.
    pub fn create(&self, url: &str) -> Result<Arc<dyn NameManager>> {
        let (scheme, backend_url) = url
            .split_once("://")
            .filter(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
            .ok_or_else(|| Error::Config(format!("invalid backend URL: '{url}'")))?;
        let backend = self
            .backends
            .get(scheme)
            .ok_or_else(|| Error::Config(format!("backend '{scheme}' has not been registered")))?;
        (backend.create)(backend_url)
    }
}

fn create_memory(backend_url: &str) -> Result<Arc<dyn NameManager>> {
    let mut url = BackendUrl::parse(backend_url)?;
    let auto_release_after = url.take_duration("autoReleaseAfter")?;
    url.finish()?;
    Ok(Arc::new(Engine::new(
        MemoryStore::new(),
        Arc::new(SystemClock),
        auto_release_after,
    )))
}

fn create_local(backend_url: &str) -> Result<Arc<dyn NameManager>> {
    let mut url = BackendUrl::parse(backend_url)?;
    let auto_release_after = url.take_duration("autoReleaseAfter")?;
    let path = expand_home(&url.head)?;
    url.finish()?;
    Ok(Arc::new(Engine::new(
        FileStore::new(path),
        Arc::new(SystemClock),
        auto_release_after,
    )))
}

fn create_rest(backend_url: &str) -> Result<Arc<dyn NameManager>> {
    let mut url = BackendUrl::parse(backend_url)?;
    let keep_alive_interval = url.take_duration("keepAliveInterval")?;
    let host_port = url.head.clone();
    url.finish()?;
    let backend = RestBackend::new(&host_port, keep_alive_interval, Arc::new(SystemClock))?;
    Ok(Arc::new(backend))
}
