//! # namepool-core
//!
//! Named, reusable leases for families of interchangeable shared test
//! resources. Callers ask for a name in a family (say, "database"); the
//! engine hands back a family-scoped identifier ("0", "1", ...), guarantees
//! at most one concurrent holder per (family, name) pair across every
//! process sharing the same backend, and recycles names when their holders
//! release them or stop heartbeating.

pub mod clock;
mod config;
pub mod engine;
pub mod error;
pub mod hold;
pub mod manager;
pub mod registry;
pub mod rest;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod types;

pub use clock::{Clock, MockClock, SystemClock};
pub use engine::Engine;
pub use error::{Error, Result, StoreError};
pub use hold::{hold, try_hold, Hold};
pub use manager::NameManager;
pub use registry::{Backend, BackendRegistry};
pub use types::Name;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
