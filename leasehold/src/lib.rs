#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Lease-based leader election over a shared key-value store.
//!
//! Competing processes never talk to each other. Each one runs an
//! [`Elector`] that tries to write a self-expiring lease record into the
//! store, renews it at half its TTL while it holds it, and releases it on
//! [`Elector::stop`]. The store's atomic procedures are the only arbiter.

pub mod config;
pub mod elector;
pub mod error;
pub mod events;
pub mod identity;
pub mod lease;
pub mod random;
#[cfg(feature = "redis")]
pub mod redis;
pub mod schedule;
pub mod scripts;
pub mod store;

pub mod test_utils;

pub use config::ElectionConfig;
pub use elector::Elector;
pub use error::{Error, Result, StoreError, StoreResult};
pub use events::Events;
pub use identity::{Identity, LeaseKey};
pub use store::{MemoryStore, Store};

/// Wall-clock instant attached to promotion and demotion events.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
