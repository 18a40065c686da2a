use crate::{scripts::Procedure, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// The three capabilities the election engine needs from a key-value store.
///
/// Atomic procedures are referenced by a content-derived handle. A store
/// that has forgotten a handle must fail with [`StoreError::NoScript`] so the
/// caller can reinstall the body and retry.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Point read of a key.
    async fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Runs a pre-loaded procedure atomically against `keys` with positional `args`.
    async fn execute_atomic(&self, handle: &str, keys: &[String], args: &[String])
        -> StoreResult<i64>;

    /// Registers a procedure body and returns its handle. Loading a known
    /// body again is a no-op.
    async fn load_atomic(&self, body: &str) -> StoreResult<String>;
}

#[derive(Debug, Clone)]
struct Record {
    value: String,
    expires_at: Instant,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process store for tests and single-host setups.
///
/// Expiry follows the Tokio clock, so paused-time tests see leases lapse
/// exactly when the virtual clock passes them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Record>>,
    scripts: Mutex<HashMap<String, Procedure>>,
    loads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every loaded procedure, as a store restart or `SCRIPT FLUSH` would.
    pub fn flush_scripts(&self) {
        self.scripts.lock().clear();
    }

    /// Drops every record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Number of `load_atomic` calls served so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Time left on a live record.
    pub fn remaining(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.records
            .lock()
            .get(key)
            .filter(|record| record.is_live(now))
            .map(|record| record.expires_at - now)
    }

    fn run(procedure: Procedure, records: &mut HashMap<String, Record>, key: &str, args: &[String]) -> StoreResult<i64> {
        let now = Instant::now();
        if records.get(key).is_some_and(|record| !record.is_live(now)) {
            records.remove(key);
        }

        let owner = arg(args, 0)?;
        let owned = records.get(key).is_some_and(|record| record.value == owner);

        let applied = match procedure {
            Procedure::Acquire => {
                if records.contains_key(key) {
                    false
                } else {
                    let ttl = ttl_arg(args)?;
                    records.insert(
                        key.to_string(),
                        Record {
                            value: owner.to_string(),
                            expires_at: now + ttl,
                        },
                    );
                    true
                }
            }
            Procedure::Renew => {
                let ttl = ttl_arg(args)?;
                if let Some(record) = records.get_mut(key).filter(|_| owned) {
                    record.expires_at = now + ttl;
                }
                owned
            }
            Procedure::Release => {
                if owned {
                    records.remove(key);
                }
                owned
            }
        };

        Ok(i64::from(applied))
    }
}

fn arg(args: &[String], index: usize) -> StoreResult<&str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| StoreError::Backend(format!("ERR missing argument {}", index + 1)))
}

fn ttl_arg(args: &[String]) -> StoreResult<Duration> {
    let millis = arg(args, 1)?
        .parse::<u64>()
        .map_err(|_| StoreError::Backend("ERR value is not an integer or out of range".to_string()))?;
    Ok(Duration::from_millis(millis))
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .records
            .lock()
            .get(key)
            .filter(|record| record.is_live(now))
            .map(|record| record.value.clone()))
    }

    async fn execute_atomic(
        &self,
        handle: &str,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<i64> {
        let procedure = self.scripts.lock().get(handle).copied().ok_or_else(|| {
            StoreError::NoScript {
                message: "NOSCRIPT No matching script. Please use EVAL.".to_string(),
            }
        })?;
        let key = keys
            .first()
            .ok_or_else(|| StoreError::Backend("ERR wrong number of keys".to_string()))?;

        let mut records = self.records.lock();
        Self::run(procedure, &mut records, key, args)
    }

    async fn load_atomic(&self, body: &str) -> StoreResult<String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let procedure = Procedure::from_body(body)
            .ok_or_else(|| StoreError::Backend("ERR unsupported script body".to_string()))?;
        let handle = procedure.handle().to_string();
        self.scripts.lock().insert(handle.clone(), procedure);
        Ok(handle)
    }
}
