use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lease duration (10 seconds)
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Default pause between election attempts (5 seconds)
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Default bound of each event stream
pub const DEFAULT_EVENT_CAPACITY: usize = 10;

/// Timing and naming of one election.
///
/// Durations are written as whole milliseconds when serialized:
///
/// ```json
/// { "name": "nightly-report", "ttl_ms": 1000, "wait_ms": 2000, "jitter_ms": 50 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Logical election name; the lease key is derived from it.
    pub name: String,

    /// Lifetime of the lease record in the store.
    #[serde(rename = "ttl_ms", with = "millis", default = "default_ttl")]
    pub ttl: Duration,

    /// Delay before the next election attempt after a failure or a lost race.
    #[serde(rename = "wait_ms", with = "millis", default = "default_wait")]
    pub wait: Duration,

    /// Upper bound of the random delay added to each renewal.
    #[serde(rename = "jitter_ms", with = "millis", default)]
    pub jitter: Duration,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl ElectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ttl: DEFAULT_TTL,
            wait: DEFAULT_WAIT,
            jitter: Duration::ZERO,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Rejects settings the election loop cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) naming the
    /// first offending field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.ttl.is_zero() {
            return Err(invalid("ttl must be greater than zero"));
        }
        // The store expires records with millisecond granularity.
        if self.ttl < Duration::from_millis(1) {
            return Err(invalid("ttl must be at least one millisecond"));
        }
        if self.wait.is_zero() {
            return Err(invalid("wait must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(invalid("event_capacity must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> crate::Error {
    crate::Error::InvalidConfig(reason.to_string())
}

fn default_ttl() -> Duration {
    DEFAULT_TTL
}

fn default_wait() -> Duration {
    DEFAULT_WAIT
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
