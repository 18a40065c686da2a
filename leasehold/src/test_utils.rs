use crate::{events::Events, Store, StoreError, StoreResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Wraps a store and fails every call while `breaking` is set, like a
/// connection to an unreachable server.
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<dyn Store>,
    breaking: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            breaking: AtomicBool::new(false),
        }
    }

    pub fn set_breaking(&self, breaking: bool) {
        self.breaking.store(breaking, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.breaking.load(Ordering::SeqCst) {
            Err(StoreError::Backend("faulty store is faulty".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.read(key).await
    }

    async fn execute_atomic(
        &self,
        handle: &str,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<i64> {
        self.check()?;
        self.inner.execute_atomic(handle, keys, args).await
    }

    async fn load_atomic(&self, body: &str) -> StoreResult<String> {
        self.check()?;
        self.inner.load_atomic(body).await
    }
}

/// Counts what arrives on an elector's event streams.
#[derive(Debug, Default)]
pub struct EventCounts {
    pub promoted: AtomicUsize,
    pub demoted: AtomicUsize,
    pub errors: AtomicUsize,
}

/// Drains all three streams of an elector in a background task.
#[derive(Debug)]
pub struct EventRecorder {
    counts: Arc<EventCounts>,
    task: JoinHandle<()>,
}

impl EventRecorder {
    pub fn spawn(mut events: Events) -> Self {
        let counts = Arc::new(EventCounts::default());
        let recorded = counts.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(_) = events.promoted.recv() => {
                        recorded.promoted.fetch_add(1, Ordering::SeqCst);
                    }
                    Some(_) = events.demoted.recv() => {
                        recorded.demoted.fetch_add(1, Ordering::SeqCst);
                    }
                    Some(err) = events.errors.recv() => {
                        println!("elector error: {err}");
                        recorded.errors.fetch_add(1, Ordering::SeqCst);
                    }
                    else => break,
                }
            }
        });

        Self { counts, task }
    }

    pub fn promoted(&self) -> usize {
        self.counts.promoted.load(Ordering::SeqCst)
    }

    pub fn demoted(&self) -> usize {
        self.counts.demoted.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.counts.errors.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.counts.promoted.store(0, Ordering::SeqCst);
        self.counts.demoted.store(0, Ordering::SeqCst);
        self.counts.errors.store(0, Ordering::SeqCst);
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Polls `condition` every 10ms until it holds or `deadline` passes.
/// Returns whether it held.
pub async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let end = tokio::time::Instant::now() + deadline;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= end {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
