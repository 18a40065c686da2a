use crate::{
    config::ElectionConfig,
    events::{self, EventSender, Events},
    identity::{Identity, LeaseKey},
    lease::LeaseClient,
    random::{RandomSource, ThreadRandom},
    schedule::{Scheduler, TaskHandle},
    scripts::ScriptGuard,
    store::Store,
    Error, Result,
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

/// Mutable election state, only touched under `Shared::state`.
///
/// At most one election task and one renewal task are pending; a leader
/// only ever has a renewal pending and a candidate only an election.
#[derive(Debug, Default)]
struct ElectionState {
    leading: bool,
    stopped: bool,
    election: Option<TaskHandle>,
    renewal: Option<TaskHandle>,
}

impl ElectionState {
    fn cancel_tasks(&mut self) {
        if let Some(task) = self.election.take() {
            task.cancel();
        }
        if let Some(task) = self.renewal.take() {
            task.cancel();
        }
    }
}

#[derive(Debug)]
struct Shared {
    lease: LeaseClient,
    ttl: Duration,
    wait: Duration,
    jitter: Duration,
    random: Arc<dyn RandomSource>,
    scheduler: Scheduler,
    events: EventSender,
    /// Mirror of `ElectionState::leading` readable without the state lock.
    leading: AtomicBool,
    /// Set when the owning `Elector` is dropped.
    closed: AtomicBool,
    state: tokio::sync::Mutex<ElectionState>,
}

impl Shared {
    fn set_leading(&self, state: &mut ElectionState, leading: bool) {
        state.leading = leading;
        self.leading.store(leading, Ordering::SeqCst);
    }

    fn halted(&self, state: &ElectionState) -> bool {
        state.stopped || self.closed.load(Ordering::SeqCst)
    }

    /// Half the TTL plus a random share of the jitter bound.
    fn renewal_delay(&self) -> Duration {
        let bound = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if bound == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(self.random.below(bound))
        };
        self.ttl / 2 + jitter
    }

    fn schedule_election(self: &Arc<Self>, state: &mut ElectionState, delay: Duration) {
        if let Some(previous) = state.election.take() {
            previous.cancel();
        }
        debug!(key = %self.lease.key(), ?delay, "scheduling election");
        state.election = Some(self.scheduler.submit(delay, election_task(self.clone())));
    }

    fn schedule_renewal(self: &Arc<Self>, state: &mut ElectionState, delay: Duration) {
        if let Some(previous) = state.renewal.take() {
            previous.cancel();
        }
        debug!(key = %self.lease.key(), ?delay, "scheduling renewal");
        state.renewal = Some(self.scheduler.submit(delay, renewal_task(self.clone())));
    }

    async fn demote(&self, state: &mut ElectionState) {
        if state.leading {
            self.set_leading(state, false);
            info!(key = %self.lease.key(), id = %self.lease.id(), "demoted from leader");
            self.events.demoted().await;
        }
    }

    async fn resign(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.cancel_tasks();

        let released = self.lease.release().await?;
        state.stopped = true;
        self.demote(&mut state).await;
        info!(key = %self.lease.key(), released, "resigned from election");
        Ok(())
    }
}

fn election_task(shared: Arc<Shared>) -> BoxFuture<'static, ()> {
    Box::pin(run_election(shared))
}

fn renewal_task(shared: Arc<Shared>) -> BoxFuture<'static, ()> {
    Box::pin(renew(shared))
}

async fn run_election(shared: Arc<Shared>) {
    let mut state = shared.state.lock().await;
    state.election = None;
    if shared.halted(&state) {
        return;
    }

    match shared.lease.acquire(shared.ttl).await {
        Err(err) => {
            warn!(key = %shared.lease.key(), error = %err, "election attempt failed");
            shared.events.error(Error::Election(Box::new(err))).await;
            shared.schedule_election(&mut state, shared.wait);
        }
        Ok(true) => {
            shared.set_leading(&mut state, true);
            info!(key = %shared.lease.key(), id = %shared.lease.id(), "promoted to leader");
            shared.events.promoted().await;
            let delay = shared.renewal_delay();
            shared.schedule_renewal(&mut state, delay);
        }
        Ok(false) => {
            shared.demote(&mut state).await;
            if let Some(task) = state.renewal.take() {
                task.cancel();
            }
            shared.schedule_election(&mut state, shared.wait);
        }
    }
}

async fn renew(shared: Arc<Shared>) {
    let mut state = shared.state.lock().await;
    state.renewal = None;
    if shared.halted(&state) {
        return;
    }

    match shared.lease.renew(shared.ttl).await {
        Err(err) => {
            // Treated as a lost lease: back off like a cold start instead
            // of retrying the renewal.
            warn!(key = %shared.lease.key(), error = %err, "lease renewal failed");
            shared.events.error(Error::Renewal(Box::new(err))).await;
            shared.demote(&mut state).await;
            shared.schedule_election(&mut state, shared.wait);
        }
        Ok(true) => {
            let delay = shared.renewal_delay();
            shared.schedule_renewal(&mut state, delay);
        }
        Ok(false) => {
            shared.demote(&mut state).await;
            shared.schedule_election(&mut state, shared.wait);
        }
    }
}

/// One participant in a named election.
///
/// Single use: once stopped it cannot be started again; build a new one,
/// which also gets a fresh identity.
///
/// ```no_run
/// # async fn demo() -> leasehold::Result<()> {
/// use leasehold::{ElectionConfig, Elector, MemoryStore};
/// use std::{sync::Arc, time::Duration};
///
/// let config = ElectionConfig::new("nightly-report").with_ttl(Duration::from_secs(1));
/// let (elector, mut events) = Elector::new(config, Arc::new(MemoryStore::new()))?;
/// elector.start();
///
/// if let Some(at) = events.promoted.recv().await {
///     println!("leading since {at}");
/// }
/// elector.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Elector {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    resigning: tokio::sync::Mutex<()>,
}

impl Elector {
    /// Builds an elector with the thread-local random source.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for an unusable configuration and
    /// [`Error::NoRuntime`] when called outside a Tokio runtime.
    pub fn new(config: ElectionConfig, store: Arc<dyn Store>) -> Result<(Self, Events)> {
        Self::with_random(config, store, Arc::new(ThreadRandom))
    }

    /// Builds an elector drawing its identity and jitter from `random`.
    ///
    /// # Errors
    ///
    /// See [`Elector::new`].
    pub fn with_random(
        config: ElectionConfig,
        store: Arc<dyn Store>,
        random: Arc<dyn RandomSource>,
    ) -> Result<(Self, Events)> {
        config.validate()?;
        let scheduler = Scheduler::current()?;

        let key = LeaseKey::derive(&config.name);
        let id = Identity::generate(random.as_ref());
        let (sender, events) = events::channel(config.event_capacity);

        let shared = Arc::new(Shared {
            lease: LeaseClient::new(ScriptGuard::new(store), key, id),
            ttl: config.ttl,
            wait: config.wait,
            jitter: config.jitter,
            random,
            scheduler,
            events: sender,
            leading: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            state: tokio::sync::Mutex::new(ElectionState::default()),
        });

        let elector = Self {
            shared,
            lifecycle: Mutex::new(Lifecycle::Idle),
            resigning: tokio::sync::Mutex::new(()),
        };
        Ok((elector, events))
    }

    /// Launches the first election attempt in the background and returns.
    ///
    /// Calling it again, or after [`Elector::stop`], does nothing.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle != Lifecycle::Idle {
            return;
        }
        *lifecycle = Lifecycle::Running;

        info!(key = %self.shared.lease.key(), id = %self.shared.lease.id(), "joining election");
        // Submit under the state lock so the first attempt cannot run, and
        // schedule its successor, before its own handle is recorded.
        match self.shared.state.try_lock() {
            Ok(mut state) => {
                self.shared.schedule_election(&mut state, Duration::ZERO);
            }
            Err(_) => {
                warn!(key = %self.shared.lease.key(), "election state busy at start");
                self.shared
                    .scheduler
                    .submit(Duration::ZERO, election_task(self.shared.clone()));
            }
        }
    }

    /// Cancels pending work and releases the lease if this elector holds it.
    ///
    /// A store failure is returned as is; pending work stays cancelled and
    /// `stop` may be called again. Stopping an elector that is not running
    /// succeeds without touching the store.
    ///
    /// # Errors
    ///
    /// The store error raised by the release call.
    pub async fn stop(&self) -> Result<()> {
        let _resigning = self.resigning.lock().await;
        let running = *self.lifecycle.lock() == Lifecycle::Running;
        if !running {
            return Ok(());
        }

        self.shared.resign().await?;
        *self.lifecycle.lock() = Lifecycle::Stopped;
        Ok(())
    }

    pub fn is_leading(&self) -> bool {
        self.shared.leading.load(Ordering::SeqCst)
    }

    pub fn key(&self) -> &LeaseKey {
        self.shared.lease.key()
    }

    pub fn identity(&self) -> &Identity {
        self.shared.lease.id()
    }
}

impl Drop for Elector {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Ok(mut state) = self.shared.state.try_lock() {
            state.cancel_tasks();
        }
    }
}
