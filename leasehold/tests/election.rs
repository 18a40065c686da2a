use leasehold::{
    random::SeededRandom,
    test_utils::{wait_until, EventRecorder, FaultyStore},
    ElectionConfig, Elector, Error, MemoryStore, Store, StoreError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const TTL: Duration = Duration::from_secs(1);
const WAIT: Duration = Duration::from_secs(2);
const JITTER: Duration = Duration::from_millis(50);

fn config() -> ElectionConfig {
    ElectionConfig::new("test1")
        .with_ttl(TTL)
        .with_wait(WAIT)
        .with_jitter(JITTER)
}

fn elector(store: Arc<dyn Store>, seed: u64) -> (Elector, EventRecorder) {
    let (elector, events) =
        Elector::with_random(config(), store, Arc::new(SeededRandom::new(seed))).unwrap();
    (elector, EventRecorder::spawn(events))
}

/// Longest a candidate may wait for a lease abandoned at failure onset:
/// three seconds with a one second TTL and two second wait.
fn takeover_bound() -> Duration {
    Duration::from_secs(3)
}

#[tokio::test(start_paused = true)]
async fn test_single_elector_becomes_leader() {
    let store = Arc::new(MemoryStore::new());
    let (a, watch_a) = elector(store.clone(), 1);

    a.start();
    assert!(wait_until(Duration::from_millis(100), || watch_a.promoted() == 1).await);
    assert!(a.is_leading());
    assert_eq!(
        store.read(a.key().as_str()).await.unwrap().as_deref(),
        Some(a.identity().as_str())
    );
    assert_eq!(store.loads(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let (a, watch_a) = elector(store, 1);

    a.start();
    a.start();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(watch_a.promoted(), 1);
    assert_eq!(watch_a.errors(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_only_one_leader() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (a, watch_a) = elector(store.clone(), 1);
    let (b, watch_b) = elector(store, 2);

    a.start();
    b.start();

    for _ in 0..1000 {
        assert!(!(a.is_leading() && b.is_leading()), "both electors lead");
        sleep(Duration::from_millis(10)).await;
    }

    assert!(a.is_leading() ^ b.is_leading());
    assert_eq!(watch_a.promoted() + watch_b.promoted(), 1);
    assert_eq!(watch_a.demoted() + watch_b.demoted(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_leader_retains_lease() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (a, watch_a) = elector(store.clone(), 1);
    let (b, watch_b) = elector(store, 2);

    a.start();
    sleep(Duration::from_millis(100)).await;
    b.start();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(watch_a.promoted(), 1);
    assert_eq!(watch_b.promoted(), 0);

    watch_a.reset();
    watch_b.reset();
    for _ in 0..100 {
        sleep(Duration::from_millis(100)).await;
        assert!(a.is_leading());
        assert!(!b.is_leading());
    }

    assert_eq!(watch_a.errors(), 0);
    assert_eq!(watch_a.demoted(), 0);
    assert_eq!(watch_a.promoted(), 0);
    assert_eq!(watch_b.errors(), 0);
    assert_eq!(watch_b.demoted(), 0);
    assert_eq!(watch_b.promoted(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failover_between_two_electors() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let cli1 = Arc::new(FaultyStore::new(store.clone()));
    let cli2 = Arc::new(FaultyStore::new(store));
    let (a, watch_a) = elector(cli1.clone(), 1);
    let (b, watch_b) = elector(cli2.clone(), 2);

    a.start();
    sleep(Duration::from_millis(100)).await;
    b.start();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(watch_a.promoted(), 1);
    assert_eq!(watch_b.promoted(), 0);

    // a keeps its lease while healthy
    watch_a.reset();
    watch_b.reset();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(watch_a.errors(), 0);
    assert_eq!(watch_a.demoted(), 0);
    assert_eq!(watch_a.promoted(), 0);
    assert_eq!(watch_b.errors(), 0);
    assert_eq!(watch_b.demoted(), 0);
    assert_eq!(watch_b.promoted(), 0);

    // b takes over once a's store access breaks
    cli1.set_breaking(true);
    watch_a.reset();
    watch_b.reset();
    let took_over = wait_until(takeover_bound(), || {
        watch_a.demoted() == 1 && watch_b.promoted() == 1
    })
    .await;
    assert!(took_over, "b did not take over in time");
    assert!(!a.is_leading());
    assert!(b.is_leading());
    assert!(watch_a.errors() >= 1);
    assert_eq!(watch_a.promoted(), 0);
    assert_eq!(watch_b.errors(), 0);
    assert_eq!(watch_b.demoted(), 0);

    // b keeps its lease
    watch_a.reset();
    watch_b.reset();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(watch_a.demoted(), 0);
    assert_eq!(watch_a.promoted(), 0);
    assert_eq!(watch_b.errors(), 0);
    assert_eq!(watch_b.demoted(), 0);
    assert_eq!(watch_b.promoted(), 0);

    // roles reverse when b breaks and a recovers
    cli1.set_breaking(false);
    cli2.set_breaking(true);
    watch_a.reset();
    watch_b.reset();
    let took_back = wait_until(takeover_bound(), || {
        watch_a.promoted() == 1 && watch_b.demoted() == 1
    })
    .await;
    assert!(took_back, "a did not take the lease back in time");
    assert!(a.is_leading());
    assert!(!b.is_leading());
    assert_eq!(watch_a.demoted(), 0);
    assert_eq!(watch_b.promoted(), 0);

    cli2.set_breaking(false);
    a.stop().await.unwrap();
    b.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let (a, watch_a) = elector(store.clone(), 1);

    a.start();
    assert!(wait_until(Duration::from_millis(100), || a.is_leading()).await);

    a.stop().await.unwrap();
    assert!(!a.is_leading());
    assert!(store.read(a.key().as_str()).await.unwrap().is_none());

    a.stop().await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(watch_a.demoted(), 1);

    // nothing runs after resignation
    sleep(Duration::from_secs(10)).await;
    assert_eq!(watch_a.promoted(), 1);
    assert_eq!(watch_a.demoted(), 1);
    assert!(store.read(a.key().as_str()).await.unwrap().is_none());

    // stopped electors cannot be restarted
    a.start();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(watch_a.promoted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_as_candidate_keeps_others_lease() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (a, _watch_a) = elector(store.clone(), 1);
    let (b, watch_b) = elector(store.clone(), 2);

    a.start();
    sleep(Duration::from_millis(100)).await;
    b.start();
    sleep(Duration::from_millis(100)).await;

    b.stop().await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(watch_b.demoted(), 0);
    assert_eq!(
        store.read(a.key().as_str()).await.unwrap().as_deref(),
        Some(a.identity().as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_hands_lease_over() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (a, watch_a) = elector(store.clone(), 1);
    let (b, watch_b) = elector(store, 2);

    a.start();
    sleep(Duration::from_millis(100)).await;
    b.start();
    sleep(Duration::from_millis(100)).await;

    a.stop().await.unwrap();
    assert!(wait_until(WAIT + JITTER, || watch_b.promoted() == 1).await);
    assert_eq!(watch_a.demoted(), 1);
    assert!(b.is_leading());
}

#[tokio::test(start_paused = true)]
async fn test_stop_failure_is_returned() {
    let faulty = Arc::new(FaultyStore::new(Arc::new(MemoryStore::new())));
    let (a, watch_a) = elector(faulty.clone(), 1);

    a.start();
    assert!(wait_until(Duration::from_millis(100), || a.is_leading()).await);

    faulty.set_breaking(true);
    let err = a.stop().await.unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::Backend(_))));
    sleep(Duration::from_millis(10)).await;
    assert_eq!(watch_a.demoted(), 0);
    assert_eq!(watch_a.errors(), 0);

    faulty.set_breaking(false);
    a.stop().await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(watch_a.demoted(), 1);
    assert!(!a.is_leading());
}

#[tokio::test(start_paused = true)]
async fn test_script_flush_is_transparent() {
    let store = Arc::new(MemoryStore::new());
    let (a, watch_a) = elector(store.clone(), 1);

    a.start();
    assert!(wait_until(Duration::from_millis(100), || a.is_leading()).await);
    assert_eq!(store.loads(), 3);

    store.flush_scripts();
    sleep(Duration::from_secs(5)).await;

    assert!(a.is_leading());
    assert_eq!(watch_a.errors(), 0);
    assert_eq!(watch_a.demoted(), 0);
    assert_eq!(store.loads(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_candidate_recovers_from_store_errors() {
    let faulty = Arc::new(FaultyStore::new(Arc::new(MemoryStore::new())));
    faulty.set_breaking(true);
    let (a, watch_a) = elector(faulty.clone(), 1);

    a.start();
    assert!(wait_until(Duration::from_millis(100), || watch_a.errors() == 1).await);
    assert!(!a.is_leading());

    // one error per wait interval, no tight retry loop
    sleep(WAIT * 3 - Duration::from_millis(200)).await;
    assert_eq!(watch_a.errors(), 3);
    assert_eq!(watch_a.demoted(), 0);

    faulty.set_breaking(false);
    assert!(wait_until(WAIT + JITTER, || watch_a.promoted() == 1).await);
    assert!(a.is_leading());
}

#[tokio::test(start_paused = true)]
async fn test_demoted_when_lease_is_lost() {
    let store = Arc::new(MemoryStore::new());
    let (a, watch_a) = elector(store.clone(), 1);
    let (b, watch_b) = elector(store.clone(), 2);

    a.start();
    assert!(wait_until(Duration::from_millis(100), || a.is_leading()).await);

    // lease vanishes behind a's back and b grabs it
    store.clear();
    b.start();
    assert!(wait_until(Duration::from_millis(100), || b.is_leading()).await);

    assert!(wait_until(TTL, || watch_a.demoted() == 1).await);
    assert!(!a.is_leading());
    assert_eq!(watch_a.errors(), 0);

    sleep(Duration::from_secs(5)).await;
    assert!(b.is_leading());
    assert_eq!(watch_b.demoted(), 0);
    assert_eq!(watch_a.promoted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_leader_is_replaced() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (a, _watch_a) = elector(store.clone(), 1);
    let (b, watch_b) = elector(store, 2);

    a.start();
    sleep(Duration::from_millis(100)).await;
    b.start();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(watch_b.promoted(), 0);

    drop(a);
    assert!(wait_until(takeover_bound(), || watch_b.promoted() == 1).await);
    assert!(b.is_leading());
}
