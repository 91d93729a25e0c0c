/// Share accounting suite
///
/// End-to-end coverage of the accounting engine: exact counters under
/// parallel submission, the pool-wide difficulty average across concurrent
/// instances of one worker name, shift rotation boundaries, and best-effort
/// worker-record persistence.
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use galena_accounting::{
    AccountingConfig, Client, DiskProvider, Handler, JsonWorkerStore, MemoryWorkerStore,
    PoolContext, Session, Worker,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("galena-suite-{}-{}", tag, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn pool_context(tag: &str) -> Arc<PoolContext> {
    init_tracing();
    PoolContext::builder()
        .config(AccountingConfig {
            persist_dir: scratch_dir(tag),
            ..AccountingConfig::default()
        })
        .provider(Arc::new(DiskProvider))
        .store(Arc::new(MemoryWorkerStore::new()))
        .build()
        .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// 1. Exact counters under parallel submission
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn parallel_share_counts_are_exact() {
    let ctx = pool_context("parallel-shares");
    let client = Client::new("alice", ctx.clone());
    let session = Session::new(ctx.ids().next(), 1000.0);
    let worker = Worker::create(&client, "rig01", session).unwrap();
    client.add_worker(worker.clone());

    let callers = 16u64;
    let per_caller = 5_000u64;
    (0..callers).into_par_iter().for_each(|_| {
        for _ in 0..per_caller {
            worker.increment_shares(3.0);
        }
    });

    assert_eq!(worker.shares_this_block(), callers * per_caller);
    let expected = (callers * per_caller) as f64 * 3.0;
    assert!((worker.cumulative_difficulty() - expected).abs() < 1e-3);
}

#[test]
fn parallel_invalid_and_stale_counts_are_exact() {
    let ctx = pool_context("parallel-invalid");
    let client = Client::new("alice", ctx.clone());
    let session = Session::new(ctx.ids().next(), 1000.0);
    let worker = Worker::create(&client, "rig01", session).unwrap();
    client.add_worker(worker.clone());

    (0..8u64).into_par_iter().for_each(|i| {
        for _ in 0..1_000 {
            if i % 2 == 0 {
                worker.increment_invalid_shares();
            } else {
                worker.increment_stale_shares();
            }
        }
    });

    assert_eq!(worker.invalid_shares(), 4_000);
    assert_eq!(worker.stale_shares(), 4_000);
}

// ═══════════════════════════════════════════════════════════════════════════
// 2. Pool-wide difficulty average
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn current_difficulty_is_zero_with_no_live_match() {
    let ctx = pool_context("diff-zero");
    let client = Client::new("alice", ctx.clone());
    let session = Session::new(ctx.ids().next(), 5000.0);
    let worker = Worker::create(&client, "rig01", session).unwrap();
    client.add_worker(worker.clone());

    // nothing registered with the dispatcher
    assert_eq!(worker.current_difficulty(), 0.0);
}

#[test]
fn current_difficulty_averages_matching_connections() {
    let ctx = pool_context("diff-avg");
    let client = Client::new("alice", ctx.clone());
    let stranger = Client::new("mallory", ctx.clone());

    let difficulties = [1000.0, 3000.0, 8000.0];
    let mut first = None;
    for d in difficulties {
        let session = Session::new(ctx.ids().next(), d);
        let worker = Worker::create(&client, "rig01", session.clone()).unwrap();
        client.add_worker(worker.clone());
        ctx.dispatcher().add(Handler::new(
            ctx.ids().next(),
            client.clone(),
            worker.clone(),
            session,
        ));
        first.get_or_insert(worker);
    }

    // same worker name under a different account must not count
    let decoy_session = Session::new(ctx.ids().next(), 1_000_000.0);
    let decoy = Worker::create(&stranger, "rig01", decoy_session.clone()).unwrap();
    stranger.add_worker(decoy.clone());
    ctx.dispatcher().add(Handler::new(
        ctx.ids().next(),
        stranger.clone(),
        decoy,
        decoy_session,
    ));

    let expected = difficulties.iter().sum::<f64>() / difficulties.len() as f64;
    assert_eq!(first.unwrap().current_difficulty(), expected);
}

#[test]
fn current_difficulty_drops_to_zero_after_disconnects() {
    let ctx = pool_context("diff-disconnect");
    let client = Client::new("alice", ctx.clone());
    let session = Session::new(ctx.ids().next(), 2048.0);
    let worker = Worker::create(&client, "rig01", session.clone()).unwrap();
    client.add_worker(worker.clone());

    let handler = Handler::new(ctx.ids().next(), client.clone(), worker.clone(), session);
    ctx.dispatcher().add(handler.clone());
    assert_eq!(worker.current_difficulty(), 2048.0);
    assert_eq!(ctx.dispatcher().len(), 1);

    ctx.dispatcher().remove(&handler);
    assert!(ctx.dispatcher().is_empty());
    assert_eq!(worker.current_difficulty(), 0.0);
    // state read out earlier stays independently owned
    assert_eq!(handler.session().current_difficulty(), 2048.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// 3. Shift rotation boundary
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn rotation_partitions_counts_exactly() {
    let ctx = pool_context("rotation");
    let client = Client::new("alice", ctx.clone());
    let session = Session::new(ctx.ids().next(), 1000.0);
    let worker = Worker::create(&client, "rig01", session.clone()).unwrap();
    client.add_worker(worker.clone());

    for _ in 0..40 {
        worker.increment_shares(5.0);
    }
    let finalized = session.rotate();
    assert_eq!(finalized.shares(), 40);
    assert_eq!(finalized.cumulative_difficulty(), 200.0);
    assert_eq!(worker.shares_this_block(), 0);

    for _ in 0..15 {
        worker.increment_shares(5.0);
    }
    assert_eq!(worker.shares_this_block(), 15);
    assert_eq!(finalized.shares(), 40);
}

#[test]
fn rotation_while_submitting_never_drops_a_share() {
    let ctx = pool_context("rotation-fire");
    let client = Client::new("alice", ctx.clone());
    let session = Session::new(ctx.ids().next(), 1000.0);
    let worker = Worker::create(&client, "rig01", session.clone()).unwrap();
    client.add_worker(worker.clone());

    let total_shares = 40_000u64;
    let rotations = 64u64;
    let (drained, _) = rayon::join(
        || {
            let mut drained = Vec::new();
            for _ in 0..rotations {
                drained.push(session.rotate());
                std::thread::yield_now();
            }
            drained
        },
        || {
            (0..total_shares).into_par_iter().for_each(|_| {
                worker.increment_shares(1.0);
            });
        },
    );

    let tail = session.rotate();
    let counted: u64 = drained.iter().map(|s| s.shares()).sum::<u64>() + tail.shares();
    assert_eq!(counted, total_shares);
}

// ═══════════════════════════════════════════════════════════════════════════
// 4. Worker records on disk
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn block_find_lands_in_json_store() -> anyhow::Result<()> {
    init_tracing();
    let root = scratch_dir("json-store");
    let store = Arc::new(JsonWorkerStore::new(&root));
    let ctx = PoolContext::builder()
        .config(AccountingConfig {
            persist_dir: root.clone(),
            ..AccountingConfig::default()
        })
        .provider(Arc::new(DiskProvider))
        .store(store.clone())
        .build()?;

    let client = Client::new("alice", ctx.clone());
    let session = Session::new(ctx.ids().next(), 1000.0);
    let worker = Worker::create(&client, "rig01", session)?;
    client.add_worker(worker.clone());

    worker.increment_blocks_found();
    worker.increment_blocks_found();

    let record = store.load("alice", "rig01")?;
    assert_eq!(record.blocks_found, 2);
    assert_eq!(record.name, "rig01");
    assert_eq!(record.client, "alice");

    // the first-instance worker log exists alongside the record
    let log_path = root.join("clients").join("alice").join("rig01.log");
    let log = std::fs::read_to_string(log_path)?;
    assert_eq!(log.lines().count(), 2);

    std::fs::remove_dir_all(&root)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// 5. Connection lifecycle
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn client_keeps_every_concurrent_instance() {
    let ctx = pool_context("instances");
    let client = Client::new("alice", ctx.clone());

    let a = Worker::create(&client, "rig01", Session::new(ctx.ids().next(), 1000.0)).unwrap();
    client.add_worker(a.clone());
    let b = Worker::create(&client, "rig01", Session::new(ctx.ids().next(), 1000.0)).unwrap();
    client.add_worker(b.clone());

    assert_eq!(client.worker_count(), 2);
    assert_eq!(client.worker("rig01").unwrap().id(), a.id());

    a.increment_shares(10.0);
    b.increment_shares(10.0);
    b.increment_shares(10.0);
    // instances keep independent counters
    assert_eq!(a.shares_this_block(), 1);
    assert_eq!(b.shares_this_block(), 2);

    client.remove_worker(&a);
    assert_eq!(client.worker_count(), 1);
    assert_eq!(client.worker("rig01").unwrap().id(), b.id());
    client.remove_worker(&b);
    assert!(client.worker("rig01").is_none());
}
