use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use oriwork_jobs::{
    Collaborators, EcdsaProvider, JobError, Secp256k1Backend, TxVerifier,
};
use oriwork_packet::{
    Coin, CoinView, EcSignPacket, Input, Outpoint, Output, ResultPacket, Transaction, VerifyFlags,
};
use oriwork_pool::{PoolConfig, PoolError, PoolStats, ThreadSpawner, WorkerPool, WorkerState};

/// Signs by echoing the message after a delay, tracking peak concurrency.
#[derive(Default)]
struct SlowEcdsa {
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
    order: Mutex<Vec<u8>>,
}

impl SlowEcdsa {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }
}

impl EcdsaProvider for SlowEcdsa {
    fn verify(&self, _: &[u8], _: &[u8], _: &[u8]) -> bool {
        true
    }

    fn sign(&self, msg: &[u8], _: &[u8]) -> oriwork_jobs::Result<Bytes> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(first) = msg.first() {
            self.order.lock().expect("order lock").push(*first);
        }
        std::thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(Bytes::copy_from_slice(msg))
    }
}

/// Panics inside any check job.
struct PanickingVerifier;

impl TxVerifier for PanickingVerifier {
    fn validate(&self, _: &Transaction, _: &CoinView, _: VerifyFlags) -> oriwork_jobs::Result<()> {
        panic!("verifier crashed");
    }

    fn validate_input(
        &self,
        _: &Transaction,
        _: u32,
        _: &Coin,
        _: VerifyFlags,
    ) -> oriwork_jobs::Result<()> {
        Err(JobError::Internal("unused".into()))
    }
}

fn with_ecdsa(ecdsa: Arc<dyn EcdsaProvider>) -> ThreadSpawner {
    let backend = Arc::new(Secp256k1Backend::new());
    ThreadSpawner::new(Collaborators::new(backend.clone(), backend, ecdsa))
}

fn config(size: usize) -> PoolConfig {
    PoolConfig::default().with_size(size)
}

async fn wait_for(pool: &WorkerPool, what: &str, pred: impl Fn(&PoolStats) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let stats = pool.stats();
        if pred(&stats) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}: {stats:?}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn sign_request(tag: u8) -> EcSignPacket {
    EcSignPacket {
        msg: Bytes::from(vec![tag; 32]),
        key: Bytes::from_static(&[0x01; 32]),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn real_backend_signs_and_verifies() {
    let pool = WorkerPool::start(config(2), ThreadSpawner::default()).expect("pool should start");
    let key = [0x42u8; 32];
    let public = Secp256k1Backend::new()
        .public_key(&key)
        .expect("fixed key should be valid");

    let signed = pool
        .ec_sign(vec![0x07; 32], key.to_vec())
        .await
        .expect("ecsign should succeed");
    let verified = pool
        .ec_verify(vec![0x07; 32], signed.signature.clone(), public.clone())
        .await
        .expect("ecverify should succeed");
    assert!(verified.valid);

    let tampered = pool
        .ec_verify(vec![0x08; 32], signed.signature, public)
        .await
        .expect("ecverify should succeed");
    assert!(!tampered.valid);

    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn never_runs_more_jobs_than_workers() {
    let ecdsa = SlowEcdsa::new(Duration::from_millis(40));
    let pool =
        WorkerPool::start(config(2), with_ecdsa(ecdsa.clone())).expect("pool should start");

    let handles: Vec<_> = (0..8u8)
        .map(|tag| pool.submit(sign_request(tag).into()))
        .collect();
    for (tag, handle) in handles.into_iter().enumerate() {
        match handle.await.expect("job should succeed") {
            ResultPacket::EcSign(result) => assert_eq!(result.signature[0], tag as u8),
            other => panic!("expected EcSignResult, got {other:?}"),
        }
    }

    assert!(ecdsa.peak.load(Ordering::SeqCst) <= 2);
    let stats = pool.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.workers.iter().map(|w| w.completed).sum::<u64>(), 8);
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queued_jobs_start_in_submission_order() {
    let ecdsa = SlowEcdsa::new(Duration::from_millis(5));
    let pool =
        WorkerPool::start(config(1), with_ecdsa(ecdsa.clone())).expect("pool should start");

    let handles: Vec<_> = (0..5u8)
        .map(|tag| pool.submit(sign_request(tag).into()))
        .collect();
    for handle in handles {
        handle.await.expect("job should succeed");
    }

    assert_eq!(*ecdsa.order.lock().expect("order lock"), vec![0, 1, 2, 3, 4]);
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_handler_is_an_error_result_and_keeps_the_worker() {
    let backend = Arc::new(Secp256k1Backend::new());
    let spawner = ThreadSpawner::new(Collaborators::new(
        Arc::new(PanickingVerifier),
        backend.clone(),
        backend,
    ));
    let pool = WorkerPool::start(config(2), spawner).expect("pool should start");

    let prevout = Outpoint::new([0x10; 32], 0);
    let tx = Transaction::new(vec![Input::new(prevout)], vec![Output::new(1, vec![0x02; 33])]);
    let view: CoinView = [(prevout, Output::new(2, vec![0x02; 33]))]
        .into_iter()
        .collect();

    // More panicking jobs than the respawn budget would allow if each one
    // took a worker down.
    let panics: Vec<_> = (0..4)
        .map(|_| pool.check(tx.clone(), view.clone(), VerifyFlags::STANDARD))
        .collect();
    let others: Vec<_> = (0..4u8)
        .map(|tag| pool.submit(sign_request(tag).into()))
        .collect();

    for handle in panics {
        match handle.await {
            Err(PoolError::Job(err)) => {
                assert_eq!(err.code, Some(oriwork_packet::FaultCode::Internal));
                assert!(err.message.contains("verifier crashed"));
            }
            other => panic!("expected Internal job error, got {other:?}"),
        }
    }
    for handle in others {
        handle.await.expect("sign jobs should succeed");
    }

    let stats = pool.stats();
    assert_eq!(stats.live(), 2);
    assert!(stats.workers.iter().all(|w| w.respawns == 0));
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn killing_a_busy_worker_loses_its_job_and_respawns() {
    let ecdsa = SlowEcdsa::new(Duration::from_millis(300));
    let pool = WorkerPool::start(config(1), with_ecdsa(ecdsa)).expect("pool should start");

    let handle = pool.submit(sign_request(1).into());
    let job_id = handle.job_id().expect("accepted job should have an id");
    wait_for(&pool, "busy worker", |s| s.busy() == 1).await;

    pool.kill_worker(0).expect("worker 0 should be killable");
    match handle.await {
        Err(PoolError::WorkerLost { worker: 0, job_id: lost }) => assert_eq!(lost, job_id),
        other => panic!("expected WorkerLost, got {other:?}"),
    }

    wait_for(&pool, "respawned worker", |s| {
        s.workers[0].respawns == 1 && s.workers[0].state == WorkerState::Idle
    })
    .await;
    let verified = pool
        .ec_verify(vec![0u8; 32], vec![0u8; 8], vec![0u8; 33])
        .await
        .expect("respawned worker should serve jobs");
    assert!(verified.valid);
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_abandons_the_job_but_keeps_the_worker() {
    let ecdsa = SlowEcdsa::new(Duration::from_millis(200));
    let pool = WorkerPool::start(config(1), with_ecdsa(ecdsa)).expect("pool should start");

    let outcome = pool
        .submit(sign_request(1).into())
        .with_timeout(Duration::from_millis(20))
        .await;
    assert!(matches!(outcome, Err(PoolError::Timeout(_))));
    assert_eq!(pool.stats().pending, 0);

    // The late result is discarded and the worker takes the next job.
    let verified = pool
        .ec_verify(vec![0u8; 32], vec![0u8; 8], vec![0u8; 33])
        .await
        .expect("worker should survive a timeout");
    assert!(verified.valid);
    assert_eq!(pool.stats().workers[0].respawns, 0);
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_workers_once_respawn_is_disabled() {
    let pool = WorkerPool::start(config(1).with_respawn(false), ThreadSpawner::default())
        .expect("pool should start");

    pool.kill_worker(0).expect("worker 0 should be killable");
    wait_for(&pool, "dead worker", |s| s.live() == 0).await;

    let outcome = pool.ec_sign(vec![0u8; 32], vec![0x01; 32]).await;
    assert!(matches!(outcome, Err(PoolError::NoWorkers)));
    assert!(matches!(pool.kill_worker(0), Err(PoolError::UnknownWorker(0))));
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_drains_in_flight_and_rejects_queued() {
    let ecdsa = SlowEcdsa::new(Duration::from_millis(100));
    let pool = WorkerPool::start(config(1), with_ecdsa(ecdsa)).expect("pool should start");

    let running = pool.submit(sign_request(1).into());
    wait_for(&pool, "busy worker", |s| s.busy() == 1).await;
    let queued = pool.submit(sign_request(2).into());
    assert_eq!(pool.stats().queued, 1);

    pool.shutdown().await;

    running.await.expect("in-flight job should finish");
    assert!(matches!(queued.await, Err(PoolError::Shutdown)));
    assert!(matches!(
        pool.submit(sign_request(3).into()).await,
        Err(PoolError::Shutdown)
    ));
    assert_eq!(pool.stats().live(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_request_is_rejected_at_submit() {
    let mut config = config(1);
    config.frame.max_payload_size = 64;
    let pool = WorkerPool::start(config, ThreadSpawner::default()).expect("pool should start");

    let handle = pool.submit(
        EcSignPacket {
            msg: Bytes::from(vec![0u8; 128]),
            key: Bytes::from_static(&[0x01; 32]),
        }
        .into(),
    );
    assert_eq!(handle.job_id(), None);
    assert!(matches!(handle.await, Err(PoolError::Frame(_))));
    assert_eq!(pool.stats().pending, 0);
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn error_results_surface_as_job_errors() {
    let pool = WorkerPool::start(config(1), ThreadSpawner::default()).expect("pool should start");

    // A 31-byte key is not a valid private key.
    match pool.ec_sign(vec![0u8; 32], vec![0x01; 31]).await {
        Err(PoolError::Job(err)) => assert_eq!(
            err.code,
            Some(oriwork_packet::FaultCode::InvalidPrivateKey)
        ),
        other => panic!("expected Job error, got {other:?}"),
    }

    let stats = serde_json::to_value(pool.stats()).expect("stats should serialize");
    assert_eq!(stats["mode"], "thread");
    assert_eq!(stats["workers"][0]["state"], "idle");
    pool.shutdown().await;
}
