//! The worker pool: job queue, correlation and worker recovery.
//!
//! All bookkeeping lives in one `Mutex`-protected [`State`]; it is never held
//! across an `.await`. Each worker has one tokio task that owns its channel,
//! writes one job frame, awaits exactly one result frame, then takes the next
//! queued job or goes idle.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use oriwork_frame::{command_name, FrameError, JobCodec, JobFrame};
use oriwork_packet::{
    CheckInputPacket, CheckInputResultPacket, CheckPacket, CheckResultPacket, Coin, CoinView,
    EcSignPacket, EcSignResultPacket, EcVerifyPacket, EcVerifyResultPacket, KeyRing,
    RequestPacket, ResultPacket, SighashType, SignInputPacket, SignInputResultPacket, SignPacket,
    SignResultPacket, Transaction, VerifyFlags,
};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::spawn::{KillHandle, Spawn, WorkerChannel};
use crate::worker::WorkerState;

/// How long shutdown waits for a process worker to exit after its stdin closes.
const REAP_GRACE: Duration = Duration::from_secs(2);

type Reply = oneshot::Sender<Result<ResultPacket>>;

struct Job {
    frame: JobFrame,
}

struct Slot {
    state: WorkerState,
    respawns: u32,
    job_id: Option<u32>,
    completed: u64,
    inbox: Option<mpsc::UnboundedSender<Job>>,
    kill: Option<KillHandle>,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: WorkerState::Spawning,
            respawns: 0,
            job_id: None,
            completed: 0,
            inbox: None,
            kill: None,
        }
    }
}

struct State {
    slots: Vec<Slot>,
    queue: VecDeque<Job>,
    pending: HashMap<u32, Reply>,
    next_job_id: u32,
    closed: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl State {
    fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| Slot::new()).collect(),
            queue: VecDeque::new(),
            pending: HashMap::new(),
            next_job_id: 0,
            closed: false,
            tasks: Vec::new(),
        }
    }

    /// Next id not held by an unresolved job or still running on a worker.
    ///
    /// An abandoned job keeps its id reserved until its worker answers, so a
    /// late result can never resolve a newer job.
    fn allocate_id(&mut self) -> u32 {
        loop {
            let id = self.next_job_id;
            self.next_job_id = self.next_job_id.wrapping_add(1);
            if !self.pending.contains_key(&id) && !self.is_running(id) {
                return id;
            }
        }
    }

    fn is_running(&self, job_id: u32) -> bool {
        self.slots.iter().any(|slot| slot.job_id == Some(job_id))
    }

    fn has_live_worker(&self) -> bool {
        self.slots.iter().any(|slot| slot.state.is_live())
    }

    /// Hand `job` to worker `id`, giving it back if the worker cannot take it.
    fn assign(&mut self, id: usize, job: Job) -> std::result::Result<(), Job> {
        let slot = &mut self.slots[id];
        let Some(inbox) = &slot.inbox else {
            return Err(job);
        };
        let job_id = job.frame.job_id;
        match inbox.send(job) {
            Ok(()) => {
                slot.state = WorkerState::Busy;
                slot.job_id = Some(job_id);
                Ok(())
            }
            Err(mpsc::error::SendError(job)) => Err(job),
        }
    }

    /// Give worker `id` the oldest live queued job, or mark it idle.
    fn dispatch_next(&mut self, id: usize) {
        while let Some(job) = self.queue.pop_front() {
            if !self.pending.contains_key(&job.frame.job_id) {
                continue;
            }
            match self.assign(id, job) {
                Ok(()) => return,
                Err(job) => {
                    self.queue.push_front(job);
                    break;
                }
            }
        }
        self.slots[id].state = WorkerState::Idle;
    }

    fn reject_queued(&mut self, reason: impl Fn() -> PoolError) {
        for job in self.queue.drain(..) {
            if let Some(reply) = self.pending.remove(&job.frame.job_id) {
                let _ = reply.send(Err(reason()));
            }
        }
    }
}

struct Shared {
    config: PoolConfig,
    spawner: Arc<dyn Spawn>,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn worker `id` and start its task.
    fn launch(self: &Arc<Self>, id: usize) -> Result<()> {
        let WorkerChannel {
            reader,
            writer,
            mut kill,
        } = self
            .spawner
            .spawn(id)
            .map_err(|source| PoolError::Spawn { worker: id, source })?;
        let (inbox, jobs) = mpsc::unbounded_channel();

        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed {
            let _ = kill.kill();
            return Err(PoolError::Shutdown);
        }

        let pid = kill.pid();
        let slot = &mut state.slots[id];
        slot.inbox = Some(inbox);
        slot.kill = Some(kill);
        slot.job_id = None;
        state.dispatch_next(id);

        let task = tokio::spawn(run_worker(self.clone(), id, reader, writer, jobs));
        state.tasks.retain(|task| !task.is_finished());
        state.tasks.push(task);
        tracing::debug!(worker = id, ?pid, mode = self.spawner.mode(), "worker ready");
        Ok(())
    }

    /// Resolve the pending entry for `job_id` with the worker's answer.
    fn complete(&self, id: usize, job_id: u32, frame: JobFrame) {
        let outcome = if frame.job_id != job_id {
            Err(PoolError::Protocol(format!(
                "worker {id} answered job {} while running job {job_id}",
                frame.job_id
            )))
        } else {
            ResultPacket::from_frame(&frame).map_err(|err| {
                PoolError::Protocol(format!(
                    "undecodable {} frame: {err}",
                    command_name(frame.command)
                ))
            })
        };

        let reply = self.lock().pending.remove(&job_id);
        match reply {
            Some(reply) => {
                tracing::trace!(worker = id, job_id, "job completed");
                let _ = reply.send(outcome);
            }
            None => tracing::debug!(worker = id, job_id, "discarding stale result"),
        }
    }

    /// Worker `id` is free again.
    fn finish(&self, id: usize) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let slot = &mut state.slots[id];
        slot.job_id = None;
        slot.completed += 1;
        if slot.state == WorkerState::Busy {
            state.dispatch_next(id);
        }
    }

    /// Worker `id` exited after its inbox closed.
    fn retire(&self, id: usize) {
        let mut state = self.lock();
        let slot = &mut state.slots[id];
        slot.state = WorkerState::Dead;
        slot.inbox = None;
        tracing::debug!(worker = id, completed = slot.completed, "worker retired");
    }

    /// Worker `id` died: fail its job, then respawn or give up on it.
    fn worker_lost(self: &Arc<Self>, id: usize, reason: &str) {
        let (lost, respawn, kill) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let slot = &mut state.slots[id];
            slot.state = WorkerState::Dead;
            slot.inbox = None;
            let kill = slot.kill.take();
            let job_id = slot.job_id.take();

            let respawn = !state.closed
                && self.config.respawn
                && slot.respawns < self.config.max_respawns;
            if respawn {
                slot.respawns += 1;
                slot.state = WorkerState::Spawning;
            }

            let lost = job_id.and_then(|job_id| {
                state
                    .pending
                    .remove(&job_id)
                    .map(|reply| (job_id, reply))
            });
            if !state.has_live_worker() {
                state.reject_queued(|| PoolError::NoWorkers);
            }
            (lost, respawn, kill)
        };

        if let Some(mut kill) = kill {
            let _ = kill.kill();
        }

        match lost {
            Some((job_id, reply)) => {
                tracing::warn!(worker = id, job_id, reason, "worker lost with job in flight");
                let _ = reply.send(Err(PoolError::WorkerLost { worker: id, job_id }));
            }
            None => tracing::warn!(worker = id, reason, "worker lost"),
        }

        if respawn {
            if let Err(err) = self.launch(id) {
                tracing::error!(worker = id, error = %err, "respawn failed");
                let mut state = self.lock();
                state.slots[id].state = WorkerState::Dead;
                if !state.has_live_worker() {
                    state.reject_queued(|| PoolError::NoWorkers);
                }
            }
        }
    }

    /// Stop accepting work, fail queued jobs and close every worker inbox.
    fn close(&self) -> Vec<JoinHandle<()>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.closed {
            state.closed = true;
            state.reject_queued(|| PoolError::Shutdown);
            for slot in &mut state.slots {
                slot.inbox = None;
                if slot.state.is_live() {
                    slot.state = WorkerState::Draining;
                }
            }
        }
        std::mem::take(&mut state.tasks)
    }

    /// Drop the pending entry and any queued copy of a job nobody waits for.
    fn abandon(&self, job_id: u32) {
        let mut state = self.lock();
        if state.pending.remove(&job_id).is_some() {
            state.queue.retain(|job| job.frame.job_id != job_id);
            tracing::debug!(job_id, "job abandoned");
        }
    }
}

enum Exit {
    /// The pool closed the inbox.
    Closed,
    /// The channel broke.
    Lost(String),
}

type Reader = FramedRead<Box<dyn AsyncRead + Send + Unpin>, JobCodec>;
type Writer = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, JobCodec>;

async fn run_worker(
    shared: Arc<Shared>,
    id: usize,
    reader: Box<dyn AsyncRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
) {
    let max = shared.config.frame.max_payload_size;
    let mut reader: Reader = FramedRead::new(reader, JobCodec::with_max_payload(max));
    let mut writer: Writer = FramedWrite::new(writer, JobCodec::with_max_payload(max));

    let exit = loop {
        let job = tokio::select! {
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break Exit::Closed,
            },
            unsolicited = reader.next() => match unsolicited {
                Some(Ok(frame)) => {
                    tracing::warn!(worker = id, job_id = frame.job_id, "discarding unsolicited frame");
                    continue;
                }
                Some(Err(err)) => break Exit::Lost(err.to_string()),
                None => break Exit::Lost("channel closed".into()),
            },
        };

        let job_id = job.frame.job_id;
        let command = job.frame.command;
        tracing::trace!(worker = id, job_id, command = command_name(command), "job assigned");

        if let Err(err) = writer.send(job.frame).await {
            break Exit::Lost(err.to_string());
        }
        match reader.next().await {
            Some(Ok(frame)) => shared.complete(id, job_id, frame),
            Some(Err(err @ (FrameError::Io(_) | FrameError::ConnectionClosed))) => {
                break Exit::Lost(err.to_string());
            }
            Some(Err(err)) => {
                // The stream is desynced; fail the job and drop the worker.
                if let Some(reply) = shared.lock().pending.remove(&job_id) {
                    let _ = reply.send(Err(PoolError::Frame(err)));
                }
                break Exit::Lost("undecodable result frame".into());
            }
            None => break Exit::Lost("channel closed".into()),
        }
        shared.finish(id);
    };

    match exit {
        Exit::Closed => {
            // Dropping the writer closes the channel; the worker sees EOF and exits.
            drop(writer);
            shared.retire(id);
        }
        Exit::Lost(reason) => shared.worker_lost(id, &reason),
    }
}

/// Snapshot of one worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub id: usize,
    pub state: WorkerState,
    pub respawns: u32,
    pub job_id: Option<u32>,
    pub completed: u64,
    pub pid: Option<u32>,
}

/// Snapshot of the pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub mode: &'static str,
    pub workers: Vec<WorkerStats>,
    pub queued: usize,
    pub pending: usize,
}

impl PoolStats {
    pub fn live(&self) -> usize {
        self.workers.iter().filter(|w| w.state.is_live()).count()
    }

    pub fn busy(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state == WorkerState::Busy)
            .count()
    }
}

enum HandleState {
    Waiting(oneshot::Receiver<Result<ResultPacket>>),
    Failed(PoolError),
}

/// Completion handle for a submitted job. Await it for the result.
pub struct JobHandle {
    job_id: Option<u32>,
    state: HandleState,
    timeout: Option<Duration>,
    shared: Weak<Shared>,
}

impl JobHandle {
    fn failed(err: PoolError) -> Self {
        Self {
            job_id: None,
            state: HandleState::Failed(err),
            timeout: None,
            shared: Weak::new(),
        }
    }

    /// Id assigned to the job, unless it was rejected at submit.
    pub fn job_id(&self) -> Option<u32> {
        self.job_id
    }

    /// Reject with [`PoolError::Timeout`] if no result arrives within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn wait(self) -> Result<ResultPacket> {
        let rx = match self.state {
            HandleState::Failed(err) => return Err(err),
            HandleState::Waiting(rx) => rx,
        };

        let received = match self.timeout {
            None => rx.await,
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    if let (Some(shared), Some(job_id)) = (self.shared.upgrade(), self.job_id) {
                        shared.abandon(job_id);
                    }
                    return Err(PoolError::Timeout(limit));
                }
            },
        };
        // A dropped sender means the pool went away with the job unresolved.
        received.unwrap_or_else(|_| Err(PoolError::Shutdown))
    }
}

impl IntoFuture for JobHandle {
    type Output = Result<ResultPacket>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A fixed-size set of workers executing jobs in submission order.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Spawn `config.size` workers. Must be called inside a tokio runtime.
    pub fn start(config: PoolConfig, spawner: impl Spawn) -> Result<Self> {
        let size = config.size.max(1);
        let shared = Arc::new(Shared {
            config,
            spawner: Arc::new(spawner),
            state: Mutex::new(State::new(size)),
        });

        for id in 0..size {
            if let Err(err) = shared.launch(id) {
                shared.close();
                return Err(err);
            }
        }

        tracing::info!(size, mode = shared.spawner.mode(), "worker pool started");
        Ok(Self { shared })
    }

    /// Queue a job. Never blocks; await the handle for the result.
    pub fn submit(&self, request: RequestPacket) -> JobHandle {
        let max = self.shared.config.frame.max_payload_size;
        let size = request.encoded_size();
        if size > max {
            return JobHandle::failed(FrameError::PayloadTooLarge { size, max }.into());
        }

        let (reply, rx) = oneshot::channel();
        let job_id = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            if state.closed {
                return JobHandle::failed(PoolError::Shutdown);
            }
            if !state.has_live_worker() {
                return JobHandle::failed(PoolError::NoWorkers);
            }

            let job_id = state.allocate_id();
            state.pending.insert(job_id, reply);
            let mut job = Job {
                frame: request.to_frame(job_id),
            };

            let idle: Vec<usize> = (0..state.slots.len())
                .filter(|&id| state.slots[id].state == WorkerState::Idle)
                .collect();
            for id in idle {
                match state.assign(id, job) {
                    Ok(()) => {
                        tracing::trace!(worker = id, job_id, "assigned to idle worker");
                        return self.handle(job_id, rx);
                    }
                    Err(returned) => job = returned,
                }
            }
            state.queue.push_back(job);
            job_id
        };

        tracing::trace!(job_id, command = command_name(request.command_code()), "job queued");
        self.handle(job_id, rx)
    }

    fn handle(&self, job_id: u32, rx: oneshot::Receiver<Result<ResultPacket>>) -> JobHandle {
        JobHandle {
            job_id: Some(job_id),
            state: HandleState::Waiting(rx),
            timeout: self.shared.config.job_timeout,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Submit and await.
    pub async fn execute(&self, request: RequestPacket) -> Result<ResultPacket> {
        self.submit(request).await
    }

    pub async fn check(
        &self,
        tx: Transaction,
        view: CoinView,
        flags: VerifyFlags,
    ) -> Result<CheckResultPacket> {
        match self.execute(CheckPacket { tx, view, flags }.into()).await? {
            ResultPacket::Check(result) => Ok(result),
            other => Err(mismatch("CHECKRESULT", other)),
        }
    }

    pub async fn check_input(
        &self,
        tx: Transaction,
        index: u32,
        coin: Coin,
        flags: VerifyFlags,
    ) -> Result<CheckInputResultPacket> {
        let request = CheckInputPacket {
            tx,
            index,
            coin,
            flags,
        };
        match self.execute(request.into()).await? {
            ResultPacket::CheckInput(result) => Ok(result),
            other => Err(mismatch("CHECKINPUTRESULT", other)),
        }
    }

    pub async fn sign(
        &self,
        tx: Transaction,
        view: CoinView,
        rings: Vec<KeyRing>,
        sighash: SighashType,
    ) -> Result<SignResultPacket> {
        let request = SignPacket {
            tx,
            view,
            rings,
            sighash,
        };
        match self.execute(request.into()).await? {
            ResultPacket::Sign(result) => Ok(result),
            other => Err(mismatch("SIGNRESULT", other)),
        }
    }

    pub async fn sign_input(
        &self,
        tx: Transaction,
        index: u32,
        coin: Coin,
        ring: KeyRing,
        sighash: SighashType,
    ) -> Result<SignInputResultPacket> {
        let request = SignInputPacket {
            tx,
            index,
            coin,
            ring,
            sighash,
        };
        match self.execute(request.into()).await? {
            ResultPacket::SignInput(result) => Ok(result),
            other => Err(mismatch("SIGNINPUTRESULT", other)),
        }
    }

    pub async fn ec_verify(
        &self,
        msg: impl Into<Bytes>,
        sig: impl Into<Bytes>,
        key: impl Into<Bytes>,
    ) -> Result<EcVerifyResultPacket> {
        let request = EcVerifyPacket {
            msg: msg.into(),
            sig: sig.into(),
            key: key.into(),
        };
        match self.execute(request.into()).await? {
            ResultPacket::EcVerify(result) => Ok(result),
            other => Err(mismatch("ECVERIFYRESULT", other)),
        }
    }

    pub async fn ec_sign(
        &self,
        msg: impl Into<Bytes>,
        key: impl Into<Bytes>,
    ) -> Result<EcSignResultPacket> {
        let request = EcSignPacket {
            msg: msg.into(),
            key: key.into(),
        };
        match self.execute(request.into()).await? {
            ResultPacket::EcSign(result) => Ok(result),
            other => Err(mismatch("ECSIGNRESULT", other)),
        }
    }

    /// Forcibly terminate worker `id`. Its in-flight job fails with `WorkerLost`.
    pub fn kill_worker(&self, id: usize) -> Result<()> {
        let mut state = self.shared.lock();
        let kill = state
            .slots
            .get_mut(id)
            .and_then(|slot| slot.kill.as_mut())
            .ok_or(PoolError::UnknownWorker(id))?;
        tracing::info!(worker = id, "killing worker");
        kill.kill()?;
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            mode: self.shared.spawner.mode(),
            workers: state
                .slots
                .iter()
                .enumerate()
                .map(|(id, slot)| WorkerStats {
                    id,
                    state: slot.state,
                    respawns: slot.respawns,
                    job_id: slot.job_id,
                    completed: slot.completed,
                    pid: slot.kill.as_ref().and_then(KillHandle::pid),
                })
                .collect(),
            queued: state.queue.len(),
            pending: state.pending.len(),
        }
    }

    pub fn size(&self) -> usize {
        self.shared.lock().slots.len()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Drain in-flight jobs, reject queued ones and wait for every worker to exit.
    pub async fn shutdown(&self) {
        let tasks = self.shared.close();
        for task in tasks {
            if let Err(err) = task.await {
                tracing::debug!(error = %err, "worker task ended abnormally");
            }
        }

        let kills: Vec<KillHandle> = self
            .shared
            .lock()
            .slots
            .iter_mut()
            .filter_map(|slot| slot.kill.take())
            .collect();
        for kill in kills {
            kill.reap(REAP_GRACE).await;
        }
        tracing::info!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("mode", &self.shared.spawner.mode())
            .field("size", &self.size())
            .finish()
    }
}

fn mismatch(expected: &'static str, got: ResultPacket) -> PoolError {
    match got {
        ResultPacket::Error(err) => PoolError::Job(err),
        other => PoolError::UnexpectedResult {
            expected,
            got: other.kind(),
        },
    }
}

#[cfg(test)]
mod tests {
    use oriwork_packet::{ErrorResultPacket, FaultCode};

    use super::*;

    #[test]
    fn job_ids_skip_pending_entries() {
        let mut state = State::new(1);
        state.next_job_id = u32::MAX;
        let (reply, _rx) = oneshot::channel();
        state.pending.insert(0, reply);

        assert_eq!(state.allocate_id(), u32::MAX);
        // 0 is still pending, so the counter wraps past it.
        assert_eq!(state.allocate_id(), 1);
    }

    #[test]
    fn job_ids_skip_ids_still_running_on_a_worker() {
        let mut state = State::new(2);
        state.next_job_id = u32::MAX;
        // Abandoned after a timeout: no pending entry, but worker 1 still runs it.
        state.slots[1].job_id = Some(0);

        assert_eq!(state.allocate_id(), u32::MAX);
        assert_eq!(state.allocate_id(), 1);

        state.slots[1].job_id = None;
        state.next_job_id = 0;
        assert_eq!(state.allocate_id(), 0);
    }

    #[test]
    fn dispatch_without_inbox_leaves_job_queued() {
        let mut state = State::new(1);
        let (reply, _rx) = oneshot::channel();
        state.pending.insert(3, reply);
        state.queue.push_back(Job {
            frame: JobFrame::new(3, 0x0f, Bytes::new()),
        });

        state.dispatch_next(0);
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.slots[0].state, WorkerState::Idle);
    }

    #[test]
    fn dispatch_skips_abandoned_jobs() {
        let mut state = State::new(1);
        let (inbox, mut jobs) = mpsc::unbounded_channel();
        state.slots[0].inbox = Some(inbox);

        let (reply, _rx) = oneshot::channel();
        state.pending.insert(2, reply);
        state.queue.push_back(Job {
            frame: JobFrame::new(1, 0x0f, Bytes::new()),
        });
        state.queue.push_back(Job {
            frame: JobFrame::new(2, 0x0f, Bytes::new()),
        });

        state.dispatch_next(0);
        assert!(state.queue.is_empty());
        assert_eq!(state.slots[0].state, WorkerState::Busy);
        assert_eq!(state.slots[0].job_id, Some(2));
        assert_eq!(jobs.try_recv().map(|job| job.frame.job_id).ok(), Some(2));
    }

    #[test]
    fn mismatch_maps_error_results() {
        let err = mismatch(
            "CHECKRESULT",
            ErrorResultPacket::new(0x05, FaultCode::Internal, "boom").into(),
        );
        assert!(matches!(err, PoolError::Job(_)));

        let err = mismatch(
            "CHECKRESULT",
            EcVerifyResultPacket { valid: true }.into(),
        );
        assert!(matches!(
            err,
            PoolError::UnexpectedResult {
                expected: "CHECKRESULT",
                got: "ECVERIFYRESULT"
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn respawns_do_not_accumulate_finished_tasks() {
        let pool = WorkerPool::start(
            PoolConfig::default().with_size(1),
            crate::spawn::ThreadSpawner::default(),
        )
        .expect("pool should start");

        for round in 1..=4u32 {
            pool.kill_worker(0).expect("worker 0 should be killable");
            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            loop {
                let settled = {
                    let state = pool.shared.lock();
                    state.slots[0].respawns == round
                        && state.slots[0].state == WorkerState::Idle
                        && state.tasks.iter().filter(|t| !t.is_finished()).count() == 1
                };
                if settled {
                    break;
                }
                assert!(tokio::time::Instant::now() < deadline, "respawn {round} stalled");
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        // Finished tasks are pruned on each relaunch.
        assert!(pool.shared.lock().tasks.len() <= 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn failed_handle_resolves_immediately() {
        let handle = JobHandle::failed(PoolError::NoWorkers);
        assert_eq!(handle.job_id(), None);
        assert!(matches!(handle.await, Err(PoolError::NoWorkers)));
    }
}
