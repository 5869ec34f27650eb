use std::time::Duration;

use oriwork_packet::ErrorResultPacket;

/// Errors that can occur in pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] oriwork_frame::FrameError),

    /// Payload encoding or decoding error.
    #[error("packet error: {0}")]
    Packet(#[from] oriwork_packet::PacketError),

    /// A worker sent something the pool cannot correlate or decode.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The worker running the job exited or its channel broke.
    #[error("worker {worker} lost while running job {job_id}")]
    WorkerLost { worker: usize, job_id: u32 },

    /// No result arrived in time. The worker is not interrupted.
    #[error("job timed out after {0:?}")]
    Timeout(Duration),

    /// Every worker is dead and none can be respawned.
    #[error("no live workers")]
    NoWorkers,

    /// The pool is shutting down.
    #[error("pool is shut down")]
    Shutdown,

    /// The worker answered with an `ErrorResult`.
    #[error("job failed: {0}")]
    Job(ErrorResultPacket),

    /// The worker answered with a result of the wrong kind.
    #[error("expected {expected}, got {got}")]
    UnexpectedResult {
        expected: &'static str,
        got: &'static str,
    },

    /// A worker could not be started.
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while signalling a worker.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker id does not exist or has no live channel.
    #[error("unknown or dead worker {0}")]
    UnknownWorker(usize),
}

pub type Result<T> = std::result::Result<T, PoolError>;
