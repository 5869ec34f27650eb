//! Starting workers and the channels the pool talks to them over.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use oriwork_frame::{FrameConfig, FrameReader, FrameWriter};
use oriwork_jobs::{Collaborators, Dispatcher};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use crate::worker::serve;

/// Pool side of a worker channel.
pub struct WorkerChannel {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    pub kill: KillHandle,
}

impl fmt::Debug for WorkerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerChannel")
            .field("kill", &self.kill)
            .finish_non_exhaustive()
    }
}

/// Forcibly ends a worker.
#[derive(Debug)]
pub enum KillHandle {
    /// Shuts down the socket shared with a worker thread.
    Stream(UnixStream),
    /// A child process, killed on drop.
    Process(Child),
}

impl KillHandle {
    pub fn kill(&mut self) -> io::Result<()> {
        match self {
            Self::Stream(stream) => match stream.shutdown(Shutdown::Both) {
                Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
                other => other,
            },
            Self::Process(child) => child.start_kill(),
        }
    }

    /// Wait for a process worker to exit on its own, killing it after `grace`.
    pub async fn reap(self, grace: Duration) {
        let Self::Process(mut child) = self else {
            return;
        };
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "worker process exited"),
            Ok(Err(err)) => tracing::debug!(error = %err, "could not wait for worker process"),
            Err(_) => {
                tracing::warn!(pid = child.id(), "worker process ignored shutdown, killing");
                let _ = child.start_kill();
            }
        }
    }

    /// OS process id, for process workers that are still running.
    pub fn pid(&self) -> Option<u32> {
        match self {
            Self::Stream(_) => None,
            Self::Process(child) => child.id(),
        }
    }
}

/// Starts workers for a pool.
///
/// Called from within the pool's tokio runtime.
pub trait Spawn: Send + Sync + 'static {
    fn spawn(&self, worker: usize) -> io::Result<WorkerChannel>;

    /// Short name for logs and stats.
    fn mode(&self) -> &'static str;
}

/// Runs each worker on its own thread, over a Unix socket pair.
#[derive(Debug, Clone)]
pub struct ThreadSpawner {
    collaborators: Collaborators,
    frame: FrameConfig,
}

impl ThreadSpawner {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            frame: FrameConfig::default(),
        }
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::new(Collaborators::default())
    }
}

impl Spawn for ThreadSpawner {
    fn spawn(&self, worker: usize) -> io::Result<WorkerChannel> {
        let (pool_end, worker_end) = UnixStream::pair()?;
        let worker_reader = worker_end.try_clone()?;
        let dispatcher = Dispatcher::new(self.collaborators.clone());
        let frame = self.frame.clone();

        std::thread::Builder::new()
            .name(format!("ori-worker-{worker}"))
            .spawn(move || {
                let reader = FrameReader::with_config(worker_reader, frame.clone());
                let writer = FrameWriter::with_config(worker_end, frame);
                if let Err(err) = serve(reader, writer, &dispatcher) {
                    tracing::warn!(worker, error = %err, "worker thread stopped");
                }
            })?;

        let kill = pool_end.try_clone()?;
        pool_end.set_nonblocking(true)?;
        let (reader, writer) = tokio::net::UnixStream::from_std(pool_end)?.into_split();

        Ok(WorkerChannel {
            reader: Box::new(reader),
            writer: Box::new(writer),
            kill: KillHandle::Stream(kill),
        })
    }

    fn mode(&self) -> &'static str {
        "thread"
    }
}

/// Runs each worker as a child process speaking frames over stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl ProcessSpawner {
    /// Spawn `<program> worker`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![OsString::from("worker")],
            envs: Vec::new(),
        }
    }

    /// Spawn the running executable as `<current_exe> worker`.
    pub fn current_exe() -> io::Result<Self> {
        std::env::current_exe().map(Self::new)
    }

    /// Replace the arguments passed to the program.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl Spawn for ProcessSpawner {
    fn spawn(&self, worker: usize) -> io::Result<WorkerChannel> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let missing = |pipe: &str| {
            io::Error::new(io::ErrorKind::BrokenPipe, format!("child {pipe} not captured"))
        };
        let writer = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let reader = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        tracing::debug!(
            worker,
            pid = child.id(),
            program = %self.program.display(),
            "spawned worker process"
        );

        Ok(WorkerChannel {
            reader: Box::new(reader),
            writer: Box::new(writer),
            kill: KillHandle::Process(child),
        })
    }

    fn mode(&self) -> &'static str {
        "process"
    }
}
