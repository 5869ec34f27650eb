use std::fmt;
use std::io;

use oriwork_frame::FrameError;
use oriwork_packet::FaultCode;
use oriwork_pool::PoolError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const WORKER_LOST: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn pool_error(context: &str, err: PoolError) -> CliError {
    match err {
        PoolError::Frame(err) => frame_error(context, err),
        PoolError::Spawn { source, .. } | PoolError::Io(source) => io_error(context, source),
        PoolError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PoolError::WorkerLost { .. } | PoolError::NoWorkers => {
            CliError::new(WORKER_LOST, format!("{context}: {err}"))
        }
        PoolError::Job(ref job) => match job.code {
            Some(FaultCode::InvalidPrivateKey | FaultCode::InvalidInput) => {
                CliError::new(DATA_INVALID, format!("{context}: {err}"))
            }
            _ => CliError::new(FAILURE, format!("{context}: {err}")),
        },
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
