//! Framed worker pool for transaction verification and signing.
//!
//! A caller hands request packets to a [`pool::WorkerPool`]; each job is
//! serialized into a frame, executed by a worker thread or child process, and
//! its result frame is correlated back to the caller by job id.
//!
//! # Crate Structure
//!
//! - [`frame`]: the length-prefixed, terminator-checked job frame
//! - [`packet`]: typed request and result payloads
//! - [`jobs`]: the dispatcher and its crypto collaborators
//! - [`pool`]: workers, spawners and the pool itself

/// Re-export frame types.
pub mod frame {
    pub use oriwork_frame::*;
}

/// Re-export packet types.
pub mod packet {
    pub use oriwork_packet::*;
}

/// Re-export dispatcher and collaborator types.
pub mod jobs {
    pub use oriwork_jobs::*;
}

/// Re-export pool types.
pub mod pool {
    pub use oriwork_pool::*;
}

pub use oriwork_jobs::{Collaborators, Dispatcher};
pub use oriwork_packet::{RequestPacket, ResultPacket};
pub use oriwork_pool::{PoolConfig, PoolError, ProcessSpawner, ThreadSpawner, WorkerPool};
