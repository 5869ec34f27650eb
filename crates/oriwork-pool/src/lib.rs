//! Worker pool for oriwork jobs.
//!
//! A [`WorkerPool`] owns a fixed number of workers, each running one job at a
//! time over a framed channel. Workers are threads ([`ThreadSpawner`]) or
//! child processes ([`ProcessSpawner`]); a worker that dies fails only the job
//! it was running and is replaced.
//!
//! ```no_run
//! # async fn demo() -> oriwork_pool::Result<()> {
//! use oriwork_pool::{PoolConfig, ThreadSpawner, WorkerPool};
//!
//! let pool = WorkerPool::start(PoolConfig::default().with_size(4), ThreadSpawner::default())?;
//! let signed = pool.ec_sign(vec![0x11; 32], vec![0x22; 32]).await?;
//! println!("{} byte signature", signed.signature.len());
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod spawn;
pub mod worker;

pub use config::{default_size, PoolConfig};
pub use error::{PoolError, Result};
pub use pool::{JobHandle, PoolStats, WorkerPool, WorkerStats};
pub use spawn::{KillHandle, ProcessSpawner, Spawn, ThreadSpawner, WorkerChannel};
pub use worker::{run_stdio, serve, set_process_label, WorkerState, PROCESS_LABEL};
