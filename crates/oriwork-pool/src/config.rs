use std::time::Duration;

use oriwork_frame::FrameConfig;

/// Pool behavior configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers. Default: available parallelism.
    pub size: usize,
    /// Replace workers that die.
    pub respawn: bool,
    /// How many times one worker slot may be respawned.
    pub max_respawns: u32,
    /// Applied to every job handle that has no explicit timeout.
    pub job_timeout: Option<Duration>,
    /// Frame limits for worker channels.
    pub frame: FrameConfig,
}

impl PoolConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size.max(1);
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    pub fn with_respawn(mut self, respawn: bool) -> Self {
        self.respawn = respawn;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            respawn: true,
            max_respawns: 16,
            job_timeout: None,
            frame: FrameConfig::default(),
        }
    }
}

/// Worker count used when none is configured.
pub fn default_size() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
}
