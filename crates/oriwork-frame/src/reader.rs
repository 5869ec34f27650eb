use std::io::{ErrorKind, Read};

use crate::buffer::FrameBuffer;
use crate::codec::{FrameConfig, JobFrame};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: FrameBuffer,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: FrameBuffer::with_max_payload(config.max_payload_size),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<JobFrame> {
        loop {
            if let Some(frame) = self.buf.next_frame()? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if !self.buf.is_empty() {
                    tracing::debug!(buffered = self.buf.len(), "stream ended mid-frame");
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend(&chunk[..read]);
        }
    }

    /// Job id of a frame that is buffered but not yet complete or decodable.
    pub fn pending_job_id(&self) -> Option<u32> {
        self.buf.pending_job_id()
    }

    /// Command byte of a frame that is buffered but not yet complete or decodable.
    pub fn pending_command(&self) -> Option<u8> {
        self.buf.pending_command()
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Applies to the next frame header read.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
        self.buf.set_max_payload_size(max_payload_size);
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameReader<std::os::unix::net::UnixStream> {
    /// Create a frame reader for a Unix stream and apply read timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
