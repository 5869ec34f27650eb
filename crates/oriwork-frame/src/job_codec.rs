//! `tokio_util` codec over the job frame format.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::buffer::split_frame;
use crate::codec::{JobFrame, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Async framing for pool-side worker channels.
#[derive(Debug, Clone)]
pub struct JobCodec {
    max_payload_size: usize,
}

impl JobCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for JobCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JobCodec {
    type Item = JobFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<JobFrame>> {
        split_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<JobFrame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<JobFrame> for JobCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: JobFrame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload_size,
            });
        }
        frame.encode(dst)
    }
}
