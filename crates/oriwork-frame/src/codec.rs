use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: job id (4) + command (1) + payload length (4) = 9 bytes.
pub const HEADER_SIZE: usize = 9;

/// Terminator byte appended after every payload.
pub const TERMINATOR: u8 = 0x0a;

/// Header plus terminator: the size of a frame with an empty payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + 1;

/// Default maximum payload size: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

const COMMAND_OFFSET: usize = 4;
const LENGTH_OFFSET: usize = 5;

/// One job request or result on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFrame {
    /// Caller-assigned id, unique among outstanding jobs on a channel.
    pub job_id: u32,
    /// Command code (see [`crate::command`]).
    pub command: u8,
    /// Command-specific payload.
    pub payload: Bytes,
}

impl JobFrame {
    /// Create a new frame.
    pub fn new(job_id: u32, command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            job_id,
            command,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload + terminator).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Append the wire encoding of this frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_frame(self.job_id, self.command, &self.payload, dst)
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────┬──────────────┬──────────────┬────────────┐
/// │ Job id       │ Command  │ Length       │ Payload      │ Terminator │
/// │ (4B LE)      │ (1B)     │ (4B LE)      │ (Length B)   │ 0x0a       │
/// └──────────────┴──────────┴──────────────┴──────────────┴────────────┘
/// ```
pub fn encode_frame(job_id: u32, command: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_with(job_id, command, payload.len(), dst, |buf| {
        buf.put_slice(payload)
    })
}

/// Encode a frame whose payload is produced by `write`.
///
/// The length field is back-patched with the number of bytes `write`
/// actually appended, so it always matches the payload on the wire.
/// `size_hint` only pre-sizes the buffer.
pub fn encode_with<F>(
    job_id: u32,
    command: u8,
    size_hint: usize,
    dst: &mut BytesMut,
    write: F,
) -> Result<()>
where
    F: FnOnce(&mut BytesMut),
{
    let start = dst.len();
    dst.reserve(FRAME_OVERHEAD + size_hint);
    dst.put_u32_le(job_id);
    dst.put_u8(command);
    dst.put_u32_le(0);

    let body = dst.len();
    write(dst);
    let written = dst.len() - body;

    if written > u32::MAX as usize {
        dst.truncate(start);
        return Err(FrameError::PayloadTooLarge {
            size: written,
            max: u32::MAX as usize,
        });
    }

    let length_at = start + LENGTH_OFFSET;
    dst[length_at..length_at + 4].copy_from_slice(&(written as u32).to_le_bytes());
    dst.put_u8(TERMINATOR);
    Ok(())
}

/// Decode one complete frame from `src`.
///
/// `src` must hold at least the whole frame; bytes past the terminator are
/// ignored. Use [`crate::FrameBuffer`] to accumulate a byte stream into
/// complete frames.
pub fn decode_frame(src: &[u8]) -> Result<JobFrame> {
    let header = parse_header(src)?;
    Ok(JobFrame {
        job_id: header.job_id,
        command: header.command,
        payload: Bytes::copy_from_slice(&src[HEADER_SIZE..HEADER_SIZE + header.payload_len]),
    })
}

/// Decode a frame that owns exactly its wire bytes, without copying the payload.
pub(crate) fn decode_owned(raw: Bytes) -> Result<JobFrame> {
    let header = parse_header(&raw)?;
    Ok(JobFrame {
        job_id: header.job_id,
        command: header.command,
        payload: raw.slice(HEADER_SIZE..HEADER_SIZE + header.payload_len),
    })
}

/// Read the job id from a buffered header, if at least four bytes are present.
pub fn peek_job_id(src: &[u8]) -> Option<u32> {
    (src.len() >= 4).then(|| read_u32_le(src, 0))
}

/// Read the command byte from a buffered header, if at least five bytes are present.
pub fn peek_command(src: &[u8]) -> Option<u8> {
    src.get(COMMAND_OFFSET).copied()
}

/// Read the payload length from a buffered header, if the header is complete.
pub fn peek_payload_len(src: &[u8]) -> Option<usize> {
    (src.len() >= HEADER_SIZE).then(|| read_u32_le(src, LENGTH_OFFSET) as usize)
}

struct Header {
    job_id: u32,
    command: u8,
    payload_len: usize,
}

fn parse_header(src: &[u8]) -> Result<Header> {
    if src.len() < FRAME_OVERHEAD {
        return Err(FrameError::FrameTruncated {
            needed: FRAME_OVERHEAD,
            available: src.len(),
        });
    }

    let job_id = read_u32_le(src, 0);
    let command = src[COMMAND_OFFSET];
    let payload_len = read_u32_le(src, LENGTH_OFFSET) as usize;

    let total = FRAME_OVERHEAD + payload_len;
    if src.len() < total {
        return Err(FrameError::FrameTruncated {
            needed: total,
            available: src.len(),
        });
    }

    let found = src[total - 1];
    if found != TERMINATOR {
        return Err(FrameError::BadTerminator {
            job_id,
            command,
            found,
        });
    }

    Ok(Header {
        job_id,
        command,
        payload_len,
    })
}

fn read_u32_le(src: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([src[at], src[at + 1], src[at + 2], src[at + 3]])
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 64 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
