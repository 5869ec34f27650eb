//! Stream framing: accumulate arbitrary chunks into complete frames.

use bytes::BytesMut;

use crate::codec::{
    decode_owned, peek_command, peek_job_id, peek_payload_len, JobFrame, DEFAULT_MAX_PAYLOAD,
    FRAME_OVERHEAD,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Split one complete frame off the front of `src`.
///
/// Returns `Ok(None)` while the header or the payload is still incomplete.
/// The length field is checked against `max_payload` as soon as the header
/// is buffered, before any payload is accumulated.
pub fn split_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<JobFrame>> {
    let Some(payload_len) = peek_payload_len(src) else {
        return Ok(None);
    };

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = FRAME_OVERHEAD + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    let raw = src.split_to(total).freeze();
    decode_owned(raw).map(Some)
}

/// Per-connection partial-frame state.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_payload_size: usize,
}

impl FrameBuffer {
    /// Create a buffer with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a buffer with an explicit payload limit.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload_size,
        }
    }

    /// Append bytes received from the transport.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<JobFrame>> {
        split_frame(&mut self.buf, self.max_payload_size)
    }

    /// Job id of the partially buffered frame, once its first four bytes arrived.
    pub fn pending_job_id(&self) -> Option<u32> {
        peek_job_id(&self.buf)
    }

    /// Command byte of the partially buffered frame, once it arrived.
    pub fn pending_command(&self) -> Option<u8> {
        peek_command(&self.buf)
    }

    /// Number of buffered bytes not yet returned as frames.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop any partially buffered frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Update the payload limit for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.max_payload_size = max_payload_size;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;
    use crate::codec::{encode_frame, TERMINATOR};
    use crate::command::{CHECK, ECSIGN};

    fn wire(frames: &[(u32, u8, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (id, cmd, payload) in frames {
            encode_frame(*id, *cmd, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn byte_at_a_time() {
        let bytes = wire(&[(5, ECSIGN, &b"digest"[..])]);
        let mut buffer = FrameBuffer::new();

        for (i, byte) in bytes.iter().enumerate() {
            buffer.extend(&[*byte]);
            let frame = buffer.next_frame().unwrap();
            if i + 1 < bytes.len() {
                assert!(frame.is_none(), "frame produced early at byte {i}");
            } else {
                let frame = frame.unwrap();
                assert_eq!(frame.job_id, 5);
                assert_eq!(frame.payload.as_ref(), b"digest");
            }
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn several_frames_in_one_chunk() {
        let bytes = wire(&[(1, CHECK, &b"a"[..]), (2, ECSIGN, &b""[..]), (3, CHECK, &b"ccc"[..])]);
        let mut buffer = FrameBuffer::new();
        buffer.extend(&bytes);

        let ids: Vec<u32> = std::iter::from_fn(|| buffer.next_frame().unwrap())
            .map(|f| f.job_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn chunk_boundary_inside_length_field() {
        let bytes = wire(&[(9, CHECK, &[7u8; 300][..])]);
        let mut buffer = FrameBuffer::new();

        buffer.extend(&bytes[..7]);
        assert!(buffer.next_frame().unwrap().is_none());
        assert_eq!(buffer.pending_job_id(), Some(9));
        assert_eq!(buffer.pending_command(), Some(CHECK));

        buffer.extend(&bytes[7..]);
        let frame = buffer.next_frame().unwrap().unwrap();
        assert_eq!(frame.payload.len(), 300);
    }

    #[test]
    fn oversized_length_rejected_before_payload() {
        let mut raw = BytesMut::new();
        raw.put_u32_le(1);
        raw.put_u8(CHECK);
        raw.put_u32_le(1024);

        let mut buffer = FrameBuffer::with_max_payload(16);
        buffer.extend(&raw);
        assert!(matches!(
            buffer.next_frame(),
            Err(FrameError::PayloadTooLarge {
                size: 1024,
                max: 16
            })
        ));
    }

    #[test]
    fn corrupted_terminator_surfaces() {
        let mut bytes = wire(&[(4, CHECK, &b"xy"[..])]);
        let last = bytes.len() - 1;
        bytes[last] = !TERMINATOR;

        let mut buffer = FrameBuffer::new();
        buffer.extend(&bytes);
        assert!(matches!(
            buffer.next_frame(),
            Err(FrameError::BadTerminator { job_id: 4, .. })
        ));
    }

    #[test]
    fn clear_discards_partial_frame() {
        let bytes = wire(&[(1, CHECK, &b"abc"[..])]);
        let mut buffer = FrameBuffer::new();
        buffer.extend(&bytes[..5]);
        assert_eq!(buffer.len(), 5);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.pending_job_id(), None);
    }
}
