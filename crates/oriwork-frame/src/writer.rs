use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_with, FrameConfig, JobFrame, FRAME_OVERHEAD};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &JobFrame) -> Result<()> {
        self.send(frame.job_id, frame.command, frame.payload.as_ref())
    }

    /// Encode and send a raw payload.
    pub fn send(&mut self, job_id: u32, command: u8, payload: &[u8]) -> Result<()> {
        self.send_with(job_id, command, payload.len(), |buf| {
            buf.extend_from_slice(payload)
        })
    }

    /// Encode a payload produced by `write` directly into the frame buffer and send it.
    ///
    /// An expired write timeout surfaces as `FrameError::Io` with kind
    /// `WouldBlock` or `TimedOut`; the frame may be partially written.
    pub fn send_with<F>(&mut self, job_id: u32, command: u8, size_hint: usize, write: F) -> Result<()>
    where
        F: FnOnce(&mut BytesMut),
    {
        self.buf.clear();
        encode_with(job_id, command, size_hint, &mut self.buf, write)?;

        let payload_len = self.buf.len() - FRAME_OVERHEAD;
        if payload_len > self.config.max_payload_size {
            self.buf.clear();
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Applies to the next frame sent.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameWriter<std::os::unix::net::UnixStream> {
    /// Create a frame writer for a Unix stream and apply write timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    use bytes::BufMut;

    use super::*;
    use crate::codec::decode_frame;
    use crate::command::{CHECK, ECSIGN, ECSIGNRESULT};

    /// Records writes. Fails the first write and first flush with `first_error`,
    /// and accepts at most `chunk` bytes per write call.
    struct Sink {
        data: Vec<u8>,
        chunk: usize,
        first_error: Option<ErrorKind>,
        flush_error: Option<ErrorKind>,
        flushes: usize,
    }

    impl Sink {
        fn new() -> Self {
            Self {
                data: Vec::new(),
                chunk: usize::MAX,
                first_error: None,
                flush_error: None,
                flushes: 0,
            }
        }

        fn frames(&self) -> Vec<JobFrame> {
            let mut rest = self.data.as_slice();
            let mut frames = Vec::new();
            while !rest.is_empty() {
                let frame = decode_frame(rest).expect("sink should hold whole frames");
                rest = &rest[frame.wire_size()..];
                frames.push(frame);
            }
            frames
        }
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.first_error.take() {
                return Err(io::Error::from(kind));
            }
            let n = buf.len().min(self.chunk);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            if let Some(kind) = self.flush_error.take() {
                return Err(io::Error::from(kind));
            }
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn each_send_is_one_flushed_frame() {
        let mut writer = FrameWriter::new(Sink::new());
        writer.send(1, CHECK, b"one").expect("send");
        writer
            .write_frame(&JobFrame::new(2, ECSIGN, "two"))
            .expect("write_frame");

        let sink = writer.into_inner();
        assert_eq!(sink.flushes, 2);
        let frames = sink.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!((frames[0].job_id, frames[0].payload.as_ref()), (1, b"one".as_ref()));
        assert_eq!(frames[1], JobFrame::new(2, ECSIGN, "two"));
    }

    #[test]
    fn send_with_back_patches_length() {
        let mut writer = FrameWriter::new(Sink::new());
        // The size hint is only a capacity hint.
        writer
            .send_with(11, ECSIGNRESULT, 0, |buf| {
                buf.put_u8(2);
                buf.put_u16_le(0xbeef);
            })
            .expect("send_with");

        let sink = writer.into_inner();
        assert_eq!(&sink.data[5..9], &3u32.to_le_bytes());
        assert_eq!(sink.frames()[0].payload.as_ref(), &[2, 0xef, 0xbe]);
    }

    #[test]
    fn oversized_payload_writes_nothing() {
        let config = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Sink::new(), config);

        assert!(matches!(
            writer.send(1, CHECK, b"oversized"),
            Err(FrameError::PayloadTooLarge { size: 9, max: 4 })
        ));
        writer.set_max_payload_size(16);
        writer.send(2, CHECK, b"oversized").expect("raised limit");
        assert_eq!(writer.into_inner().frames().len(), 1);
    }

    #[test]
    fn short_and_interrupted_writes_complete_the_frame() {
        let mut sink = Sink::new();
        sink.chunk = 3;
        sink.first_error = Some(ErrorKind::Interrupted);
        sink.flush_error = Some(ErrorKind::Interrupted);

        let mut writer = FrameWriter::new(sink);
        writer.send(5, CHECK, b"retry").expect("send should retry");
        assert_eq!(writer.into_inner().frames()[0].job_id, 5);
    }

    #[test]
    fn would_block_is_surfaced_not_retried() {
        let mut sink = Sink::new();
        sink.first_error = Some(ErrorKind::WouldBlock);

        let mut writer = FrameWriter::new(sink);
        assert!(matches!(
            writer.send(1, CHECK, b"x"),
            Err(FrameError::Io(err)) if err.kind() == ErrorKind::WouldBlock
        ));
    }

    #[test]
    fn expired_write_timeout_returns_error() {
        // The peer never reads, so the socket buffer fills.
        let (left, _right) = UnixStream::pair().expect("socket pair");
        let config = FrameConfig {
            write_timeout: Some(Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_unix(left, config).expect("timeout should apply");

        let outcome = writer.send(1, CHECK, &vec![0u8; 8 * 1024 * 1024]);
        assert!(matches!(
            outcome,
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut sink = Sink::new();
        sink.chunk = 0;
        let mut writer = FrameWriter::new(sink);
        assert!(matches!(
            writer.send(1, CHECK, b"x"),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn write_to_closed_peer_is_io_error() {
        let (left, right) = UnixStream::pair().expect("socket pair");
        drop(right);

        let mut writer = FrameWriter::new(left);
        assert!(matches!(
            writer.send(1, CHECK, &[0u8; 1024]),
            Err(FrameError::Io(_))
        ));
    }

    #[test]
    fn unix_write_timeout_is_applied() {
        let (left, _right) = UnixStream::pair().expect("socket pair");
        let config = FrameConfig {
            write_timeout: Some(Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let writer = FrameWriter::with_config_unix(left, config).expect("timeout should apply");
        assert_eq!(
            writer.get_ref().write_timeout().expect("socket option"),
            Some(Duration::from_millis(10))
        );
    }
}
