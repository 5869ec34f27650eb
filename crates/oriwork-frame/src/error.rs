/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes are available than the header or length field requires.
    #[error("frame truncated ({available} bytes available, {needed} needed)")]
    FrameTruncated { needed: usize, available: usize },

    /// The byte after the payload is not the frame terminator.
    #[error("bad frame terminator for job {job_id} (found {found:#04x})")]
    BadTerminator { job_id: u32, command: u8, found: u8 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
