/// Errors that can occur while encoding or decoding packet payloads.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The payload ended before a field was complete.
    #[error("payload truncated ({needed} bytes needed, {remaining} remaining)")]
    Truncated { needed: usize, remaining: usize },

    /// Bytes were left over after the packet was fully read.
    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),

    /// The command byte does not name a packet on this side of the protocol.
    #[error("unknown command: {0:#04x}")]
    UnknownCommand(u8),

    /// A boolean field held something other than 0 or 1.
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),

    /// An enumerated field held an unassigned value.
    #[error("invalid {field} value {value}")]
    InvalidEnum { field: &'static str, value: u32 },

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A length prefix does not fit in memory on this platform.
    #[error("length prefix {0} too large")]
    LengthOverflow(u64),

    /// Frame-level failure while wrapping the payload.
    #[error("frame error: {0}")]
    Frame(#[from] oriwork_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, PacketError>;
