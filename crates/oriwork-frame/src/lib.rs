//! Length-prefixed job framing for oriwork workers.
//!
//! Every job request and result travels as one frame:
//! - A 4-byte little-endian job id
//! - A 1-byte command code
//! - A 4-byte little-endian payload length
//! - The payload, then a `0x0a` terminator byte
//!
//! Frames are not self-synchronizing: readers go through [`FrameBuffer`],
//! which consumes exactly `10 + payload_length` bytes per frame.

pub mod buffer;
pub mod codec;
pub mod command;
pub mod error;
#[cfg(feature = "async")]
pub mod job_codec;
pub mod reader;
pub mod writer;

pub use buffer::{split_frame, FrameBuffer};
pub use codec::{
    decode_frame, encode_frame, encode_with, peek_command, peek_job_id, peek_payload_len,
    FrameConfig, JobFrame, DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD, HEADER_SIZE, TERMINATOR,
};
pub use command::{command_name, is_request, is_result, result_for};
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use job_codec::JobCodec;
pub use reader::FrameReader;
pub use writer::FrameWriter;
