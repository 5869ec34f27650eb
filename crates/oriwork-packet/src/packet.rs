use bytes::{Bytes, BytesMut};
use oriwork_frame::FRAME_OVERHEAD;

use crate::encoding::Encode;
use crate::error::Result;
use crate::request::RequestPacket;
use crate::result::ResultPacket;

/// A request or result payload bound to one command code.
pub trait Packet: Encode {
    const COMMAND: u8;

    fn command_code(&self) -> u8 {
        Self::COMMAND
    }
}

/// Encode a request into a complete wire frame.
pub fn encode_request(job_id: u32, request: &RequestPacket) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(FRAME_OVERHEAD + request.encoded_size());
    request.encode_frame(job_id, &mut dst)?;
    Ok(dst.freeze())
}

/// Encode a result into a complete wire frame.
pub fn encode_result(job_id: u32, result: &ResultPacket) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(FRAME_OVERHEAD + result.encoded_size());
    result.encode_frame(job_id, &mut dst)?;
    Ok(dst.freeze())
}
