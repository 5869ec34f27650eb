//! Primitive payload encoding.
//!
//! Fixed-width integers are little-endian. Byte strings, strings and lists
//! carry a CompactSize length prefix (1, 3, 5 or 9 bytes).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PacketError, Result};

/// A value with a deterministic binary encoding.
///
/// `write` must append exactly `encoded_size()` bytes; frame length
/// prefixes are sized from it.
pub trait Encode: Sized {
    fn encoded_size(&self) -> usize;
    fn write(&self, dst: &mut BytesMut);
    fn read(src: &mut Bytes) -> Result<Self>;
}

/// Decode a complete value, rejecting trailing bytes.
pub fn decode_exact<T: Encode>(mut src: Bytes) -> Result<T> {
    let value = T::read(&mut src)?;
    if src.has_remaining() {
        return Err(PacketError::TrailingBytes(src.remaining()));
    }
    Ok(value)
}

/// Encode a value into a fresh buffer.
pub fn encode_to_bytes<T: Encode>(value: &T) -> Bytes {
    let mut dst = BytesMut::with_capacity(value.encoded_size());
    value.write(&mut dst);
    dst.freeze()
}

fn ensure(src: &Bytes, needed: usize) -> Result<()> {
    if src.remaining() < needed {
        return Err(PacketError::Truncated {
            needed,
            remaining: src.remaining(),
        });
    }
    Ok(())
}

pub fn read_u8(src: &mut Bytes) -> Result<u8> {
    ensure(src, 1)?;
    Ok(src.get_u8())
}

pub fn read_u16(src: &mut Bytes) -> Result<u16> {
    ensure(src, 2)?;
    Ok(src.get_u16_le())
}

pub fn read_u32(src: &mut Bytes) -> Result<u32> {
    ensure(src, 4)?;
    Ok(src.get_u32_le())
}

pub fn read_u64(src: &mut Bytes) -> Result<u64> {
    ensure(src, 8)?;
    Ok(src.get_u64_le())
}

pub fn read_bool(src: &mut Bytes) -> Result<bool> {
    match read_u8(src)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(PacketError::InvalidBool(other)),
    }
}

pub fn write_bool(dst: &mut BytesMut, value: bool) {
    dst.put_u8(u8::from(value));
}

pub fn read_array<const N: usize>(src: &mut Bytes) -> Result<[u8; N]> {
    ensure(src, N)?;
    let mut out = [0u8; N];
    src.copy_to_slice(&mut out);
    Ok(out)
}

pub fn varint_size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

pub fn write_varint(dst: &mut BytesMut, value: u64) {
    match value {
        0..=0xfc => dst.put_u8(value as u8),
        0xfd..=0xffff => {
            dst.put_u8(0xfd);
            dst.put_u16_le(value as u16);
        }
        0x1_0000..=0xffff_ffff => {
            dst.put_u8(0xfe);
            dst.put_u32_le(value as u32);
        }
        _ => {
            dst.put_u8(0xff);
            dst.put_u64_le(value);
        }
    }
}

pub fn read_varint(src: &mut Bytes) -> Result<u64> {
    match read_u8(src)? {
        0xfd => read_u16(src).map(u64::from),
        0xfe => read_u32(src).map(u64::from),
        0xff => read_u64(src),
        small => Ok(u64::from(small)),
    }
}

fn read_len(src: &mut Bytes) -> Result<usize> {
    let len = read_varint(src)?;
    usize::try_from(len).map_err(|_| PacketError::LengthOverflow(len))
}

pub fn var_bytes_size(data: &[u8]) -> usize {
    varint_size(data.len() as u64) + data.len()
}

pub fn write_var_bytes(dst: &mut BytesMut, data: &[u8]) {
    write_varint(dst, data.len() as u64);
    dst.put_slice(data);
}

pub fn read_var_bytes(src: &mut Bytes) -> Result<Bytes> {
    let len = read_len(src)?;
    ensure(src, len)?;
    Ok(src.split_to(len))
}

pub fn var_string_size(text: &str) -> usize {
    var_bytes_size(text.as_bytes())
}

pub fn write_var_string(dst: &mut BytesMut, text: &str) {
    write_var_bytes(dst, text.as_bytes());
}

pub fn read_var_string(src: &mut Bytes) -> Result<String> {
    let raw = read_var_bytes(src)?;
    String::from_utf8(raw.to_vec()).map_err(|_| PacketError::InvalidUtf8)
}

pub fn list_size<T: Encode>(items: &[T]) -> usize {
    varint_size(items.len() as u64) + items.iter().map(Encode::encoded_size).sum::<usize>()
}

pub fn write_list<T: Encode>(dst: &mut BytesMut, items: &[T]) {
    write_varint(dst, items.len() as u64);
    for item in items {
        item.write(dst);
    }
}

pub fn read_list<T: Encode>(src: &mut Bytes) -> Result<Vec<T>> {
    let count = read_len(src)?;
    // Every element takes at least one byte; cap the preallocation by what is left.
    let mut items = Vec::with_capacity(count.min(src.remaining()));
    for _ in 0..count {
        items.push(T::read(src)?);
    }
    Ok(items)
}
