//! Byte sinks and the variable-length integer encoding shared by nodes and outputs.
//!
//! Integers use the [commonware_codec::varint] encoding: little-endian base-128 groups where the
//! most significant bit of each byte marks that more bytes follow. Fixed-width integers are
//! big-endian.

use crate::{reader::BytesReader, Error};
use bytes::BytesMut;
use commonware_codec::{
    varint::{self, UInt},
    Error as CodecError,
};

/// Largest encoding of a `u64`.
const MAX_VARINT_SIZE: usize = 10;

const CONTINUATION_BIT_MASK: u8 = 0x80;

/// A sink that bytes are appended to.
pub trait DataOutput {
    /// Append a single byte.
    fn write_byte(&mut self, b: u8);

    /// Append a slice of bytes.
    fn write_bytes(&mut self, b: &[u8]);

    /// Append a variable-length `u32`.
    fn write_vint(&mut self, value: u32) {
        write_varint(self, value);
    }

    /// Append a variable-length `u64`.
    fn write_vlong(&mut self, value: u64) {
        write_varint(self, value);
    }

    /// Append a big-endian `u16`.
    fn write_short(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Append a big-endian `u32`.
    fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_be_bytes());
    }
}

fn write_varint<T: UInt, D: DataOutput + ?Sized>(out: &mut D, value: T) {
    let mut buf = [0u8; MAX_VARINT_SIZE];
    let len = varint::size(value);
    varint::write(value, &mut &mut buf[..]);
    out.write_bytes(&buf[..len]);
}

impl DataOutput for Vec<u8> {
    fn write_byte(&mut self, b: u8) {
        self.push(b);
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.extend_from_slice(b);
    }
}

impl DataOutput for BytesMut {
    fn write_byte(&mut self, b: u8) {
        self.extend_from_slice(&[b]);
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.extend_from_slice(b);
    }
}

/// Decode a variable-length `T` from a reader moving in either direction.
///
/// The encoded bytes are gathered in reading order and handed to [varint::read], which needs a
/// forward [bytes::Buf] that a reverse reader cannot provide.
pub(crate) fn read_varint<T: UInt, R: BytesReader + ?Sized>(reader: &mut R) -> Result<T, Error> {
    let max_len = (std::mem::size_of::<T>() * 8).div_ceil(7);
    let mut buf = [0u8; MAX_VARINT_SIZE];
    let mut len = 0;
    while len < max_len {
        let byte = reader.read_byte()?;
        buf[len] = byte;
        len += 1;
        if byte & CONTINUATION_BIT_MASK == 0 {
            break;
        }
    }
    varint::read(&mut &buf[..len]).map_err(|err| match err {
        CodecError::EndOfBuffer => Error::EndOfInput,
        _ => Error::InvalidVarint,
    })
}
