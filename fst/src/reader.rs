//! Positioned readers over encoded node bytes.
//!
//! Nodes are stored reversed, so most readers walk backwards: reading a byte at position `p`
//! moves the cursor to `p - 1` and skipping `n` bytes moves it to `p - n`. Positions are always
//! absolute byte offsets into the underlying bytes regardless of direction.
//!
//! Reads outside of the underlying bytes return [Error::EndOfInput].

use crate::{
    data::read_varint,
    source::SourceReader,
    store::StoreReader,
    Error,
};

/// A cursor over bytes that may move in either direction.
pub trait BytesReader {
    /// Read the byte at the current position and advance.
    fn read_byte(&mut self) -> Result<u8, Error>;

    /// Fill `buf` with the next `buf.len()` bytes (in reading order).
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        for b in buf.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    /// Advance by `count` bytes in reading order (a negative `count` moves back).
    fn skip_bytes(&mut self, count: i64);

    /// The current absolute position.
    fn position(&self) -> u64;

    /// Move to an absolute position.
    fn set_position(&mut self, pos: u64);

    /// Whether reading moves towards lower positions.
    fn reversed(&self) -> bool;

    /// Number of bytes that can be read before running out of input.
    fn remaining(&self) -> u64;

    /// Read a variable-length `u32`.
    fn read_vint(&mut self) -> Result<u32, Error> {
        read_varint(self)
    }

    /// Read a variable-length `u64`.
    fn read_vlong(&mut self) -> Result<u64, Error> {
        read_varint(self)
    }

    /// Read a big-endian `u16`.
    fn read_short(&mut self) -> Result<u16, Error> {
        let hi = self.read_byte()? as u16;
        let lo = self.read_byte()? as u16;
        Ok((hi << 8) | lo)
    }

    /// Read a big-endian `u32`.
    fn read_u32(&mut self) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }
}

/// Reads a flat byte array front to back.
pub struct ForwardReader<'a> {
    bytes: &'a [u8],
    pos: u64,
}

impl<'a> ForwardReader<'a> {
    /// Create a reader positioned at the first byte.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl BytesReader for ForwardReader<'_> {
    fn read_byte(&mut self) -> Result<u8, Error> {
        let b = *self
            .bytes
            .get(self.pos as usize)
            .ok_or(Error::EndOfInput)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let start = self.pos as usize;
        let end = start.checked_add(buf.len()).ok_or(Error::EndOfInput)?;
        let src = self.bytes.get(start..end).ok_or(Error::EndOfInput)?;
        buf.copy_from_slice(src);
        self.pos = end as u64;
        Ok(())
    }

    fn skip_bytes(&mut self, count: i64) {
        self.pos = self.pos.wrapping_add_signed(count);
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn reversed(&self) -> bool {
        false
    }

    fn remaining(&self) -> u64 {
        (self.bytes.len() as u64).saturating_sub(self.pos)
    }
}

/// Reads a flat byte array back to front, starting at the last byte.
pub struct ReverseReader<'a> {
    bytes: &'a [u8],
    pos: u64,
}

impl<'a> ReverseReader<'a> {
    /// Create a reader positioned at the last byte.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: (bytes.len() as u64).wrapping_sub(1),
        }
    }
}

impl BytesReader for ReverseReader<'_> {
    fn read_byte(&mut self) -> Result<u8, Error> {
        let b = *self
            .bytes
            .get(usize::try_from(self.pos).map_err(|_| Error::EndOfInput)?)
            .ok_or(Error::EndOfInput)?;
        self.pos = self.pos.wrapping_sub(1);
        Ok(b)
    }

    fn skip_bytes(&mut self, count: i64) {
        self.pos = self.pos.wrapping_add_signed(count.wrapping_neg());
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn reversed(&self) -> bool {
        true
    }

    fn remaining(&self) -> u64 {
        if self.pos < self.bytes.len() as u64 {
            self.pos + 1
        } else {
            0
        }
    }
}

/// The reader handed out by an [crate::Fst], selected by where its node bytes live.
pub enum FstReader<'a> {
    /// Node bytes in a single contiguous array.
    Array(ReverseReader<'a>),
    /// Node bytes in the blocks of a [crate::store::ByteStore].
    Store(StoreReader<'a>),
    /// Node bytes behind a [crate::source::RandomAccess] source.
    Source(SourceReader),
}

macro_rules! delegate {
    ($self:ident, $reader:ident => $body:expr) => {
        match $self {
            FstReader::Array($reader) => $body,
            FstReader::Store($reader) => $body,
            FstReader::Source($reader) => $body,
        }
    };
}

impl BytesReader for FstReader<'_> {
    fn read_byte(&mut self) -> Result<u8, Error> {
        delegate!(self, r => r.read_byte())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        delegate!(self, r => r.read_bytes(buf))
    }

    fn skip_bytes(&mut self, count: i64) {
        delegate!(self, r => r.skip_bytes(count))
    }

    fn position(&self) -> u64 {
        delegate!(self, r => r.position())
    }

    fn set_position(&mut self, pos: u64) {
        delegate!(self, r => r.set_position(pos))
    }

    fn reversed(&self) -> bool {
        delegate!(self, r => r.reversed())
    }

    fn remaining(&self) -> u64 {
        delegate!(self, r => r.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_reader() {
        let bytes = [1u8, 2, 3, 4, 5];
        let mut reader = ForwardReader::new(&bytes);
        assert!(!reader.reversed());
        assert_eq!(reader.read_byte().unwrap(), 1);
        reader.skip_bytes(2);
        assert_eq!(reader.read_byte().unwrap(), 4);
        reader.skip_bytes(-3);
        assert_eq!(reader.position(), 1);
        let mut buf = [0u8; 3];
        reader.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [2, 3, 4]);
        assert_eq!(reader.remaining(), 1);
        assert!(matches!(reader.read_bytes(&mut buf), Err(Error::EndOfInput)));
    }

    #[test]
    fn test_reverse_reader() {
        let bytes = [1u8, 2, 3, 4, 5];
        let mut reader = ReverseReader::new(&bytes);
        assert!(reader.reversed());
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.read_byte().unwrap(), 5);
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.remaining(), 4);

        // Skipping forward in reading order moves to lower positions.
        reader.skip_bytes(2);
        assert_eq!(reader.read_byte().unwrap(), 2);

        // Negative skips move back towards the end of the array.
        reader.skip_bytes(-3);
        assert_eq!(reader.position(), 3);
        let mut buf = [0u8; 4];
        reader.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [4, 3, 2, 1]);

        // Reading before the start of the array fails.
        assert_eq!(reader.remaining(), 0);
        assert!(matches!(reader.read_byte(), Err(Error::EndOfInput)));
    }

    #[test]
    fn test_empty_reverse_reader() {
        let mut reader = ReverseReader::new(&[]);
        assert_eq!(reader.remaining(), 0);
        assert!(matches!(reader.read_byte(), Err(Error::EndOfInput)));
    }
}
