//! Random access byte sources for serving an [crate::Fst] without loading it into memory.
//!
//! A [RandomAccess] source only supports absolute positional reads. [SourceReader] turns it into a
//! [BytesReader] over a window of the source: single bytes are served from a cached window that is
//! refilled with one positional read, and multi-byte reads issue a single positional read (which,
//! when walking backwards, is reversed in memory).

use crate::{reader::BytesReader, Error};
use bytes::Bytes;
use std::{fs::File, sync};

/// Number of bytes fetched when a [SourceReader] refills its window.
const WINDOW_SIZE: usize = 4_096;

/// A byte source supporting absolute positional reads.
pub trait RandomAccess: Send + Sync {
    /// Total number of bytes in the source.
    fn len(&self) -> u64;

    /// Whether the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error>;
}

impl RandomAccess for Bytes {
    fn len(&self) -> u64 {
        Bytes::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let start = usize::try_from(offset).map_err(|_| Error::EndOfInput)?;
        let end = start.checked_add(buf.len()).ok_or(Error::EndOfInput)?;
        let src = self.get(start..end).ok_or(Error::EndOfInput)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// A [RandomAccess] source backed by a file.
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    /// Wrap an open file, capturing its current length.
    pub fn new(file: File) -> Result<Self, Error> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl RandomAccess for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        use std::os::unix::fs::FileExt;
        if offset.saturating_add(buf.len() as u64) > self.len {
            return Err(Error::EndOfInput);
        }
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        use std::os::windows::fs::FileExt;
        if offset.saturating_add(buf.len() as u64) > self.len {
            return Err(Error::EndOfInput);
        }
        let mut filled = 0;
        while filled < buf.len() {
            let read = self
                .file
                .seek_read(&mut buf[filled..], offset + filled as u64)?;
            if read == 0 {
                return Err(Error::EndOfInput);
            }
            filled += read;
        }
        Ok(())
    }
}

/// A [BytesReader] over the window `[offset, offset + len)` of a [RandomAccess] source.
///
/// Positions are relative to the start of the window.
pub struct SourceReader {
    source: sync::Arc<dyn RandomAccess>,
    offset: u64,
    len: u64,
    reversed: bool,
    pos: u64,

    // Cached bytes `[cached_start, cached_start + cached.len())` of the window.
    cached: Vec<u8>,
    cached_start: u64,
}

impl SourceReader {
    /// Create a reader that walks forward from the start of the window.
    pub fn forward(source: sync::Arc<dyn RandomAccess>, offset: u64, len: u64) -> Self {
        Self::new(source, offset, len, false, 0)
    }

    /// Create a reader that walks backwards from the end of the window.
    pub fn reverse(source: sync::Arc<dyn RandomAccess>, offset: u64, len: u64) -> Self {
        Self::new(source, offset, len, true, len.wrapping_sub(1))
    }

    fn new(
        source: sync::Arc<dyn RandomAccess>,
        offset: u64,
        len: u64,
        reversed: bool,
        pos: u64,
    ) -> Self {
        Self {
            source,
            offset,
            len,
            reversed,
            pos,
            cached: Vec::new(),
            cached_start: 0,
        }
    }

    fn fill(&mut self, pos: u64) -> Result<(), Error> {
        let window = WINDOW_SIZE as u64;
        let (start, end) = if self.reversed {
            (pos.saturating_sub(window - 1), pos + 1)
        } else {
            (pos, self.len.min(pos + window))
        };
        self.cached.resize((end - start) as usize, 0);
        self.source.read_at(self.offset + start, &mut self.cached)?;
        self.cached_start = start;
        Ok(())
    }
}

impl BytesReader for SourceReader {
    fn read_byte(&mut self) -> Result<u8, Error> {
        let pos = self.pos;
        if pos >= self.len {
            return Err(Error::EndOfInput);
        }
        let cached_end = self.cached_start + self.cached.len() as u64;
        if pos < self.cached_start || pos >= cached_end {
            self.fill(pos)?;
        }
        let b = self.cached[(pos - self.cached_start) as usize];
        self.pos = if self.reversed {
            pos.wrapping_sub(1)
        } else {
            pos + 1
        };
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let n = buf.len() as u64;
        if n == 0 {
            return Ok(());
        }
        if self.reversed {
            // Reading backwards from `pos` covers `[pos + 1 - n, pos]`.
            if self.pos >= self.len || self.pos + 1 < n {
                return Err(Error::EndOfInput);
            }
            let start = self.pos + 1 - n;
            self.source.read_at(self.offset + start, buf)?;
            buf.reverse();
            self.pos = start.wrapping_sub(1);
        } else {
            if self.pos.checked_add(n).map_or(true, |end| end > self.len) {
                return Err(Error::EndOfInput);
            }
            self.source.read_at(self.offset + self.pos, buf)?;
            self.pos += n;
        }
        Ok(())
    }

    fn skip_bytes(&mut self, count: i64) {
        let count = if self.reversed {
            count.wrapping_neg()
        } else {
            count
        };
        self.pos = self.pos.wrapping_add_signed(count);
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn reversed(&self) -> bool {
        self.reversed
    }

    fn remaining(&self) -> u64 {
        match (self.reversed, self.pos < self.len) {
            (_, false) => 0,
            (true, true) => self.pos + 1,
            (false, true) => self.len - self.pos,
        }
    }
}
