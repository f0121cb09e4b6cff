//! An append-only byte buffer split into fixed-size blocks.
//!
//! [ByteStore] is where a [crate::Builder] writes nodes. Besides appending, it supports the
//! absolute edits node compilation needs (overwriting, moving, and reversing bytes that were
//! already written, skipping ahead, and truncating), all of which may cross block boundaries.
//!
//! # Format
//!
//! Position `p` lives at offset `p & (block_size - 1)` of block `p >> block_bits`:
//!
//! ```text
//! +------------------+------------------+------------------+
//! | block 0          | block 1          | block 2 (partial)|
//! | [0, bs)          | [bs, 2*bs)       | [2*bs, position) |
//! +------------------+------------------+------------------+
//! ```
//!
//! Absolute writes may only target bytes that were already written (this store never grows
//! through an absolute write).

use crate::{
    data::DataOutput,
    reader::{BytesReader, FstReader, ReverseReader},
    Error,
};
use bytes::BufMut;

/// Largest supported block size exponent.
pub const MAX_BLOCK_BITS: u32 = 30;

/// Block-chunked, append-only byte buffer.
pub struct ByteStore {
    blocks: Vec<Vec<u8>>,
    block_bits: u32,
    block_size: usize,
    block_mask: u64,

    // Offset of the next write within the last block (equal to `block_size` when a new block is
    // needed).
    next_write: usize,
}

impl ByteStore {
    /// Create an empty store with blocks of `1 << block_bits` bytes.
    pub fn new(block_bits: u32) -> Self {
        assert!(
            (1..=MAX_BLOCK_BITS).contains(&block_bits),
            "block bits must be in 1..={MAX_BLOCK_BITS}"
        );
        let block_size = 1usize << block_bits;
        Self {
            blocks: Vec::new(),
            block_bits,
            block_size,
            block_mask: block_size as u64 - 1,
            next_write: block_size,
        }
    }

    /// The block size exponent.
    pub fn block_bits(&self) -> u32 {
        self.block_bits
    }

    /// Number of blocks allocated.
    pub fn blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Number of bytes written (the position of the next append).
    pub fn position(&self) -> u64 {
        match self.blocks.len() {
            0 => 0,
            n => ((n - 1) * self.block_size + self.next_write) as u64,
        }
    }

    /// Approximate heap memory held by the store.
    pub fn ram_bytes_used(&self) -> usize {
        self.blocks.iter().map(|b| b.capacity()).sum()
    }

    fn locate(&self, pos: u64) -> (usize, usize) {
        (
            (pos >> self.block_bits) as usize,
            (pos & self.block_mask) as usize,
        )
    }

    fn add_block(&mut self) {
        self.blocks.push(vec![0; self.block_size]);
        self.next_write = 0;
    }

    /// Overwrite the byte at `dest`.
    pub fn write_byte_at(&mut self, dest: u64, b: u8) {
        assert!(dest < self.position(), "write past end: {dest}");
        let (block, offset) = self.locate(dest);
        self.blocks[block][offset] = b;
    }

    /// Overwrite `b.len()` bytes starting at `dest`.
    pub fn write_bytes_at(&mut self, dest: u64, b: &[u8]) {
        assert!(
            dest + b.len() as u64 <= self.position(),
            "write past end: dest={dest} len={}",
            b.len()
        );
        let mut dest = dest;
        let mut src = b;
        while !src.is_empty() {
            let (block, offset) = self.locate(dest);
            let chunk = src.len().min(self.block_size - offset);
            self.blocks[block][offset..offset + chunk].copy_from_slice(&src[..chunk]);
            src = &src[chunk..];
            dest += chunk as u64;
        }
    }

    /// Overwrite the four bytes at `dest` with big-endian `value`.
    pub fn write_i32_at(&mut self, dest: u64, value: i32) {
        self.write_bytes_at(dest, &value.to_be_bytes());
    }

    /// Copy `len` bytes from `src` to `dest` (where `dest > src`), tolerating overlap.
    pub fn move_bytes(&mut self, src: u64, dest: u64, len: usize) {
        assert!(src < dest, "move must shift right: src={src} dest={dest}");
        assert!(
            dest + len as u64 <= self.position(),
            "move past end: dest={dest} len={len}"
        );

        // Copy back to front in chunks that never cross a block boundary on either side, so a
        // chunk is never overwritten before it is copied.
        let mut remaining = len as u64;
        while remaining > 0 {
            let src_end = src + remaining;
            let dest_end = dest + remaining;
            let src_avail = ((src_end - 1) & self.block_mask) + 1;
            let dest_avail = ((dest_end - 1) & self.block_mask) + 1;
            let chunk = remaining.min(src_avail).min(dest_avail);
            let (src_block, _) = self.locate(src_end - 1);
            let (dest_block, _) = self.locate(dest_end - 1);
            let src_start = (src_avail - chunk) as usize;
            let dest_start = (dest_avail - chunk) as usize;
            let chunk = chunk as usize;
            if src_block == dest_block {
                self.blocks[src_block].copy_within(src_start..src_start + chunk, dest_start);
            } else {
                let (lo, hi) = self.blocks.split_at_mut(dest_block);
                hi[0][dest_start..dest_start + chunk]
                    .copy_from_slice(&lo[src_block][src_start..src_start + chunk]);
            }
            remaining -= chunk as u64;
        }
    }

    /// Copy the bytes starting at `src` into `dest`.
    pub fn copy_to_slice(&self, src: u64, dest: &mut [u8]) {
        assert!(
            src + dest.len() as u64 <= self.position(),
            "copy past end: src={src} len={}",
            dest.len()
        );
        let mut src = src;
        let mut out = dest;
        while !out.is_empty() {
            let (block, offset) = self.locate(src);
            let chunk = out.len().min(self.block_size - offset);
            out[..chunk].copy_from_slice(&self.blocks[block][offset..offset + chunk]);
            out = &mut out[chunk..];
            src += chunk as u64;
        }
    }

    /// Reverse the bytes in `[src, dest]` (inclusive).
    pub fn reverse(&mut self, src: u64, dest: u64) {
        assert!(src < dest, "invalid range: src={src} dest={dest}");
        assert!(dest < self.position(), "reverse past end: {dest}");
        let (mut lo, mut hi) = (src, dest);
        while lo < hi {
            let (lo_block, lo_offset) = self.locate(lo);
            let (hi_block, hi_offset) = self.locate(hi);
            let tmp = self.blocks[lo_block][lo_offset];
            self.blocks[lo_block][lo_offset] = self.blocks[hi_block][hi_offset];
            self.blocks[hi_block][hi_offset] = tmp;
            lo += 1;
            hi -= 1;
        }
    }

    /// Append `len` zero bytes, to be overwritten by absolute writes.
    pub fn skip_bytes(&mut self, len: usize) {
        let mut len = len;
        while len > 0 {
            if self.next_write == self.block_size {
                self.add_block();
            }
            let chunk = len.min(self.block_size - self.next_write);
            let next_write = self.next_write;
            if let Some(block) = self.blocks.last_mut() {
                block[next_write..next_write + chunk].fill(0);
            }
            self.next_write += chunk;
            len -= chunk;
        }
    }

    /// Discard every byte at or after `new_len`.
    pub fn truncate(&mut self, new_len: u64) {
        assert!(
            new_len <= self.position(),
            "truncate past end: {new_len} > {}",
            self.position()
        );
        let (mut block, mut next_write) = self.locate(new_len);
        if next_write == 0 {
            if block == 0 {
                self.blocks.clear();
                self.next_write = self.block_size;
                return;
            }
            block -= 1;
            next_write = self.block_size;
        }
        self.blocks.truncate(block + 1);
        self.next_write = next_write;
        debug_assert_eq!(self.position(), new_len);
    }

    /// Release the unused tail of the last block. No bytes may be written afterwards.
    pub fn finish(&mut self) {
        let next_write = self.next_write;
        if let Some(last) = self.blocks.last_mut() {
            last.truncate(next_write);
            last.shrink_to_fit();
        }
    }

    /// Append every written byte to `out`.
    pub fn copy_to(&self, out: &mut impl BufMut) {
        let blocks = self.blocks.len();
        for (i, block) in self.blocks.iter().enumerate() {
            if i + 1 == blocks {
                out.put_slice(&block[..self.next_write]);
            } else {
                out.put_slice(block);
            }
        }
    }

    /// Copy every written byte into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.position() as usize);
        self.copy_to(&mut out);
        out
    }

    /// A reader that walks the store backwards from its last byte.
    ///
    /// A store with a single block is read as a flat array.
    pub fn reverse_reader(&self) -> FstReader<'_> {
        match self.blocks.as_slice() {
            [block] => {
                let written = block.len().min(self.next_write);
                FstReader::Array(ReverseReader::new(&block[..written]))
            }
            _ => FstReader::Store(StoreReader::new(self)),
        }
    }
}

impl DataOutput for ByteStore {
    fn write_byte(&mut self, b: u8) {
        if self.next_write == self.block_size {
            self.add_block();
        }
        let next_write = self.next_write;
        if let Some(block) = self.blocks.last_mut() {
            block[next_write] = b;
        }
        self.next_write += 1;
    }

    fn write_bytes(&mut self, b: &[u8]) {
        let mut src = b;
        while !src.is_empty() {
            if self.next_write == self.block_size {
                self.add_block();
            }
            let chunk = src.len().min(self.block_size - self.next_write);
            let next_write = self.next_write;
            if let Some(block) = self.blocks.last_mut() {
                block[next_write..next_write + chunk].copy_from_slice(&src[..chunk]);
            }
            self.next_write += chunk;
            src = &src[chunk..];
        }
    }
}

/// Reads a [ByteStore] backwards, resolving each position to a block and offset.
pub struct StoreReader<'a> {
    blocks: &'a [Vec<u8>],
    block_bits: u32,
    block_mask: u64,
    end: u64,
    pos: u64,
}

impl<'a> StoreReader<'a> {
    /// Create a reader positioned at the last written byte of `store`.
    pub fn new(store: &'a ByteStore) -> Self {
        let end = store.position();
        Self {
            blocks: &store.blocks,
            block_bits: store.block_bits,
            block_mask: store.block_mask,
            end,
            pos: end.wrapping_sub(1),
        }
    }
}

impl BytesReader for StoreReader<'_> {
    fn read_byte(&mut self) -> Result<u8, Error> {
        if self.pos >= self.end {
            return Err(Error::EndOfInput);
        }
        let block = &self.blocks[(self.pos >> self.block_bits) as usize];
        let b = block[(self.pos & self.block_mask) as usize];
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
        if self.pos < self.end {
            self.pos + 1
        } else {
            0
        }
    }
}
