//! Operations on the presence bit table of a direct-addressing node.
//!
//! The table is a sequence of bytes where bit `i % 8` of byte `i / 8` is set when the label
//! `first_label + i` has an arc. Every function reads the table through a [BytesReader] that must
//! be positioned at the first byte of the table and leaves the reader at an unspecified position.

use crate::{reader::BytesReader, Error};

/// Number of bytes needed to hold `bits` presence bits.
pub fn presence_bytes(bits: u32) -> u32 {
    bits.div_ceil(8)
}

/// Read up to 8 bytes as a little-endian word.
fn read_up_to_8_bytes<R: BytesReader + ?Sized>(reader: &mut R, count: u32) -> Result<u64, Error> {
    let mut word = 0u64;
    for shift in 0..count.min(8) {
        word |= (reader.read_byte()? as u64) << (shift * 8);
    }
    Ok(word)
}

/// Whether bit `index` is set.
pub fn is_bit_set<R: BytesReader + ?Sized>(index: u32, reader: &mut R) -> Result<bool, Error> {
    reader.skip_bytes((index >> 3) as i64);
    Ok(reader.read_byte()? & (1 << (index & 7)) != 0)
}

/// Number of bits set in a table of `table_bytes` bytes.
pub fn count_bits<R: BytesReader + ?Sized>(table_bytes: u32, reader: &mut R) -> Result<u32, Error> {
    let mut count = 0;
    let mut remaining = table_bytes;
    while remaining >= 8 {
        count += read_up_to_8_bytes(reader, 8)?.count_ones();
        remaining -= 8;
    }
    if remaining > 0 {
        count += read_up_to_8_bytes(reader, remaining)?.count_ones();
    }
    Ok(count)
}

/// Number of bits set strictly before bit `index`.
pub fn count_bits_up_to<R: BytesReader + ?Sized>(index: u32, reader: &mut R) -> Result<u32, Error> {
    let mut count = count_bits(index >> 3, reader)?;
    let bit = index & 7;
    if bit != 0 {
        let mask = (1u8 << bit) - 1;
        count += (reader.read_byte()? & mask).count_ones();
    }
    Ok(count)
}

/// The first set bit strictly after `index` (which may be `-1` to search from the start), or
/// `None` if there is none in a table of `table_bytes` bytes.
pub fn next_bit_set<R: BytesReader + ?Sized>(
    index: i32,
    table_bytes: u32,
    reader: &mut R,
) -> Result<Option<i32>, Error> {
    debug_assert!(index >= -1);
    let mut byte_index = ((index + 1) >> 3) as u32;
    if byte_index >= table_bytes {
        return Ok(None);
    }
    reader.skip_bytes(byte_index as i64);

    // Mask off the bits at or before `index` in the first byte.
    let first_bit = ((index + 1) & 7) as u32;
    let mut byte = reader.read_byte()? & (0xFFu8 << first_bit);
    while byte == 0 {
        byte_index += 1;
        if byte_index >= table_bytes {
            return Ok(None);
        }
        byte = reader.read_byte()?;
    }
    Ok(Some((byte_index * 8 + byte.trailing_zeros()) as i32))
}

/// The last set bit strictly before `index`, or `None` if there is none.
pub fn previous_bit_set<R: BytesReader + ?Sized>(
    index: u32,
    reader: &mut R,
) -> Result<Option<i32>, Error> {
    let mut byte_index = index >> 3;
    reader.skip_bytes(byte_index as i64);

    // Mask off the bits at or after `index` in the first byte.
    let mask = ((1u16 << (index & 7)) - 1) as u8;
    let mut byte = reader.read_byte()? & mask;
    while byte == 0 {
        if byte_index == 0 {
            return Ok(None);
        }
        byte_index -= 1;

        // Step back over the byte just read and the one before it.
        reader.skip_bytes(-2);
        byte = reader.read_byte()?;
    }
    Ok(Some((byte_index * 8 + 7 - byte.leading_zeros()) as i32))
}
