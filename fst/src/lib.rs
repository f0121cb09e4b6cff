//! Compile sorted keys into a compact, byte-addressable finite state transducer (FST).
//!
//! An FST maps input sequences (keys) to outputs. Keys are added in strictly increasing order to
//! a [Builder], which shares both prefixes (as in a trie) and suffixes (by deduplicating frozen
//! nodes) and writes every node into a single byte array. The resulting [Fst] is immutable and is
//! traversed directly over those bytes: no pointer tree is ever materialized.
//!
//! # Status
//!
//! `quire-fst` is **ALPHA** software and is not yet recommended for production use. Developers
//! should expect breaking changes and occasional instability.
//!
//! # Outputs
//!
//! Outputs are described by an [Outputs] algebra (`common`, `subtract`, `add`). While a key is
//! added, outputs are pushed as close to the root as possible, so that the output of a key is the
//! sum of the outputs of the arcs on its path plus the final output of its last arc.
//!
//! # Format
//!
//! Nodes are written in reverse: every node is first appended forward and then its byte span is
//! reversed in place. Readers walk the array backwards, so an arc is decoded in the order it was
//! written and an arc pointing at the node frozen immediately before it can omit its target
//! (`BIT_TARGET_NEXT`). Address `0` holds a pad byte so that `0` is never a real node.
//!
//! Nodes use one of three layouts:
//!
//! ```text
//! List (variable length arcs, scanned linearly):
//! +-------+-------+--------+--------------+---------+-------+-----
//! | flags | label | output | final output | target  | flags | ...
//! +-------+-------+--------+--------------+---------+-------+-----
//!
//! Binary search (fixed length arcs):
//! +----+----------------+------------------+--------+--------+-----
//! | 32 | num_arcs(vint) | bytes/arc (vint) | arc[0] | arc[1] | ...
//! +----+----------------+------------------+--------+--------+-----
//!
//! Direct addressing (fixed length arcs without labels, indexed by label):
//! +----+-------------------+------------------+---------------+-------------+--------+-----
//! | 64 | label range(vint) | bytes/arc (vint) | presence bits | first label | arc[0] | ...
//! +----+-------------------+------------------+---------------+-------------+--------+-----
//! ```
//!
//! # Example
//!
//! ```rust
//! use quire_fst::{Builder, Config, PositiveIntOutputs};
//!
//! let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
//! builder.add(b"cat", 5).unwrap();
//! builder.add(b"dog", 7).unwrap();
//! builder.add(b"dogs", 12).unwrap();
//! let fst = builder.finish().unwrap().expect("fst accepts keys");
//!
//! assert_eq!(fst.get(b"dog").unwrap(), Some(7));
//! assert_eq!(fst.get(b"do").unwrap(), None);
//!
//! let mut keys = fst.enumerator::<u8>();
//! let (key, output) = keys.seek_ceil(b"da").unwrap().unwrap();
//! assert_eq!((key, *output), (&b"dog"[..], 7));
//! ```

use thiserror::Error;

pub mod arc;
pub mod automaton;
pub mod bits;
pub mod builder;
pub mod data;
pub mod enumerator;
pub mod input;
pub mod outputs;
pub mod reader;
pub mod source;
pub mod store;

pub use arc::{Address, Arc, Label, END_LABEL};
pub use automaton::Fst;
pub use builder::{Builder, Config};
pub use enumerator::Enumerator;
pub use input::{InputType, Symbol};
pub use outputs::{
    ByteSequenceOutputs, NoOutputs, Outputs, Pair, PairOutputs, PositiveIntOutputs,
};

/// Errors that can occur when reading or loading an [Fst].
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("invalid varint")]
    InvalidVarint,
    #[error("invalid magic: {0:#x}")]
    InvalidMagic(u32),
    #[error("invalid format name: {0}")]
    InvalidFormatName(String),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid input type: {0}")]
    InvalidInputType(u8),
    #[error("invalid storage marker: {0}")]
    InvalidStorage(u8),
    #[error("checksum mismatch: expected={expected:#x} found={found:#x}")]
    ChecksumMismatch { expected: u32, found: u32 },
    #[error("extra data: {0} bytes")]
    ExtraData(u64),
    #[error("corrupt node at {0}")]
    CorruptNode(u64),
}
