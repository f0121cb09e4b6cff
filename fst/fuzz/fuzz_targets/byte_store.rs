#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quire_fst::{data::DataOutput, store::ByteStore};

const MAX_OPERATIONS: usize = 128;

#[derive(Arbitrary, Debug)]
enum Operation {
    Write(Vec<u8>),
    WriteAt { offset: u16, bytes: Vec<u8> },
    Skip(u8),
    Move { src: u16, shift: u8, len: u16 },
    Reverse { src: u16, len: u16 },
    Truncate(u16),
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    block_bits: u8,
    operations: Vec<Operation>,
}

// Every operation is applied to a store and to a contiguous model, which must stay equal.
fn fuzz(input: FuzzInput) {
    let mut store = ByteStore::new(1 + (input.block_bits % 8) as u32);
    let mut model: Vec<u8> = Vec::new();
    for operation in input.operations.into_iter().take(MAX_OPERATIONS) {
        match operation {
            Operation::Write(bytes) => {
                store.write_bytes(&bytes);
                model.extend_from_slice(&bytes);
            }
            Operation::WriteAt { offset, bytes } => {
                let offset = offset as usize;
                if offset + bytes.len() > model.len() {
                    continue;
                }
                store.write_bytes_at(offset as u64, &bytes);
                model[offset..offset + bytes.len()].copy_from_slice(&bytes);
            }
            Operation::Skip(len) => {
                store.skip_bytes(len as usize);
                model.resize(model.len() + len as usize, 0);
            }
            Operation::Move { src, shift, len } => {
                let (src, len) = (src as usize, len as usize);
                let dest = src + 1 + shift as usize;
                if dest + len > model.len() {
                    continue;
                }
                store.move_bytes(src as u64, dest as u64, len);
                model.copy_within(src..src + len, dest);
            }
            Operation::Reverse { src, len } => {
                let (src, len) = (src as usize, len as usize);
                let dest = src + 1 + len;
                if dest >= model.len() {
                    continue;
                }
                store.reverse(src as u64, dest as u64);
                model[src..=dest].reverse();
            }
            Operation::Truncate(len) => {
                let len = len as usize;
                if len > model.len() {
                    continue;
                }
                store.truncate(len as u64);
                model.truncate(len);
            }
        }
        assert_eq!(store.position(), model.len() as u64);
    }
    assert_eq!(store.to_vec(), model);
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
