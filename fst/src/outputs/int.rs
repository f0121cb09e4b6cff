use super::Outputs;
use crate::{data::DataOutput, reader::BytesReader, Error};

/// Outputs that are non-negative integers, shared by minimum.
///
/// `0` is the identity. Encoded as a vlong.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositiveIntOutputs;

impl Outputs for PositiveIntOutputs {
    type Value = u64;

    fn common(&self, a: &u64, b: &u64) -> u64 {
        *a.min(b)
    }

    fn subtract(&self, output: &u64, inc: &u64) -> u64 {
        assert!(inc <= output, "subtract error: {inc} > {output}");
        output - inc
    }

    fn add(&self, prefix: &u64, output: &u64) -> u64 {
        prefix + output
    }

    fn no_output(&self) -> u64 {
        0
    }

    fn write(&self, output: &u64, out: &mut impl DataOutput) {
        out.write_vlong(*output);
    }

    fn read<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<u64, Error> {
        reader.read_vlong()
    }
}
