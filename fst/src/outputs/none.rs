use super::Outputs;
use crate::{data::DataOutput, reader::BytesReader, Error};

/// Outputs for an automaton that only records which keys are accepted.
///
/// Nothing is ever written, so every arc is as small as the label allows.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOutputs;

impl Outputs for NoOutputs {
    type Value = ();

    fn common(&self, _: &(), _: &()) {}

    fn subtract(&self, _: &(), _: &()) {}

    fn add(&self, _: &(), _: &()) {}

    fn no_output(&self) {}

    fn write(&self, _: &(), _: &mut impl DataOutput) {}

    fn read<R: BytesReader + ?Sized>(&self, _: &mut R) -> Result<(), Error> {
        Ok(())
    }
}
