//! The algebra of values an [crate::Fst] associates with its keys.
//!
//! While keys are added, the output shared by all keys below an arc is moved onto that arc
//! ([Outputs::common]), and what remains is pushed further down ([Outputs::subtract]). Walking a
//! path adds the outputs back together ([Outputs::add]). Implementations must satisfy, for all
//! `a` and `b`:
//!
//! * `add(common(a, b), subtract(a, common(a, b))) == a`
//! * `add(no_output(), a) == add(a, no_output()) == a`
//! * `subtract(a, no_output()) == a`

use crate::{data::DataOutput, reader::BytesReader, Error};
use std::{fmt::Debug, hash::Hash};

mod int;
mod none;
mod pair;
mod sequence;

pub use int::PositiveIntOutputs;
pub use none::NoOutputs;
pub use pair::{Pair, PairOutputs};
pub use sequence::ByteSequenceOutputs;

/// Operations on the outputs of an [crate::Fst].
pub trait Outputs: Clone {
    /// The type of a single output.
    type Value: Clone + Eq + Hash + Debug;

    /// The greatest output that is a "prefix" of both `a` and `b`.
    fn common(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    /// Remove the prefix `inc` from `output`.
    ///
    /// # Panics
    ///
    /// Panics if `inc` is not a prefix of `output`.
    fn subtract(&self, output: &Self::Value, inc: &Self::Value) -> Self::Value;

    /// Concatenate `prefix` and `output`.
    fn add(&self, prefix: &Self::Value, output: &Self::Value) -> Self::Value;

    /// The identity output, never written to arcs.
    fn no_output(&self) -> Self::Value;

    /// Encode an arc output.
    fn write(&self, output: &Self::Value, out: &mut impl DataOutput);

    /// Decode an arc output written by [Outputs::write].
    fn read<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<Self::Value, Error>;

    /// Skip an arc output written by [Outputs::write] without materializing it.
    fn skip_output<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<(), Error> {
        self.read(reader).map(|_| ())
    }

    /// Encode a final output.
    fn write_final_output(&self, output: &Self::Value, out: &mut impl DataOutput) {
        self.write(output, out);
    }

    /// Decode a final output written by [Outputs::write_final_output].
    fn read_final_output<R: BytesReader + ?Sized>(
        &self,
        reader: &mut R,
    ) -> Result<Self::Value, Error> {
        self.read(reader)
    }

    /// Skip a final output written by [Outputs::write_final_output].
    fn skip_final_output<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<(), Error> {
        self.skip_output(reader)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Check the algebra laws for every pair of `values`.
    pub fn check_laws<O: Outputs>(outputs: &O, values: &[O::Value]) {
        let none = outputs.no_output();
        for a in values {
            assert_eq!(&outputs.add(&none, a), a);
            assert_eq!(&outputs.add(a, &none), a);
            assert_eq!(&outputs.subtract(a, &none), a);
            assert_eq!(outputs.subtract(a, a), none);
            for b in values {
                let common = outputs.common(a, b);
                assert_eq!(common, outputs.common(b, a));
                assert_eq!(&outputs.add(&common, &outputs.subtract(a, &common)), a);
                assert_eq!(&outputs.add(&common, &outputs.subtract(b, &common)), b);
            }
        }
    }
}
