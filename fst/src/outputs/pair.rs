use super::Outputs;
use crate::{data::DataOutput, reader::BytesReader, Error};

/// An output made of two independent outputs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pair<A, B> {
    pub output1: A,
    pub output2: B,
}

impl<A, B> Pair<A, B> {
    pub fn new(output1: A, output2: B) -> Self {
        Self { output1, output2 }
    }
}

/// Combines two [Outputs] component-wise.
///
/// The encoding is the first output followed by the second. Pairs may be nested.
#[derive(Clone, Debug, Default)]
pub struct PairOutputs<A, B> {
    outputs1: A,
    outputs2: B,
}

impl<A: Outputs, B: Outputs> PairOutputs<A, B> {
    pub fn new(outputs1: A, outputs2: B) -> Self {
        Self { outputs1, outputs2 }
    }

    /// Create a pair of outputs.
    pub fn pair(&self, output1: A::Value, output2: B::Value) -> Pair<A::Value, B::Value> {
        Pair::new(output1, output2)
    }
}

impl<A: Outputs, B: Outputs> Outputs for PairOutputs<A, B> {
    type Value = Pair<A::Value, B::Value>;

    fn common(&self, a: &Self::Value, b: &Self::Value) -> Self::Value {
        Pair::new(
            self.outputs1.common(&a.output1, &b.output1),
            self.outputs2.common(&a.output2, &b.output2),
        )
    }

    fn subtract(&self, output: &Self::Value, inc: &Self::Value) -> Self::Value {
        Pair::new(
            self.outputs1.subtract(&output.output1, &inc.output1),
            self.outputs2.subtract(&output.output2, &inc.output2),
        )
    }

    fn add(&self, prefix: &Self::Value, output: &Self::Value) -> Self::Value {
        Pair::new(
            self.outputs1.add(&prefix.output1, &output.output1),
            self.outputs2.add(&prefix.output2, &output.output2),
        )
    }

    fn no_output(&self) -> Self::Value {
        Pair::new(self.outputs1.no_output(), self.outputs2.no_output())
    }

    fn write(&self, output: &Self::Value, out: &mut impl DataOutput) {
        self.outputs1.write(&output.output1, out);
        self.outputs2.write(&output.output2, out);
    }

    fn read<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<Self::Value, Error> {
        let output1 = self.outputs1.read(reader)?;
        let output2 = self.outputs2.read(reader)?;
        Ok(Pair::new(output1, output2))
    }

    fn skip_output<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<(), Error> {
        self.outputs1.skip_output(reader)?;
        self.outputs2.skip_output(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        outputs::{tests::check_laws, ByteSequenceOutputs, PositiveIntOutputs},
        reader::ForwardReader,
    };
    use bytes::Bytes;

    #[test]
    fn test_laws() {
        let outputs = PairOutputs::new(PositiveIntOutputs, ByteSequenceOutputs);
        let mut values = Vec::new();
        for n in [0u64, 3, 10] {
            for s in ["", "x", "xy", "z"] {
                values.push(outputs.pair(n, Bytes::from_static(s.as_bytes())));
            }
        }
        check_laws(&outputs, &values);
    }

    #[test]
    fn test_nested() {
        let inner = PairOutputs::new(PositiveIntOutputs, PositiveIntOutputs);
        let outputs = PairOutputs::new(inner.clone(), ByteSequenceOutputs);
        let value = outputs.pair(inner.pair(5, 300), Bytes::from_static(b"ok"));

        let mut buf = Vec::new();
        outputs.write(&value, &mut buf);
        assert_eq!(buf, vec![5, 0xAC, 0x02, 2, b'o', b'k']);
        assert_eq!(outputs.read(&mut ForwardReader::new(&buf)).unwrap(), value);

        let mut reader = ForwardReader::new(&buf);
        outputs.skip_output(&mut reader).unwrap();
        assert_eq!(reader.remaining(), 0);
    }
}
