use super::Outputs;
use crate::{data::DataOutput, reader::BytesReader, Error};
use bytes::{BufMut, Bytes, BytesMut};

/// Outputs that are byte sequences, shared by longest common prefix.
///
/// Encoded as a vint length followed by the raw bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteSequenceOutputs;

impl Outputs for ByteSequenceOutputs {
    type Value = Bytes;

    fn common(&self, a: &Bytes, b: &Bytes) -> Bytes {
        let len = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
        if len == 0 {
            Bytes::new()
        } else if len == a.len() {
            a.clone()
        } else if len == b.len() {
            b.clone()
        } else {
            a.slice(..len)
        }
    }

    fn subtract(&self, output: &Bytes, inc: &Bytes) -> Bytes {
        assert!(
            output.starts_with(inc),
            "subtract error: {inc:?} is not a prefix of {output:?}"
        );
        if inc.is_empty() {
            output.clone()
        } else if inc.len() == output.len() {
            Bytes::new()
        } else {
            output.slice(inc.len()..)
        }
    }

    fn add(&self, prefix: &Bytes, output: &Bytes) -> Bytes {
        if prefix.is_empty() {
            output.clone()
        } else if output.is_empty() {
            prefix.clone()
        } else {
            let mut result = BytesMut::with_capacity(prefix.len() + output.len());
            result.put_slice(prefix);
            result.put_slice(output);
            result.freeze()
        }
    }

    fn no_output(&self) -> Bytes {
        Bytes::new()
    }

    fn write(&self, output: &Bytes, out: &mut impl DataOutput) {
        out.write_vint(output.len() as u32);
        out.write_bytes(output);
    }

    fn read<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<Bytes, Error> {
        let len = reader.read_vint()?;
        if len == 0 {
            return Ok(Bytes::new());
        }
        if len as u64 > reader.remaining() {
            return Err(Error::EndOfInput);
        }
        let mut buf = vec![0; len as usize];
        reader.read_bytes(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn skip_output<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<(), Error> {
        let len = reader.read_vint()?;
        reader.skip_bytes(len as i64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        outputs::tests::check_laws,
        reader::{ForwardReader, ReverseReader},
    };
    use test_case::test_case;

    #[test_case(b"", b"", b""; "empty")]
    #[test_case(b"foobar", b"foobaz", b"fooba"; "shared prefix")]
    #[test_case(b"foo", b"foobar", b"foo"; "prefix of other")]
    #[test_case(b"abc", b"xyz", b""; "disjoint")]
    fn test_common(a: &[u8], b: &[u8], expected: &[u8]) {
        let outputs = ByteSequenceOutputs;
        let a = Bytes::copy_from_slice(a);
        let b = Bytes::copy_from_slice(b);
        assert_eq!(&outputs.common(&a, &b)[..], expected);
    }

    #[test]
    fn test_laws() {
        let values: Vec<Bytes> = ["", "a", "ab", "abc", "abd", "b", "ba"]
            .into_iter()
            .map(|s: &'static str| Bytes::from_static(s.as_bytes()))
            .collect();
        check_laws(&ByteSequenceOutputs, &values);
    }

    #[test]
    fn test_add_subtract() {
        let outputs = ByteSequenceOutputs;
        let full = Bytes::from_static(b"hello world");
        let rest = outputs.subtract(&full, &Bytes::from_static(b"hello "));
        assert_eq!(&rest[..], b"world");
        assert_eq!(outputs.add(&Bytes::from_static(b"hello "), &rest), full);
    }

    #[test]
    #[should_panic(expected = "subtract error")]
    fn test_subtract_non_prefix() {
        let outputs = ByteSequenceOutputs;
        outputs.subtract(&Bytes::from_static(b"abc"), &Bytes::from_static(b"b"));
    }

    #[test]
    fn test_encoding() {
        let outputs = ByteSequenceOutputs;
        let mut buf = Vec::new();
        outputs.write(&Bytes::from_static(b"xyz"), &mut buf);
        outputs.write(&Bytes::new(), &mut buf);
        outputs.write(&Bytes::from_static(b"q"), &mut buf);
        assert_eq!(buf, vec![3, b'x', b'y', b'z', 0, 1, b'q']);

        let mut reader = ForwardReader::new(&buf);
        outputs.skip_output(&mut reader).unwrap();
        assert_eq!(outputs.read(&mut reader).unwrap(), Bytes::new());
        assert_eq!(&outputs.read(&mut reader).unwrap()[..], b"q");
    }

    #[test]
    fn test_length_beyond_input() {
        let outputs = ByteSequenceOutputs;
        let mut buf = Vec::new();
        buf.write_vint(u32::MAX);
        buf.write_bytes(b"abc");
        assert!(matches!(
            outputs.read(&mut ForwardReader::new(&buf)),
            Err(Error::EndOfInput)
        ));

        // Nodes are read backwards.
        let mut buf = Vec::new();
        buf.write_vint(4);
        buf.write_bytes(b"abc");
        buf.reverse();
        assert!(matches!(
            outputs.read(&mut ReverseReader::new(&buf)),
            Err(Error::EndOfInput)
        ));
    }
}
