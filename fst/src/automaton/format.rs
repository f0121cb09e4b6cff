//! Serialization of an [Fst].
//!
//! # Format
//!
//! ```text
//! +-------------+-----------------+-------------+-------------------------------------------+
//! | magic (u32) | name (vint+utf8)| version(u32)| empty flag (u8) [len (vint) + rev. bytes] |
//! +-------------+-----------------+-------------+-------------------------------------------+
//! | input type (u8) | start node (vlong) | storage (u8) [block bits (u8)] | len (vlong) | nodes |
//! +-----------------+--------------------+--------------------------------+-------------+-------+
//! ```
//!
//! Fixed width integers are big-endian. The final output of the empty key is stored reversed so
//! that it can be decoded with the same reverse reader as node outputs. The storage marker
//! records whether the nodes were held in blocks when written (loading always yields a
//! contiguous buffer or a window of the source).
//!
//! Files written by [Fst::save] are followed by a CRC32 of everything before it:
//!
//! ```text
//! +------------------+------------+
//! | serialized FST   | CRC32(u32) |
//! +------------------+------------+
//! ```

use super::{Fst, Nodes};
use crate::{
    arc::Address,
    input::InputType,
    outputs::Outputs,
    reader::{BytesReader, ForwardReader, ReverseReader},
    source::{FileSource, RandomAccess, SourceReader},
    Error,
};
use bytes::{BufMut, Bytes};
use commonware_codec::varint;
use std::{fs::File, io::Read, path::Path, sync};
use tracing::{debug, warn};

const MAGIC: u32 = 0x3fd7_6c17;
const NAME: &str = "FST";
const VERSION: u32 = 1;

const STORAGE_FLAT: u8 = 0;
const STORAGE_BLOCKS: u8 = 1;

/// Size of the CRC32 footer of files.
const CHECKSUM_SIZE: u64 = 4;

/// Chunk size used when streaming a file through the checksum.
const CHECKSUM_CHUNK: usize = 64 * 1024;

/// Everything in a serialized FST except the node bytes.
struct Header<V> {
    input_type: InputType,
    start_node: Address,
    empty_output: Option<V>,
    num_bytes: u64,
}

fn read_header<O: Outputs, R: BytesReader + ?Sized>(
    outputs: &O,
    reader: &mut R,
) -> Result<Header<O::Value>, Error> {
    let magic = reader.read_u32()?;
    if magic != MAGIC {
        return Err(Error::InvalidMagic(magic));
    }
    let name_len = reader.read_vint()? as usize;
    if name_len > NAME.len() {
        return Err(Error::InvalidFormatName(format!("{name_len} bytes")));
    }
    let mut name = vec![0; name_len];
    reader.read_bytes(&mut name)?;
    if name != NAME.as_bytes() {
        return Err(Error::InvalidFormatName(
            String::from_utf8_lossy(&name).into_owned(),
        ));
    }
    let version = reader.read_u32()?;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let empty_output = match reader.read_byte()? {
        0 => None,
        _ => {
            let len = reader.read_vint()? as u64;
            if len > reader.remaining() {
                return Err(Error::EndOfInput);
            }
            let mut bytes = vec![0; len as usize];
            reader.read_bytes(&mut bytes)?;
            let mut empty = ReverseReader::new(&bytes);
            Some(outputs.read_final_output(&mut empty)?)
        }
    };
    let input_type = InputType::from_code(reader.read_byte()?)?;
    let start_node = reader.read_vlong()? as Address;
    match reader.read_byte()? {
        STORAGE_FLAT => {}
        STORAGE_BLOCKS => {
            reader.read_byte()?;
        }
        marker => return Err(Error::InvalidStorage(marker)),
    }
    let num_bytes = reader.read_vlong()?;
    Ok(Header {
        input_type,
        start_node,
        empty_output,
        num_bytes,
    })
}

impl<O: Outputs> Fst<O> {
    /// Serialize into `out`.
    pub fn write_to(&self, out: &mut impl BufMut) -> Result<(), Error> {
        let mut header = Vec::new();
        header.put_u32(MAGIC);
        varint::write(NAME.len() as u32, &mut header);
        header.put_slice(NAME.as_bytes());
        header.put_u32(VERSION);
        match &self.empty_output {
            Some(output) => {
                let mut empty = Vec::new();
                self.outputs.write_final_output(output, &mut empty);
                empty.reverse();
                header.put_u8(1);
                varint::write(empty.len() as u32, &mut header);
                header.put_slice(&empty);
            }
            None => header.put_u8(0),
        }
        header.put_u8(self.input_type.code());
        varint::write(self.start_node as u64, &mut header);
        match &self.nodes {
            Nodes::Store(store) => {
                header.put_u8(STORAGE_BLOCKS);
                header.put_u8(store.block_bits() as u8);
            }
            _ => header.put_u8(STORAGE_FLAT),
        }
        varint::write(self.num_bytes(), &mut header);
        out.put_slice(&header);

        match &self.nodes {
            Nodes::Store(store) => store.copy_to(out),
            Nodes::Flat(bytes) => out.put_slice(bytes),
            Nodes::Source {
                source,
                offset,
                len,
            } => {
                let mut buf = vec![0; CHECKSUM_CHUNK];
                let mut copied = 0;
                while copied < *len {
                    let chunk = (*len - copied).min(CHECKSUM_CHUNK as u64) as usize;
                    source.read_at(offset + copied, &mut buf[..chunk])?;
                    out.put_slice(&buf[..chunk]);
                    copied += chunk as u64;
                }
            }
        }
        Ok(())
    }

    /// Serialize into a new buffer.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(Bytes::from(out))
    }

    /// Deserialize an FST that occupies all of `bytes`.
    ///
    /// Node bytes are not copied: the FST holds a slice of `bytes`.
    pub fn read_from(bytes: Bytes, outputs: O) -> Result<Self, Error> {
        let mut reader = ForwardReader::new(&bytes);
        let header = read_header(&outputs, &mut reader)?;
        let start = reader.position();
        let remaining = reader.remaining();
        if header.num_bytes > remaining {
            return Err(Error::EndOfInput);
        }
        if header.num_bytes < remaining {
            return Err(Error::ExtraData(remaining - header.num_bytes));
        }
        let nodes = bytes.slice(start as usize..);
        debug!(
            bytes = header.num_bytes,
            start_node = header.start_node,
            "loaded fst"
        );
        Ok(Self::new(
            header.input_type,
            outputs,
            header.start_node,
            header.empty_output,
            Nodes::Flat(nodes),
        ))
    }

    /// Serve an FST directly from `source`, reading node bytes on demand.
    ///
    /// The FST must occupy all of `source`.
    pub fn open(source: sync::Arc<dyn RandomAccess>, outputs: O) -> Result<Self, Error> {
        let len = source.len();
        Self::open_window(source, len, outputs)
    }

    fn open_window(
        source: sync::Arc<dyn RandomAccess>,
        len: u64,
        outputs: O,
    ) -> Result<Self, Error> {
        let mut reader = SourceReader::forward(source.clone(), 0, len);
        let header = read_header(&outputs, &mut reader)?;
        let offset = reader.position();
        let remaining = len - offset;
        if header.num_bytes > remaining {
            return Err(Error::EndOfInput);
        }
        if header.num_bytes < remaining {
            return Err(Error::ExtraData(remaining - header.num_bytes));
        }
        debug!(
            bytes = header.num_bytes,
            start_node = header.start_node,
            offset,
            "opened fst"
        );
        Ok(Self::new(
            header.input_type,
            outputs,
            header.start_node,
            header.empty_output,
            Nodes::Source {
                source,
                offset,
                len: header.num_bytes,
            },
        ))
    }

    /// Write this FST to a file at `path`, followed by a checksum.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        let checksum = crc32fast::hash(&buf);
        buf.put_u32(checksum);
        std::fs::write(path.as_ref(), &buf)?;
        debug!(path = ?path.as_ref(), bytes = buf.len(), "saved fst");
        Ok(())
    }

    /// Load an FST written by [Fst::save] into memory, verifying its checksum.
    pub fn load(path: impl AsRef<Path>, outputs: O) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref())?;
        let len = data.len() as u64;
        if len < CHECKSUM_SIZE {
            return Err(Error::EndOfInput);
        }
        let body = (len - CHECKSUM_SIZE) as usize;
        let mut footer = [0u8; CHECKSUM_SIZE as usize];
        footer.copy_from_slice(&data[body..]);
        let expected = u32::from_be_bytes(footer);
        let found = crc32fast::hash(&data[..body]);
        if expected != found {
            warn!(path = ?path.as_ref(), expected, found, "checksum mismatch");
            return Err(Error::ChecksumMismatch { expected, found });
        }
        let mut bytes = Bytes::from(data);
        bytes.truncate(body);
        Self::read_from(bytes, outputs)
    }

    /// Open an FST written by [Fst::save] without loading its nodes into memory.
    ///
    /// The checksum is verified by streaming the file once.
    pub fn open_file(path: impl AsRef<Path>, outputs: O) -> Result<Self, Error> {
        let mut file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        if len < CHECKSUM_SIZE {
            return Err(Error::EndOfInput);
        }
        let body = len - CHECKSUM_SIZE;

        let mut hasher = crc32fast::Hasher::new();
        let mut buf = vec![0; CHECKSUM_CHUNK];
        let mut hashed = 0;
        while hashed < body {
            let chunk = (body - hashed).min(CHECKSUM_CHUNK as u64) as usize;
            file.read_exact(&mut buf[..chunk])?;
            hasher.update(&buf[..chunk]);
            hashed += chunk as u64;
        }
        let mut footer = [0u8; CHECKSUM_SIZE as usize];
        file.read_exact(&mut footer)?;
        let expected = u32::from_be_bytes(footer);
        let found = hasher.finalize();
        if expected != found {
            warn!(path = ?path.as_ref(), expected, found, "checksum mismatch");
            return Err(Error::ChecksumMismatch { expected, found });
        }

        let source = FileSource::new(file)?;
        Self::open_window(sync::Arc::new(source), body, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::{MAGIC, NAME, VERSION};
    use crate::{
        builder::{Builder, Config},
        data::DataOutput,
        outputs::{ByteSequenceOutputs, NoOutputs, PositiveIntOutputs},
        source::RandomAccess,
        Error, Fst,
    };
    use bytes::Bytes;
    use commonware_macros::test_traced;
    use std::sync;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("quire_fst_{}_{}", std::process::id(), name))
    }

    fn build(keys: &[(&str, u64)], config: Config) -> Fst<PositiveIntOutputs> {
        let mut builder = Builder::new(config, PositiveIntOutputs);
        for (key, output) in keys {
            builder.add(key.as_bytes(), *output).unwrap();
        }
        builder.finish().unwrap().unwrap()
    }

    fn check(fst: &Fst<PositiveIntOutputs>, keys: &[(&str, u64)]) {
        for (key, output) in keys {
            assert_eq!(fst.get(key.as_bytes()).unwrap(), Some(*output));
        }
        assert_eq!(fst.get(b"zzz").unwrap(), None);
        let mut entries = fst.enumerator::<u8>();
        let mut seen = Vec::new();
        while let Some((key, output)) = entries.next().unwrap() {
            seen.push((key.to_vec(), *output));
        }
        let expected: Vec<_> = keys.iter().map(|(k, o)| (k.as_bytes().to_vec(), *o)).collect();
        assert_eq!(seen, expected);
    }

    const KEYS: &[(&str, u64)] = &[
        ("", 3),
        ("cat", 5),
        ("catalog", 9),
        ("dog", 7),
        ("dogs", 12),
        ("zebra", 1),
    ];

    #[test_traced]
    fn test_bytes_round_trip() {
        let fst = build(KEYS, Config::default());
        let bytes = fst.to_bytes().unwrap();
        let loaded = Fst::read_from(bytes.clone(), PositiveIntOutputs).unwrap();
        assert_eq!(loaded.start_node(), fst.start_node());
        assert_eq!(loaded.num_bytes(), fst.num_bytes());
        assert_eq!(loaded.empty_output(), Some(&3));
        check(&loaded, KEYS);

        // Re-serializing a loaded FST is byte-identical apart from the storage marker.
        let again = loaded.to_bytes().unwrap();
        assert_eq!(again.len() + 1, bytes.len());
    }

    #[test_traced]
    fn test_open_from_source() {
        // Small blocks so that the built FST spans several blocks.
        let config = Config {
            bytes_page_bits: 2,
            ..Config::default()
        };
        let fst = build(KEYS, config);
        let source: sync::Arc<dyn RandomAccess> = sync::Arc::new(fst.to_bytes().unwrap());
        let opened = Fst::open(source, PositiveIntOutputs).unwrap();
        check(&opened, KEYS);

        // Off-heap FSTs serialize like flat ones.
        let copied = Fst::read_from(opened.to_bytes().unwrap(), PositiveIntOutputs).unwrap();
        check(&copied, KEYS);
    }

    #[test_traced]
    fn test_file_round_trip() {
        let fst = build(KEYS, Config::default());
        let path = temp_path("file_round_trip");
        fst.save(&path).unwrap();
        check(&Fst::load(&path, PositiveIntOutputs).unwrap(), KEYS);
        check(&Fst::open_file(&path, PositiveIntOutputs).unwrap(), KEYS);
        std::fs::remove_file(&path).unwrap();
    }

    #[test_traced]
    fn test_file_corruption() {
        let fst = build(KEYS, Config::default());
        let path = temp_path("file_corruption");
        fst.save(&path).unwrap();
        let mut data = std::fs::read(&path).unwrap();
        let mid = data.len() / 2;
        data[mid] ^= 0xFF;
        std::fs::write(&path, &data).unwrap();
        assert!(matches!(
            Fst::load(&path, PositiveIntOutputs),
            Err(Error::ChecksumMismatch { .. })
        ));
        assert!(matches!(
            Fst::open_file(&path, PositiveIntOutputs),
            Err(Error::ChecksumMismatch { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test_traced]
    fn test_invalid_headers() {
        let fst = build(KEYS, Config::default());
        let bytes = fst.to_bytes().unwrap();

        let mut bad = bytes.to_vec();
        bad[0] ^= 1;
        assert!(matches!(
            Fst::read_from(Bytes::from(bad), PositiveIntOutputs),
            Err(Error::InvalidMagic(_))
        ));

        let mut bad = bytes.to_vec();
        bad[5] = b'X';
        assert!(matches!(
            Fst::read_from(Bytes::from(bad), PositiveIntOutputs),
            Err(Error::InvalidFormatName(_))
        ));

        let mut bad = bytes.to_vec();
        bad[11] = 9;
        assert!(matches!(
            Fst::read_from(Bytes::from(bad), PositiveIntOutputs),
            Err(Error::UnsupportedVersion(_))
        ));

        let truncated = bytes.slice(..bytes.len() - 1);
        assert!(matches!(
            Fst::read_from(truncated, PositiveIntOutputs),
            Err(Error::EndOfInput)
        ));

        let mut extended = bytes.to_vec();
        extended.push(0);
        assert!(matches!(
            Fst::read_from(Bytes::from(extended), PositiveIntOutputs),
            Err(Error::ExtraData(1))
        ));
    }

    #[test_traced]
    fn test_empty_output_length_beyond_input() {
        let mut header = Vec::new();
        header.write_u32(MAGIC);
        header.write_vint(NAME.len() as u32);
        header.write_bytes(NAME.as_bytes());
        header.write_u32(VERSION);
        header.write_byte(1);
        header.write_vint(0xFFFF_FFFF);
        header.write_bytes(&[0; 16]);
        let bytes = Bytes::from(header);
        assert!(matches!(
            Fst::read_from(bytes.clone(), ByteSequenceOutputs),
            Err(Error::EndOfInput)
        ));
        let source: sync::Arc<dyn RandomAccess> = sync::Arc::new(bytes);
        assert!(matches!(
            Fst::open(source, ByteSequenceOutputs),
            Err(Error::EndOfInput)
        ));
    }

    #[test_traced]
    fn test_other_outputs_round_trip() {
        let mut builder = Builder::new(Config::default(), ByteSequenceOutputs);
        builder.add(b"", Bytes::from_static(b"root")).unwrap();
        builder.add(b"a", Bytes::from_static(b"alpha")).unwrap();
        builder.add(b"ab", Bytes::from_static(b"alpine")).unwrap();
        let fst = builder.finish().unwrap().unwrap();
        let loaded = Fst::read_from(fst.to_bytes().unwrap(), ByteSequenceOutputs).unwrap();
        assert_eq!(loaded.empty_output(), Some(&Bytes::from_static(b"root")));
        assert_eq!(
            loaded.get(b"ab").unwrap(),
            Some(Bytes::from_static(b"alpine"))
        );

        let mut builder = Builder::new(Config::default(), NoOutputs);
        builder.add(b"x", ()).unwrap();
        builder.add(b"y", ()).unwrap();
        let fst = builder.finish().unwrap().unwrap();
        let loaded = Fst::read_from(fst.to_bytes().unwrap(), NoOutputs).unwrap();
        assert!(loaded.contains(b"x").unwrap());
        assert!(!loaded.contains(b"z").unwrap());
    }
}
