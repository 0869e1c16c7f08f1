//! FBX binary container reader.
//!
//! The reader is IO-free: it operates on an in-memory byte slice and
//! materializes the whole node forest before anything downstream runs.
//! Everything in the container is little-endian.

use crate::node::{Document, Node, Property};
use crate::Error;
use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

const MAGIC: &[u8] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// Versions at or above this use 64-bit node-record headers.
const WIDE_HEADER_VERSION: u32 = 7500;

/// Distance from a record's end offset under which only sentinel padding
/// can remain; a nested sibling list never starts this close to the end.
const NULL_RECORD_LEN: usize = 13;

/// Marker inside a string property separating name from class; the halves
/// are swapped and joined with `::` on decode.
const QUALIFIED_NAME_SENTINEL: &[u8] = b"\x00\x01";

#[derive(Clone, Debug)]
struct BinaryInput<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BinaryInput<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    fn eof(&self, what: &str) -> Error {
        Error::Parse {
            message: format!("unexpected EOF while reading {what} at offset {}", self.cursor),
        }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], Error> {
        if self.remaining() < len {
            return Err(self.eof(what));
        }
        let bytes = &self.bytes[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    fn read_u8(&mut self, what: &str) -> Result<u8, Error> {
        Ok(self.take(1, what)?[0])
    }

    fn read_i16(&mut self, what: &str) -> Result<i16, Error> {
        Ok(LittleEndian::read_i16(self.take(2, what)?))
    }

    fn read_u32(&mut self, what: &str) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.take(4, what)?))
    }

    fn read_i32(&mut self, what: &str) -> Result<i32, Error> {
        Ok(LittleEndian::read_i32(self.take(4, what)?))
    }

    fn read_u64(&mut self, what: &str) -> Result<u64, Error> {
        Ok(LittleEndian::read_u64(self.take(8, what)?))
    }

    fn read_i64(&mut self, what: &str) -> Result<i64, Error> {
        Ok(LittleEndian::read_i64(self.take(8, what)?))
    }

    fn read_f32(&mut self, what: &str) -> Result<f32, Error> {
        Ok(LittleEndian::read_f32(self.take(4, what)?))
    }

    fn read_f64(&mut self, what: &str) -> Result<f64, Error> {
        Ok(LittleEndian::read_f64(self.take(8, what)?))
    }
}

/// Parses a complete FBX binary document. Fails on bad magic, truncation,
/// an unknown property tag, or a corrupt compressed array; missing
/// animation structure is not the parser's concern.
pub fn parse_document(bytes: &[u8]) -> Result<Document, Error> {
    let mut input = BinaryInput::new(bytes);
    let magic = input.take(MAGIC.len(), "magic").map_err(|_| Error::Magic)?;
    if magic != MAGIC {
        return Err(Error::Magic);
    }
    let version = input.read_u32("version")?;
    let wide = version >= WIDE_HEADER_VERSION;

    let mut nodes = Vec::new();
    loop {
        // Exporters terminate the top-level list with a zero-end_offset
        // sentinel and append a footer we ignore; a clean EOF at a record
        // boundary also ends the list.
        if input.remaining() == 0 {
            break;
        }
        match read_node(&mut input, wide)? {
            Some(node) => nodes.push(node),
            None => break,
        }
    }

    Ok(Document {
        version,
        root: Node {
            name: String::new(),
            properties: Vec::new(),
            children: nodes,
        },
    })
}

/// Reads one node record. Returns `None` for the zero-`end_offset`
/// sentinel that terminates a sibling list.
fn read_node(input: &mut BinaryInput<'_>, wide: bool) -> Result<Option<Node>, Error> {
    let record_offset = input.cursor;
    let (end_offset, num_properties) = if wide {
        let end = input.read_u64("node end offset")? as usize;
        let num = input.read_u64("node property count")? as usize;
        let _property_list_len = input.read_u64("node property list length")?;
        (end, num)
    } else {
        let end = input.read_u32("node end offset")? as usize;
        let num = input.read_u32("node property count")? as usize;
        let _property_list_len = input.read_u32("node property list length")?;
        (end, num)
    };
    let name_len = input.read_u8("node name length")? as usize;

    if end_offset == 0 {
        return Ok(None);
    }
    if end_offset > input.bytes.len() {
        return Err(Error::Parse {
            message: format!(
                "node at offset {record_offset} ends at {end_offset}, past end of file ({})",
                input.bytes.len()
            ),
        });
    }

    let name_bytes = input.take(name_len, "node name")?;
    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| Error::Parse {
            message: format!("invalid node name at offset {record_offset}"),
        })?
        .to_string();

    let mut properties = Vec::with_capacity(num_properties);
    for _ in 0..num_properties {
        properties.push(read_property(input)?);
    }

    let mut children = Vec::new();
    while end_offset.saturating_sub(input.cursor) > NULL_RECORD_LEN {
        match read_node(input, wide)? {
            Some(child) => children.push(child),
            None => break,
        }
    }
    input.cursor = end_offset;

    Ok(Some(Node {
        name,
        properties,
        children,
    }))
}

fn read_property(input: &mut BinaryInput<'_>) -> Result<Property, Error> {
    let offset = input.cursor;
    let tag = input.read_u8("property type tag")?;
    Ok(match tag {
        b'Y' => Property::I16(input.read_i16("i16 property")?),
        b'C' => Property::Bool(input.read_u8("bool property")? != 0),
        b'I' => Property::I32(input.read_i32("i32 property")?),
        b'F' => Property::F32(input.read_f32("f32 property")?),
        b'D' => Property::F64(input.read_f64("f64 property")?),
        b'L' => Property::I64(input.read_i64("i64 property")?),
        b'f' => Property::F32Array(read_array(input, 4, LittleEndian::read_f32)?),
        b'd' => Property::F64Array(read_array(input, 8, LittleEndian::read_f64)?),
        b'l' => Property::I64Array(read_array(input, 8, LittleEndian::read_i64)?),
        b'i' => Property::I32Array(read_array(input, 4, LittleEndian::read_i32)?),
        b'b' => Property::BoolArray(read_array(input, 1, |b| b[0] != 0)?),
        b'S' => {
            let len = input.read_u32("string length")? as usize;
            Property::String(decode_qualified_name(input.take(len, "string property")?))
        }
        b'R' => {
            let len = input.read_u32("raw blob length")? as usize;
            Property::Raw(input.take(len, "raw property")?.to_vec())
        }
        other => {
            return Err(Error::Parse {
                message: format!(
                    "unknown property type {:?} (0x{other:02x}) at offset {offset}",
                    other as char
                ),
            });
        }
    })
}

/// Reads a length-prefixed array property. The payload is either raw or a
/// zlib-wrapped deflate stream, per the 4-byte encoding flag.
fn read_array<T>(
    input: &mut BinaryInput<'_>,
    elem_size: usize,
    decode: fn(&[u8]) -> T,
) -> Result<Vec<T>, Error> {
    let offset = input.cursor;
    let len = input.read_u32("array length")? as usize;
    let encoding = input.read_u32("array encoding")?;
    let byte_len = input.read_u32("array byte length")? as usize;
    let expected = len * elem_size;

    let inflated;
    let payload: &[u8] = match encoding {
        0 => input.take(expected, "array payload")?,
        1 => {
            let compressed = input.take(byte_len, "compressed array payload")?;
            inflated = inflate(compressed, expected, offset)?;
            &inflated
        }
        other => {
            return Err(Error::Parse {
                message: format!("unsupported array encoding {other} at offset {offset}"),
            });
        }
    };
    if payload.len() != expected {
        return Err(Error::Parse {
            message: format!(
                "array at offset {offset} holds {} bytes, expected {expected} ({len} elements)",
                payload.len()
            ),
        });
    }

    Ok(payload.chunks_exact(elem_size).map(decode).collect())
}

fn inflate(compressed: &[u8], expected_len: usize, offset: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(expected_len);
    flate2::read::ZlibDecoder::new(compressed)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompress {
            message: format!("{e} (array at offset {offset})"),
        })?;
    Ok(out)
}

/// Strings store qualified names as `name\x00\x01Class`; decode swaps the
/// halves into `Class::name`. Non-UTF-8 bytes decode lossily (some
/// exporters emit Latin-1 in free-form strings).
fn decode_qualified_name(bytes: &[u8]) -> String {
    match bytes
        .windows(QUALIFIED_NAME_SENTINEL.len())
        .position(|w| w == QUALIFIED_NAME_SENTINEL)
    {
        Some(pos) => {
            let name = String::from_utf8_lossy(&bytes[..pos]);
            let class = String::from_utf8_lossy(&bytes[pos + QUALIFIED_NAME_SENTINEL.len()..]);
            format!("{class}::{name}")
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}
