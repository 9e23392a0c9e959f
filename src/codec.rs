// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Binary map codec (MessagePack).
//!
//! Metadata travels through the filter as encoded MessagePack maps. This module
//! provides a zero-copy view over an encoded object and an encoder for maps.
//!
//! # Decoding
//!
//! [`decode`] walks an encoded buffer and returns an [`Object`] tree borrowing from it.
//! Only the shapes the filter needs to look into are typed (maps, arrays and strings);
//! every other payload (integers, floats, booleans, nil, binary, extension types) is
//! kept as [`Object::Opaque`]. Every object remembers its raw encoded span, so it can
//! be copied into another buffer byte for byte without being re-interpreted.
//!
//! # Encoding
//!
//! [`MapEncoder`] writes a map header with a declared size, then entries. Calling
//! [`MapEncoder::finish`] checks that exactly the declared number of entries was written.
//!
//! # Example
//!
//! ```rust
//! use kubemeta::codec::{decode, MapEncoder};
//!
//! let mut encoder = MapEncoder::new(1).unwrap();
//! encoder.push_str("pod_name", "web-0").unwrap();
//! let buf = encoder.finish().unwrap();
//!
//! let object = decode(&buf).unwrap();
//! let map = object.as_map().unwrap();
//! assert_eq!(map.get("pod_name").and_then(|v| v.as_str()), Some("web-0"));
//! ```

use crate::constants::MAX_DECODE_DEPTH;
use crate::errors::{DecodeError, EncodeError};
use rmp::Marker;
use serde_json::Value;

/// A decoded object borrowing from its encoded buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Object<'a> {
    /// A map of key/value objects, in encoded order
    Map(Map<'a>),
    /// An array of objects
    Array(Array<'a>),
    /// A string (bytes are not required to be valid UTF-8)
    Str(Str<'a>),
    /// Any other payload, kept as its raw encoding
    Opaque(&'a [u8]),
}

/// Map view: entries in the order they were encoded, duplicates included.
#[derive(Debug, Clone, PartialEq)]
pub struct Map<'a> {
    raw: &'a [u8],
    entries: Vec<(Object<'a>, Object<'a>)>,
}

/// Array view.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<'a> {
    raw: &'a [u8],
    items: Vec<Object<'a>>,
}

/// String view.
#[derive(Debug, Clone, PartialEq)]
pub struct Str<'a> {
    raw: &'a [u8],
    bytes: &'a [u8],
}

impl<'a> Object<'a> {
    /// The raw encoded bytes of this object, header included.
    #[must_use]
    pub fn raw(&self) -> &'a [u8] {
        match self {
            Self::Map(map) => map.raw,
            Self::Array(array) => array.raw,
            Self::Str(s) => s.raw,
            Self::Opaque(raw) => raw,
        }
    }

    /// Returns the map view if this object is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&Map<'a>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the string payload if this object is a valid UTF-8 string.
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::Str(s) => std::str::from_utf8(s.bytes).ok(),
            _ => None,
        }
    }

    /// Whether this object is a string with exactly the bytes of `key`.
    #[must_use]
    pub fn is_str(&self, key: &str) -> bool {
        matches!(self, Self::Str(s) if s.bytes == key.as_bytes())
    }
}

impl<'a> Map<'a> {
    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in encoded order.
    #[must_use]
    pub fn entries(&self) -> &[(Object<'a>, Object<'a>)] {
        &self.entries
    }

    /// First entry whose key is the string `key`.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&(Object<'a>, Object<'a>)> {
        self.entries.iter().find(|(k, _)| k.is_str(key))
    }

    /// Value of the first entry whose key is the string `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Object<'a>> {
        self.entry(key).map(|(_, v)| v)
    }
}

impl<'a> Array<'a> {
    /// Items in encoded order.
    #[must_use]
    pub fn items(&self) -> &[Object<'a>] {
        &self.items
    }
}

impl<'a> Str<'a> {
    /// The string payload without its header.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Decode the first object in `buf`.
///
/// Bytes following the first object are ignored.
///
/// # Errors
///
/// Returns [`DecodeError`] if `buf` is truncated, contains the reserved marker,
/// or nests deeper than the depth limit.
pub fn decode(buf: &[u8]) -> Result<Object<'_>, DecodeError> {
    Decoder { buf, pos: 0 }.object(0)
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(DecodeError::UnexpectedEof { offset: self.pos })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn len8(&mut self) -> Result<usize, DecodeError> {
        Ok(usize::from(self.take(1)?[0]))
    }

    fn len16(&mut self) -> Result<usize, DecodeError> {
        let b = self.take(2)?;
        Ok(usize::from(u16::from_be_bytes([b[0], b[1]])))
    }

    fn len32(&mut self) -> Result<usize, DecodeError> {
        let offset = self.pos;
        let b = self.take(4)?;
        usize::try_from(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            .map_err(|_| DecodeError::UnexpectedEof { offset })
    }

    fn object(&mut self, depth: usize) -> Result<Object<'a>, DecodeError> {
        if depth > MAX_DECODE_DEPTH {
            return Err(DecodeError::TooDeep {
                max: MAX_DECODE_DEPTH,
            });
        }

        let start = self.pos;
        let marker = Marker::from_u8(self.take(1)?[0]);

        let object = match marker {
            Marker::FixMap(n) => self.map(start, usize::from(n), depth)?,
            Marker::Map16 => {
                let n = self.len16()?;
                self.map(start, n, depth)?
            }
            Marker::Map32 => {
                let n = self.len32()?;
                self.map(start, n, depth)?
            }
            Marker::FixArray(n) => self.array(start, usize::from(n), depth)?,
            Marker::Array16 => {
                let n = self.len16()?;
                self.array(start, n, depth)?
            }
            Marker::Array32 => {
                let n = self.len32()?;
                self.array(start, n, depth)?
            }
            Marker::FixStr(n) => self.string(start, usize::from(n))?,
            Marker::Str8 => {
                let n = self.len8()?;
                self.string(start, n)?
            }
            Marker::Str16 => {
                let n = self.len16()?;
                self.string(start, n)?
            }
            Marker::Str32 => {
                let n = self.len32()?;
                self.string(start, n)?
            }
            Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => {
                self.opaque(start, 0)?
            }
            Marker::U8 | Marker::I8 => self.opaque(start, 1)?,
            Marker::U16 | Marker::I16 => self.opaque(start, 2)?,
            Marker::U32 | Marker::I32 | Marker::F32 => self.opaque(start, 4)?,
            Marker::U64 | Marker::I64 | Marker::F64 => self.opaque(start, 8)?,
            Marker::Bin8 => {
                let n = self.len8()?;
                self.opaque(start, n)?
            }
            Marker::Bin16 => {
                let n = self.len16()?;
                self.opaque(start, n)?
            }
            Marker::Bin32 => {
                let n = self.len32()?;
                self.opaque(start, n)?
            }
            // Extension payloads carry a one byte type tag before the data
            Marker::FixExt1 => self.opaque(start, 2)?,
            Marker::FixExt2 => self.opaque(start, 3)?,
            Marker::FixExt4 => self.opaque(start, 5)?,
            Marker::FixExt8 => self.opaque(start, 9)?,
            Marker::FixExt16 => self.opaque(start, 17)?,
            Marker::Ext8 => {
                let n = self.len8()?;
                self.opaque(start, n.saturating_add(1))?
            }
            Marker::Ext16 => {
                let n = self.len16()?;
                self.opaque(start, n.saturating_add(1))?
            }
            Marker::Ext32 => {
                let n = self.len32()?;
                self.opaque(start, n.saturating_add(1))?
            }
            Marker::Reserved => return Err(DecodeError::ReservedMarker { offset: start }),
        };

        Ok(object)
    }

    fn map(&mut self, start: usize, n: usize, depth: usize) -> Result<Object<'a>, DecodeError> {
        let mut entries = Vec::new();
        for _ in 0..n {
            let key = self.object(depth + 1)?;
            let value = self.object(depth + 1)?;
            entries.push((key, value));
        }
        Ok(Object::Map(Map {
            raw: &self.buf[start..self.pos],
            entries,
        }))
    }

    fn array(&mut self, start: usize, n: usize, depth: usize) -> Result<Object<'a>, DecodeError> {
        let mut items = Vec::new();
        for _ in 0..n {
            items.push(self.object(depth + 1)?);
        }
        Ok(Object::Array(Array {
            raw: &self.buf[start..self.pos],
            items,
        }))
    }

    fn string(&mut self, start: usize, n: usize) -> Result<Object<'a>, DecodeError> {
        let bytes = self.take(n)?;
        Ok(Object::Str(Str {
            raw: &self.buf[start..self.pos],
            bytes,
        }))
    }

    fn opaque(&mut self, start: usize, n: usize) -> Result<Object<'a>, DecodeError> {
        self.take(n)?;
        Ok(Object::Opaque(&self.buf[start..self.pos]))
    }
}

/// Encoder for a single map with a size declared up front.
#[derive(Debug)]
pub struct MapEncoder {
    buf: Vec<u8>,
    declared: u32,
    written: u32,
}

impl MapEncoder {
    /// Start a map that will hold exactly `declared` entries.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] if `declared` does not fit the wire format.
    pub fn new(declared: usize) -> Result<Self, EncodeError> {
        let declared = u32::try_from(declared).map_err(|_| EncodeError::TooLarge {
            what: "map",
            len: declared,
        })?;
        let mut buf = Vec::new();
        rmp::encode::write_map_len(&mut buf, declared)
            .map_err(|e| EncodeError::Write(e.to_string()))?;
        Ok(Self {
            buf,
            declared,
            written: 0,
        })
    }

    /// Append an entry whose key and value are copied verbatim from decoded objects.
    pub fn push_object(&mut self, key: &Object<'_>, value: &Object<'_>) {
        self.buf.extend_from_slice(key.raw());
        self.buf.extend_from_slice(value.raw());
        self.written = self.written.saturating_add(1);
    }

    /// Append an entry with a string key and a value copied verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if the key cannot be encoded.
    pub fn push_str_key(&mut self, key: &str, value: &Object<'_>) -> Result<(), EncodeError> {
        self.write_str(key)?;
        self.buf.extend_from_slice(value.raw());
        self.written = self.written.saturating_add(1);
        Ok(())
    }

    /// Append an entry with string key and string value.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if either string cannot be encoded.
    pub fn push_str(&mut self, key: &str, value: &str) -> Result<(), EncodeError> {
        self.write_str(key)?;
        self.write_str(value)?;
        self.written = self.written.saturating_add(1);
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> Result<(), EncodeError> {
        if u32::try_from(s.len()).is_err() {
            return Err(EncodeError::TooLarge {
                what: "string",
                len: s.len(),
            });
        }
        rmp::encode::write_str(&mut self.buf, s).map_err(|e| EncodeError::Write(e.to_string()))
    }

    /// Finish the map and return its encoding.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::SizeMismatch`] if the number of appended entries
    /// differs from the declared size.
    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        if self.written != self.declared {
            return Err(EncodeError::SizeMismatch {
                declared: self.declared,
                written: self.written,
            });
        }
        Ok(self.buf)
    }
}

/// Convert a JSON document into its encoded form, keeping key order.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if `json` is not a valid document.
pub fn pack_json(json: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let value: Value = serde_json::from_slice(json).map_err(|e| DecodeError::Json {
        reason: e.to_string(),
    })?;
    rmp_serde::to_vec(&value).map_err(|e| DecodeError::Json {
        reason: e.to_string(),
    })
}

/// Convert an encoded object into JSON for display.
///
/// Non-string map keys are rendered as their JSON text. Opaque payloads with no
/// JSON counterpart (binary, extension types) become `null`.
///
/// # Errors
///
/// Returns [`DecodeError`] if `buf` is not validly encoded.
pub fn to_json(buf: &[u8]) -> Result<Value, DecodeError> {
    Ok(object_to_json(&decode(buf)?))
}

fn object_to_json(object: &Object<'_>) -> Value {
    match object {
        Object::Map(map) => Value::Object(
            map.entries()
                .iter()
                .map(|(k, v)| {
                    let key = match k {
                        Object::Str(s) => String::from_utf8_lossy(s.bytes()).into_owned(),
                        other => object_to_json(other).to_string(),
                    };
                    (key, object_to_json(v))
                })
                .collect(),
        ),
        Object::Array(array) => Value::Array(array.items().iter().map(object_to_json).collect()),
        Object::Str(s) => Value::String(String::from_utf8_lossy(s.bytes()).into_owned()),
        Object::Opaque(raw) => rmp_serde::from_slice(raw).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod codec_tests;
