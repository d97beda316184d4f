//! Tag-length-value payload codec
//!
//! Each field is `TAG | LEN | VALUE`. The length is a single byte when the value
//! is shorter than `0xFF` bytes; otherwise it is the marker `0xFF` followed by a
//! two-byte big-endian length. Fields are ordered and tags may repeat; lookups
//! return the first occurrence.

mod tag;
mod value;

pub use tag::{TlvTag, TlvValueKind};
pub use value::{TlvDecode, TlvEncode};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{Error, Result};

/// Marker byte announcing a two-byte length
const EXTENDED_LENGTH: u8 = 0xFF;

/// A single TLV field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    /// Field tag
    pub tag: TlvTag,
    /// Raw value bytes
    pub value: Bytes,
}

impl Tlv {
    /// Create a field from raw value bytes
    pub fn new(tag: TlvTag, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Encode a typed value under `tag`, checking it against the tag registry
    pub fn encode<T: TlvEncode + ?Sized>(tag: TlvTag, value: &T) -> Result<Self> {
        if !T::accepts(tag.kind()) {
            return Err(Error::EncodeTypeMismatch {
                tag,
                expected: tag.kind(),
            });
        }

        let bytes = value.encode_value(tag)?;
        if bytes.len() > usize::from(u16::MAX) {
            return Err(Error::EncodeFailed {
                tag,
                reason: "value longer than 65535 bytes",
            });
        }

        Ok(Self::new(tag, bytes))
    }

    /// Encode a value that must be present
    pub fn encode_required<T: TlvEncode + ?Sized>(tag: TlvTag, value: Option<&T>) -> Result<Self> {
        match value {
            Some(value) => Self::encode(tag, value),
            None => Err(Error::EncodeEmpty(tag)),
        }
    }

    /// Number of bytes this field occupies on the wire
    pub fn encoded_len(&self) -> usize {
        let header = if self.value.len() < usize::from(EXTENDED_LENGTH) {
            2
        } else {
            4
        };
        header + self.value.len()
    }

    /// Append the wire form of this field to `buf`
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag.to_byte());
        let len = self.value.len();
        if len < usize::from(EXTENDED_LENGTH) {
            buf.put_u8(len as u8);
        } else {
            buf.put_u8(EXTENDED_LENGTH);
            buf.put_u16(len as u16);
        }
        buf.put_slice(&self.value);
    }

    /// Wire form of this field
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Serialize a sequence of fields
    pub fn serialize_all(tlvs: &[Self]) -> Bytes {
        let mut buf = BytesMut::with_capacity(tlvs.iter().map(Self::encoded_len).sum());
        for tlv in tlvs {
            tlv.write_to(&mut buf);
        }
        buf.freeze()
    }

    /// Parse a byte stream into fields.
    ///
    /// An empty stream is an empty list. A truncated header or value yields `None`.
    pub fn parse_all(data: &[u8]) -> Option<Vec<Self>> {
        let mut tlvs = Vec::new();
        let mut rest = data;

        while let Some((&tag, tail)) = rest.split_first() {
            let (&first, tail) = tail.split_first()?;
            let (len, tail) = if first == EXTENDED_LENGTH {
                if tail.len() < 2 {
                    return None;
                }
                let (len, tail) = tail.split_at(2);
                (usize::from(u16::from_be_bytes([len[0], len[1]])), tail)
            } else {
                (usize::from(first), tail)
            };

            if tail.len() < len {
                return None;
            }
            let (value, tail) = tail.split_at(len);
            tlvs.push(Self::new(TlvTag::from_byte(tag), Bytes::copy_from_slice(value)));
            rest = tail;
        }

        Some(tlvs)
    }
}

/// Lookups over a TLV sequence
pub trait TlvList {
    /// First field carrying `tag`
    fn item(&self, tag: TlvTag) -> Option<&Tlv>;

    /// Value of the first field carrying `tag`
    fn value(&self, tag: TlvTag) -> Option<&Bytes> {
        self.item(tag).map(|tlv| &tlv.value)
    }

    /// Whether any field carries `tag`
    fn contains(&self, tag: TlvTag) -> bool {
        self.item(tag).is_some()
    }
}

impl TlvList for [Tlv] {
    fn item(&self, tag: TlvTag) -> Option<&Tlv> {
        self.iter().find(|tlv| tlv.tag == tag)
    }
}

/// Typed reads over a parsed TLV sequence
#[derive(Debug, Clone, Copy)]
pub struct TlvDecoder<'a> {
    tlvs: &'a [Tlv],
}

impl<'a> TlvDecoder<'a> {
    /// Decode over `tlvs`
    pub const fn new(tlvs: &'a [Tlv]) -> Self {
        Self { tlvs }
    }

    /// Underlying fields
    pub const fn tlvs(&self) -> &'a [Tlv] {
        self.tlvs
    }

    /// Decode the first field carrying `tag`.
    ///
    /// Absence is [`Error::MissingTag`], except for types with a meaningful
    /// absent value (booleans read as `false`).
    pub fn decode<T: TlvDecode>(&self, tag: TlvTag) -> Result<T> {
        self.decode_optional(tag)?.ok_or(Error::MissingTag(tag))
    }

    /// Decode the first field carrying `tag`, returning `None` when it is absent.
    ///
    /// A present but malformed field is still an error.
    pub fn decode_optional<T: TlvDecode>(&self, tag: TlvTag) -> Result<Option<T>> {
        if !T::accepts(tag.kind()) {
            return Err(Error::mismatch(
                tag,
                format!("requested type cannot hold a {}", tag.kind()),
            ));
        }

        match self.tlvs.item(tag) {
            Some(tlv) => {
                trace!(%tag, value = %hex::encode(&tlv.value), "decode");
                T::decode_value(tag, &tlv.value).map(Some)
            }
            None => Ok(T::absent()),
        }
    }

    /// Decode every field carrying `tag`, in order
    pub fn decode_all<T: TlvDecode>(&self, tag: TlvTag) -> Result<Vec<T>> {
        if !T::accepts(tag.kind()) {
            return Err(Error::mismatch(
                tag,
                format!("requested type cannot hold a {}", tag.kind()),
            ));
        }

        self.tlvs
            .iter()
            .filter(|tlv| tlv.tag == tag)
            .map(|tlv| T::decode_value(tag, &tlv.value))
            .collect()
    }

    /// Parse the nested TLV block stored under `tag`, if present and well formed
    pub fn nested(&self, tag: TlvTag) -> Option<Vec<Tlv>> {
        self.tlvs.value(tag).and_then(|value| Tlv::parse_all(value))
    }
}

/// Incrementally builds a command payload
#[derive(Debug, Clone, Default)]
pub struct TlvBuilder {
    tlvs: Vec<Tlv>,
}

impl TlvBuilder {
    /// Create an empty builder
    pub const fn new() -> Self {
        Self { tlvs: Vec::new() }
    }

    /// Append a typed value
    pub fn append<T: TlvEncode + ?Sized>(&mut self, tag: TlvTag, value: &T) -> Result<&mut Self> {
        let tlv = Tlv::encode(tag, value)?;
        if tag.is_secret() {
            trace!(%tag, len = tlv.value.len(), "encode");
        } else {
            trace!(%tag, value = %hex::encode(&tlv.value), "encode");
        }
        self.tlvs.push(tlv);
        Ok(self)
    }

    /// Append a value if present, skipping it otherwise
    pub fn append_optional<T: TlvEncode + ?Sized>(
        &mut self,
        tag: TlvTag,
        value: Option<&T>,
    ) -> Result<&mut Self> {
        match value {
            Some(value) => self.append(tag, value),
            None => Ok(self),
        }
    }

    /// Append a value that must be present
    pub fn append_required<T: TlvEncode + ?Sized>(
        &mut self,
        tag: TlvTag,
        value: Option<&T>,
    ) -> Result<&mut Self> {
        self.tlvs.push(Tlv::encode_required(tag, value)?);
        Ok(self)
    }

    /// Append an already built field
    pub fn append_tlv(&mut self, tlv: Tlv) -> &mut Self {
        self.tlvs.push(tlv);
        self
    }

    /// Fields appended so far
    pub fn tlvs(&self) -> &[Tlv] {
        &self.tlvs
    }

    /// Finish and return the fields
    pub fn build(self) -> Vec<Tlv> {
        self.tlvs
    }

    /// Serialize the fields appended so far
    pub fn serialize(&self) -> Bytes {
        Tlv::serialize_all(&self.tlvs)
    }
}
