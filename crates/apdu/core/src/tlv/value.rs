//! Conversions between Rust values and TLV value bytes

use bytes::Bytes;

use super::{TlvTag, TlvValueKind};
use crate::error::{Error, Result};
use crate::types::{
    CardStatus, EllipticCurve, ManufactureDate, ProductMask, SettingsMask, SigningMethod,
};

/// A value that can be written under a tag
pub trait TlvEncode {
    /// Whether this type may be stored under a tag of `kind`
    fn accepts(kind: TlvValueKind) -> bool;

    /// Lay the value out for `tag`. Called only when `accepts(tag.kind())` holds.
    fn encode_value(&self, tag: TlvTag) -> Result<Vec<u8>>;
}

/// A value that can be read from under a tag
pub trait TlvDecode: Sized {
    /// Whether this type may be read from a tag of `kind`
    fn accepts(kind: TlvValueKind) -> bool;

    /// Read the value. Called only when `accepts(tag.kind())` holds.
    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self>;

    /// Value to use when the tag is absent, if absence is meaningful
    fn absent() -> Option<Self> {
        None
    }
}

fn be_uint(tag: TlvTag, bytes: &[u8], width: usize) -> Result<u64> {
    if bytes.is_empty() || bytes.len() > width {
        return Err(Error::mismatch(
            tag,
            format!("expected 1..={width} bytes, got {}", bytes.len()),
        ));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn utf8(tag: TlvTag, bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8(bytes[..end].to_vec()).map_err(|_| Error::mismatch(tag, "invalid utf-8"))
}

fn nul_terminated(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 1);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

impl TlvEncode for str {
    fn accepts(kind: TlvValueKind) -> bool {
        matches!(kind, TlvValueKind::HexString | TlvValueKind::Utf8String)
    }

    fn encode_value(&self, tag: TlvTag) -> Result<Vec<u8>> {
        match tag.kind() {
            TlvValueKind::HexString => hex::decode(self).map_err(|_| Error::EncodeFailed {
                tag,
                reason: "invalid hex string",
            }),
            _ => Ok(nul_terminated(self)),
        }
    }
}

impl TlvEncode for String {
    fn accepts(kind: TlvValueKind) -> bool {
        <str as TlvEncode>::accepts(kind)
    }

    fn encode_value(&self, tag: TlvTag) -> Result<Vec<u8>> {
        self.as_str().encode_value(tag)
    }
}

impl TlvDecode for String {
    fn accepts(kind: TlvValueKind) -> bool {
        matches!(kind, TlvValueKind::HexString | TlvValueKind::Utf8String)
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        match tag.kind() {
            TlvValueKind::HexString => Ok(hex::encode_upper(bytes)),
            _ => utf8(tag, bytes),
        }
    }
}

impl TlvEncode for u32 {
    fn accepts(kind: TlvValueKind) -> bool {
        matches!(
            kind,
            TlvValueKind::Int | TlvValueKind::Uint16 | TlvValueKind::Byte
        )
    }

    fn encode_value(&self, tag: TlvTag) -> Result<Vec<u8>> {
        let out_of_range = Error::EncodeFailed {
            tag,
            reason: "value out of range",
        };
        match tag.kind() {
            TlvValueKind::Uint16 => u16::try_from(*self)
                .map(|v| v.to_be_bytes().to_vec())
                .map_err(|_| out_of_range),
            TlvValueKind::Byte => u8::try_from(*self)
                .map(|v| vec![v])
                .map_err(|_| out_of_range),
            _ => Ok(self.to_be_bytes().to_vec()),
        }
    }
}

impl TlvDecode for u32 {
    fn accepts(kind: TlvValueKind) -> bool {
        <Self as TlvEncode>::accepts(kind)
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        be_uint(tag, bytes, 4).map(|v| v as Self)
    }
}

impl TlvEncode for u16 {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Uint16
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(self.to_be_bytes().to_vec())
    }
}

impl TlvDecode for u16 {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Uint16
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        be_uint(tag, bytes, 2).map(|v| v as Self)
    }
}

impl TlvEncode for u8 {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Byte
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(vec![*self])
    }
}

impl TlvDecode for u8 {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Byte
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        be_uint(tag, bytes, 1).map(|v| v as Self)
    }
}

impl TlvEncode for bool {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Bool
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(vec![u8::from(*self)])
    }
}

impl TlvDecode for bool {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Bool
    }

    // Presence means set, unless the card wrote an explicit zero byte.
    fn decode_value(_tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        Ok(bytes != [0x00])
    }

    fn absent() -> Option<Self> {
        Some(false)
    }
}

impl TlvEncode for [u8] {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Data
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl TlvEncode for Vec<u8> {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Data
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(self.clone())
    }
}

impl TlvEncode for Bytes {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Data
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl TlvDecode for Vec<u8> {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Data
    }

    fn decode_value(_tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl TlvDecode for Bytes {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::Data
    }

    fn decode_value(_tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        Ok(Self::copy_from_slice(bytes))
    }
}

impl TlvEncode for EllipticCurve {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::EllipticCurve
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(nul_terminated(self.as_str()))
    }
}

impl TlvDecode for EllipticCurve {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::EllipticCurve
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        utf8(tag, bytes)?
            .parse()
            .map_err(|reason: String| Error::mismatch(tag, reason))
    }
}

impl TlvEncode for ManufactureDate {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::DateTime
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(self.to_bytes().to_vec())
    }
}

impl TlvDecode for ManufactureDate {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::DateTime
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 4] = bytes
            .try_into()
            .map_err(|_| Error::mismatch(tag, format!("expected 4 bytes, got {}", bytes.len())))?;
        Self::from_bytes(raw).ok_or_else(|| Error::mismatch(tag, "invalid date"))
    }
}

impl TlvEncode for ProductMask {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::ProductMask
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(vec![self.bits()])
    }
}

impl TlvDecode for ProductMask {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::ProductMask
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        be_uint(tag, bytes, 1).map(|v| Self::from_bits_retain(v as u8))
    }
}

impl TlvEncode for SettingsMask {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::SettingsMask
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        let raw = self.bits();
        if raw & 0xFFFF_0000 != 0 {
            Ok(raw.to_be_bytes().to_vec())
        } else {
            Ok((raw as u16).to_be_bytes().to_vec())
        }
    }
}

impl TlvDecode for SettingsMask {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::SettingsMask
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        be_uint(tag, bytes, 4).map(|v| Self::from_bits_retain(v as u32))
    }
}

impl TlvEncode for CardStatus {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::CardStatus
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(vec![*self as u8])
    }
}

impl TlvDecode for CardStatus {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::CardStatus
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        let raw = be_uint(tag, bytes, 4)?;
        u8::try_from(raw)
            .ok()
            .and_then(|b| Self::try_from(b).ok())
            .ok_or_else(|| Error::mismatch(tag, format!("unknown card status {raw}")))
    }
}

impl TlvEncode for SigningMethod {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::SigningMethod
    }

    fn encode_value(&self, _tag: TlvTag) -> Result<Vec<u8>> {
        Ok(vec![self.bits()])
    }
}

impl TlvDecode for SigningMethod {
    fn accepts(kind: TlvValueKind) -> bool {
        kind == TlvValueKind::SigningMethod
    }

    fn decode_value(tag: TlvTag, bytes: &[u8]) -> Result<Self> {
        be_uint(tag, bytes, 1).map(|v| Self::from_wire(v as u8))
    }
}
