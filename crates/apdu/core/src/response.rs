//! Response apdu envelope

use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::status::StatusWord;
use crate::tlv::Tlv;

/// A response apdu: payload followed by the two status bytes
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    payload: Bytes,
    sw1: u8,
    sw2: u8,
}

impl ResponseApdu {
    /// Build a response from its parts
    pub fn new(payload: impl Into<Bytes>, sw1: u8, sw2: u8) -> Self {
        Self {
            payload: payload.into(),
            sw1,
            sw2,
        }
    }

    /// Build a response carrying `status`
    pub fn with_status(payload: impl Into<Bytes>, status: StatusWord) -> Self {
        let [sw1, sw2] = status.to_u16().to_be_bytes();
        Self::new(payload, sw1, sw2)
    }

    /// Split raw bytes into payload and the trailing status word
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(Error::InvalidResponse(raw.len()));
        }
        let (payload, sw) = raw.split_at(raw.len() - 2);
        Ok(Self::new(Bytes::copy_from_slice(payload), sw[0], sw[1]))
    }

    /// Raw status word
    pub const fn sw(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// First status byte
    pub const fn sw1(&self) -> u8 {
        self.sw1
    }

    /// Second status byte
    pub const fn sw2(&self) -> u8 {
        self.sw2
    }

    /// Decoded status word
    pub const fn status_word(&self) -> StatusWord {
        StatusWord::new(self.sw1, self.sw2)
    }

    /// Payload bytes
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Replace the payload, keeping the status word
    pub fn with_payload(&self, payload: impl Into<Bytes>) -> Self {
        Self::new(payload, self.sw1, self.sw2)
    }

    /// Decode the payload as TLV.
    ///
    /// Returns `None` for an empty or malformed payload. The payload must
    /// already be decrypted.
    pub fn tlv_data(&self) -> Option<Vec<Tlv>> {
        if self.payload.is_empty() {
            return None;
        }
        Tlv::parse_all(&self.payload)
    }

    /// Serialize back to wire bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut raw = Vec::with_capacity(self.payload.len() + 2);
        raw.extend_from_slice(&self.payload);
        raw.push(self.sw1);
        raw.push(self.sw2);
        raw.into()
    }
}

impl fmt::Debug for ResponseApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseApdu")
            .field("status", &self.status_word())
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
