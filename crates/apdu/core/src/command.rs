//! Command apdu envelope
//!
//! Layout on the wire:
//!
//! ```text
//! CLA | INS | P1 | P2 | [00 | LEN_HI | LEN_LO | PAYLOAD] | [LE_HI | LE_LO]
//! ```
//!
//! The length block is only present for a non-empty payload. `LE` is clamped to
//! `0..=0xFFFF`.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::tlv::Tlv;

/// Largest expected length that fits the two-byte `LE` field
pub const MAX_EXPECTED_LENGTH: u32 = 0xFFFF;

/// A command apdu. Immutable once built; retries resend the same value.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandApdu {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    le: Option<u32>,
    payload: Bytes,
}

impl CommandApdu {
    /// Create a command with the given instruction and raw payload, class `0x00`
    /// and zero parameters
    pub fn new(ins: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            cla: 0x00,
            ins,
            p1: 0x00,
            p2: 0x00,
            le: None,
            payload: payload.into(),
        }
    }

    /// Create a command carrying a serialized TLV sequence
    pub fn with_tlv(ins: u8, tlvs: &[Tlv]) -> Self {
        Self::new(ins, Tlv::serialize_all(tlvs))
    }

    /// Create a command from every header byte
    pub fn from_parts(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        le: Option<u32>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            le,
            payload: payload.into(),
        }
    }

    /// Set the class byte
    pub const fn with_cla(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    /// Set the first parameter
    pub const fn with_p1(mut self, p1: u8) -> Self {
        self.p1 = p1;
        self
    }

    /// Set the second parameter
    pub const fn with_p2(mut self, p2: u8) -> Self {
        self.p2 = p2;
        self
    }

    /// Set the expected response length
    pub const fn with_le(mut self, le: u32) -> Self {
        self.le = Some(le);
        self
    }

    /// Replace the payload, keeping the header
    pub fn with_payload(&self, payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..self.clone()
        }
    }

    /// Class byte
    pub const fn cla(&self) -> u8 {
        self.cla
    }

    /// Instruction byte
    pub const fn ins(&self) -> u8 {
        self.ins
    }

    /// First parameter
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Expected response length
    pub const fn le(&self) -> Option<u32> {
        self.le
    }

    /// Payload bytes
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Length of the serialized command
    pub fn command_length(&self) -> usize {
        let mut length = 4;
        if !self.payload.is_empty() {
            length += 3 + self.payload.len();
        }
        if self.le.is_some() {
            length += 2;
        }
        length
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if !self.payload.is_empty() {
            buffer.put_u8(0x00);
            buffer.put_u16(self.payload.len() as u16);
            buffer.put_slice(&self.payload);
        }

        if let Some(le) = self.le {
            buffer.put_u16(le.min(MAX_EXPECTED_LENGTH) as u16);
        }

        buffer.freeze()
    }
}

impl fmt::Debug for CommandApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandApdu")
            .field("cla", &format_args!("{:02X}", self.cla))
            .field("ins", &format_args!("{:02X}", self.ins))
            .field("p1", &format_args!("{:02X}", self.p1))
            .field("p2", &format_args!("{:02X}", self.p2))
            .field("le", &self.le)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
