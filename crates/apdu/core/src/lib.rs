//! Wire codec for contactless security tokens
//!
//! This crate holds the byte-exact formats exchanged with the card:
//!
//! - [`tlv`]: the tag-length-value payload codec, with a registry mapping every
//!   tag to the kind of value it carries
//! - [`CommandApdu`] and [`ResponseApdu`]: the outer command and response
//!   envelopes
//! - [`StatusWord`]: the closed set of status words the card reports
//! - [`types`]: typed values stored inside TLV fields
//!
//! Everything here is synchronous and free of I/O. Encryption and the
//! command protocol live one layer up.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod error;
pub mod response;
pub mod status;
pub mod tlv;
pub mod types;

pub use command::CommandApdu;
pub use error::{Error, Result};
pub use response::ResponseApdu;
pub use status::StatusWord;
pub use tlv::{Tlv, TlvBuilder, TlvDecoder, TlvList, TlvTag, TlvValueKind};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::tlv::{TlvDecode, TlvEncode};
    pub use crate::types::{
        CardStatus, EllipticCurve, ManufactureDate, ProductMask, SettingsMask, SigningMethod,
    };
    pub use crate::{
        Bytes, BytesMut, CommandApdu, Error, ResponseApdu, StatusWord, Tlv, TlvBuilder,
        TlvDecoder, TlvList, TlvTag, TlvValueKind,
    };
}
