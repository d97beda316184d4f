//! Error types for the wire codec

use crate::tlv::{TlvTag, TlvValueKind};

/// Result type for codec operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while encoding or decoding TLV payloads and apdu envelopes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The value handed to the encoder does not match the tag's registered kind
    #[error("cannot encode {tag}: value is not a {expected}")]
    EncodeTypeMismatch {
        /// Tag being encoded
        tag: TlvTag,
        /// Kind registered for the tag
        expected: TlvValueKind,
    },

    /// A required value was absent
    #[error("cannot encode {0}: value is empty")]
    EncodeEmpty(TlvTag),

    /// A value could not be represented in the tag's wire layout
    #[error("cannot encode {tag}: {reason}")]
    EncodeFailed {
        /// Tag being encoded
        tag: TlvTag,
        /// What went wrong
        reason: &'static str,
    },

    /// The requested tag is absent from the payload
    #[error("missing tag {0}")]
    MissingTag(TlvTag),

    /// The tag is present but its bytes cannot be coerced to the requested type
    #[error("cannot decode {tag}: {reason}")]
    DecodeTypeMismatch {
        /// Tag being decoded
        tag: TlvTag,
        /// What went wrong
        reason: String,
    },

    /// The byte stream is not a well-formed TLV sequence
    #[error("malformed TLV stream")]
    MalformedTlv,

    /// The response buffer is shorter than a status word
    #[error("invalid response apdu: {0} bytes")]
    InvalidResponse(usize),
}

impl Error {
    pub(crate) fn mismatch(tag: TlvTag, reason: impl Into<String>) -> Self {
        Self::DecodeTypeMismatch {
            tag,
            reason: reason.into(),
        }
    }
}
