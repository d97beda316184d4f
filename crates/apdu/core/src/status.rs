//! Status words returned by the card

use std::fmt;

macro_rules! status_words {
    ($( $(#[$doc:meta])* $name:ident = $sw:literal ),* $(,)?) => {
        /// Decoded status word
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusWord {
            $( $(#[$doc])* $name, )*
            /// Any status word not registered above
            Unknown(u16),
        }

        impl StatusWord {
            /// Decode a raw status word
            pub const fn from_u16(sw: u16) -> Self {
                match sw {
                    $( $sw => Self::$name, )*
                    other => Self::Unknown(other),
                }
            }

            /// Raw status word
            pub const fn to_u16(self) -> u16 {
                match self {
                    $( Self::$name => $sw, )*
                    Self::Unknown(sw) => sw,
                }
            }
        }
    };
}

status_words! {
    /// Command completed
    ProcessCompleted = 0x9000,
    /// Completed, access code changed
    Pin1Changed = 0x9001,
    /// Completed, passcode changed
    Pin2Changed = 0x9002,
    /// Completed, access code and passcode changed
    Pins12Changed = 0x9003,
    /// Completed, PIN3 changed
    Pin3Changed = 0x9004,
    /// Completed, access code and PIN3 changed
    Pins13Changed = 0x9005,
    /// Completed, passcode and PIN3 changed
    Pins23Changed = 0x9006,
    /// Completed, all codes changed
    Pins123Changed = 0x9007,
    /// Invalid parameters, usually a wrong access code or passcode
    InvalidParams = 0x6A86,
    /// Internal error while processing the command
    ErrorProcessingCommand = 0x6286,
    /// Command not allowed in the current card state
    InvalidState = 0x6985,
    /// Instruction not supported
    InsNotSupported = 0x6D00,
    /// The card requires an encrypted channel
    NeedEncryption = 0x6982,
    /// Security delay in progress
    NeedPause = 0x9789,
    /// File not found
    FileNotFound = 0x6A82,
    /// Wallet not found
    WalletNotFound = 0x6A88,
    /// Wrong access code
    InvalidAccessCode = 0x6AF1,
    /// Wrong passcode
    InvalidPasscode = 0x6AF2,
    /// Wallet already created
    WalletAlreadyCreated = 0x6A89,
}

impl StatusWord {
    /// Decode from the two trailing response bytes
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self::from_u16(u16::from_be_bytes([sw1, sw2]))
    }

    /// Whether the command completed, with or without a code change
    pub const fn is_success(self) -> bool {
        matches!(
            self,
            Self::ProcessCompleted
                | Self::Pin1Changed
                | Self::Pin2Changed
                | Self::Pins12Changed
                | Self::Pin3Changed
                | Self::Pins13Changed
                | Self::Pins23Changed
                | Self::Pins123Changed
        )
    }
}

impl From<u16> for StatusWord {
    fn from(sw: u16) -> Self {
        Self::from_u16(sw)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(sw) => write!(f, "Unknown({sw:04X})"),
            known => write!(f, "{known:?}({:04X})", known.to_u16()),
        }
    }
}
