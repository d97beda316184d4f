//! Tag registry
//!
//! Every tag the card speaks is registered here together with the kind of value
//! it carries. The kind decides how the encoder lays the value out and which
//! Rust types the decoder accepts for it.

use std::fmt;

/// Layout of the value stored under a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TlvValueKind {
    /// Raw bytes rendered as an upper-case hex string
    #[display("hex string")]
    HexString,
    /// NUL-terminated UTF-8 text
    #[display("utf-8 string")]
    Utf8String,
    /// Big-endian integer, four bytes on the wire
    #[display("integer")]
    Int,
    /// Big-endian integer, two bytes on the wire
    #[display("16-bit integer")]
    Uint16,
    /// A single byte
    #[display("byte")]
    Byte,
    /// Presence flag
    #[display("boolean")]
    Bool,
    /// Opaque bytes
    #[display("raw data")]
    Data,
    /// Curve name as UTF-8 text
    #[display("elliptic curve")]
    EllipticCurve,
    /// `year:u16 | month:u8 | day:u8`
    #[display("date")]
    DateTime,
    /// One-byte product bitmask
    #[display("product mask")]
    ProductMask,
    /// Two or four byte settings bitmask
    #[display("settings mask")]
    SettingsMask,
    /// One-byte card lifecycle status
    #[display("card status")]
    CardStatus,
    /// One-byte signing method bitmask
    #[display("signing method")]
    SigningMethod,
}

macro_rules! tlv_tags {
    ($( $(#[$doc:meta])* $name:ident = $byte:literal => $kind:ident ),* $(,)?) => {
        /// Tag of a TLV field
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TlvTag {
            $( $(#[$doc])* $name, )*
            /// Tag byte with no registered meaning, carried as raw data
            Unknown(u8),
        }

        impl TlvTag {
            /// Look up a tag by its wire byte
            pub const fn from_byte(byte: u8) -> Self {
                match byte {
                    $( $byte => Self::$name, )*
                    other => Self::Unknown(other),
                }
            }

            /// The wire byte of this tag
            pub const fn to_byte(self) -> u8 {
                match self {
                    $( Self::$name => $byte, )*
                    Self::Unknown(byte) => byte,
                }
            }

            /// The kind of value registered for this tag
            pub const fn kind(self) -> TlvValueKind {
                match self {
                    $( Self::$name => TlvValueKind::$kind, )*
                    Self::Unknown(_) => TlvValueKind::Data,
                }
            }

            /// Human readable tag name
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name), )*
                    Self::Unknown(_) => "Unknown",
                }
            }
        }
    };
}

tlv_tags! {
    /// Card identifier
    CardId = 0x01 => HexString,
    /// Card lifecycle status
    Status = 0x02 => CardStatus,
    /// Card public key
    CardPublicKey = 0x03 => Data,
    /// Card signature over a challenge
    CardSignature = 0x04 => Data,
    /// Elliptic curve of the wallet key
    CurveId = 0x05 => EllipticCurve,
    /// Hash algorithm identifier
    HashAlgId = 0x06 => Data,
    /// Allowed signing methods
    SigningMethod = 0x07 => SigningMethod,
    /// Maximum number of signatures for a legacy wallet
    MaxSignatures = 0x08 => Int,
    /// Security delay in units of ten milliseconds
    PauseBeforePin2 = 0x09 => Uint16,
    /// Card settings bitmask
    SettingsMask = 0x0A => SettingsMask,
    /// Tag UID as reported by the card
    Uid = 0x0B => Data,
    /// Nested TLV block with personalization data
    CardData = 0x0C => Data,
    /// NDEF payload
    NdefData = 0x0D => Data,
    /// Wallet was created during personalization
    CreateWalletAtPersonalize = 0x0E => Bool,
    /// Card health indicator
    Health = 0x0F => Byte,
    /// Access code hash (PIN1)
    Pin = 0x10 => Data,
    /// Passcode hash (PIN2)
    Pin2 = 0x11 => Data,
    /// New access code hash
    NewPin = 0x12 => Data,
    /// New passcode hash
    NewPin2 = 0x13 => Data,
    /// Card verification code
    Cvc = 0x19 => Data,
    /// Host half of the session handshake
    SessionKeyA = 0x1A => Data,
    /// Card half of the session handshake
    SessionKeyB = 0x1B => Data,
    /// Remaining security delay in milliseconds
    Pause = 0x1C => Int,
    /// Manufacturer name
    ManufacturerName = 0x20 => Utf8String,
    /// Manufacturer signature
    ManufacturerSignature = 0x21 => Data,
    /// File and issuer data interaction mode
    InteractionMode = 0x23 => Byte,
    /// Data offset
    Offset = 0x24 => Uint16,
    /// Data size
    Size = 0x25 => Uint16,
    /// File index
    FileIndex = 0x26 => Byte,
    /// Security delay state is persisted to flash
    Flash = 0x28 => Bool,
    /// Legacy NFC timeout mode
    LegacyMode = 0x29 => Byte,
    /// User data
    UserData = 0x2A => Data,
    /// User protected data
    UserProtectedData = 0x2B => Data,
    /// User counter
    UserCounter = 0x2C => Int,
    /// User protected counter
    UserProtectedCounter = 0x2D => Int,
    /// Issuer public key
    IssuerPublicKey = 0x30 => Data,
    /// Issuer data
    IssuerData = 0x32 => Data,
    /// Issuer data signature
    IssuerDataSignature = 0x33 => Data,
    /// Issuer data counter
    IssuerDataCounter = 0x35 => Int,
    /// Card awaits activation
    IsActivated = 0x3A => Bool,
    /// Hash to sign
    TransactionOutHash = 0x50 => Data,
    /// Size of each hash to sign
    TransactionOutHashSize = 0x51 => Byte,
    /// A terminal is linked to the card
    IsLinked = 0x58 => Bool,
    /// Passcode has its default value
    Pin2IsDefault = 0x59 => Bool,
    /// Linked terminal public key
    TerminalPublicKey = 0x5C => Data,
    /// Wallet public key
    WalletPublicKey = 0x60 => Data,
    /// Wallet signature
    WalletSignature = 0x61 => Data,
    /// Remaining signatures of a legacy wallet
    WalletRemainingSignatures = 0x62 => Int,
    /// Number of hashes signed by the wallet
    WalletSignedHashes = 0x63 => Int,
    /// Wallet slot index
    WalletIndex = 0x65 => Byte,
    /// Number of wallet slots
    WalletsCount = 0x66 => Byte,
    /// Firmware version string
    FirmwareVersion = 0x80 => Utf8String,
    /// Batch identifier
    BatchId = 0x81 => HexString,
    /// Manufacture date
    ManufactureDateTime = 0x82 => DateTime,
    /// Issuer name
    IssuerName = 0x83 => Utf8String,
    /// Blockchain name
    BlockchainName = 0x84 => Utf8String,
    /// Manufacturer public key
    ManufacturerPublicKey = 0x85 => Data,
    /// Manufacturer signature over the card id
    CardIdManufacturerSignature = 0x86 => Data,
    /// Product bitmask
    ProductMask = 0x8A => ProductMask,
    /// Token symbol
    TokenSymbol = 0xA0 => Utf8String,
    /// Token contract address
    TokenContractAddress = 0xA1 => Utf8String,
    /// Token decimals
    TokenDecimal = 0xA2 => Int,
}

impl TlvTag {
    /// Whether the value is a user secret that must stay out of logs
    pub const fn is_secret(self) -> bool {
        matches!(
            self,
            Self::Pin | Self::Pin2 | Self::NewPin | Self::NewPin2 | Self::Cvc
        )
    }
}

impl From<u8> for TlvTag {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl fmt::Display for TlvTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.to_byte())
    }
}
