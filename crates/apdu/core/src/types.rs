//! Typed values carried inside TLV fields

use std::fmt;
use std::str::FromStr;

/// Card lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[repr(u8)]
pub enum CardStatus {
    /// Card left the factory without personalization
    #[display("not personalized")]
    NotPersonalized = 0x00,
    /// No wallet has been created
    #[display("empty")]
    Empty = 0x01,
    /// A wallet is present
    #[display("loaded")]
    Loaded = 0x02,
    /// The wallet was purged and cannot be recreated
    #[display("purged")]
    Purged = 0x03,
}

impl TryFrom<u8> for CardStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::NotPersonalized),
            0x01 => Ok(Self::Empty),
            0x02 => Ok(Self::Loaded),
            0x03 => Ok(Self::Purged),
            other => Err(other),
        }
    }
}

/// Elliptic curve of a wallet key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EllipticCurve {
    /// secp256k1
    Secp256k1,
    /// Ed25519
    Ed25519,
    /// NIST P-256
    Secp256r1,
}

impl EllipticCurve {
    /// All curves understood by the driver
    pub const ALL: [Self; 3] = [Self::Secp256k1, Self::Ed25519, Self::Secp256r1];

    /// Wire name of the curve
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Secp256k1 => "secp256k1",
            Self::Ed25519 => "ed25519",
            Self::Secp256r1 => "secp256r1",
        }
    }
}

impl fmt::Display for EllipticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EllipticCurve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|curve| curve.as_str() == s)
            .ok_or_else(|| format!("unknown curve {s:?}"))
    }
}

/// Calendar date stored as `year:u16 BE | month:u8 | day:u8`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManufactureDate {
    /// Year
    pub year: u16,
    /// Month, 1 to 12
    pub month: u8,
    /// Day of month, 1 to 31
    pub day: u8,
}

impl ManufactureDate {
    /// Create a date, rejecting out-of-range month or day
    pub const fn new(year: u16, month: u8, day: u8) -> Option<Self> {
        if month == 0 || month > 12 || day == 0 || day > 31 {
            return None;
        }
        Some(Self { year, month, day })
    }

    /// Wire representation
    pub const fn to_bytes(&self) -> [u8; 4] {
        let [hi, lo] = self.year.to_be_bytes();
        [hi, lo, self.month, self.day]
    }

    /// Parse the wire representation
    pub const fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        Self::new(u16::from_be_bytes([bytes[0], bytes[1]]), bytes[2], bytes[3])
    }
}

impl fmt::Display for ManufactureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

bitflags::bitflags! {
    /// Product capabilities of the card
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProductMask: u8 {
        /// Banknote
        const NOTE = 0x01;
        /// Tag
        const TAG = 0x02;
        /// Identity card
        const ID_CARD = 0x04;
        /// Identity issuer card
        const ID_ISSUER = 0x08;
        /// Authentication card
        const AUTHENTICATION = 0x10;
        /// One of a twin pair
        const TWIN_CARD = 0x20;
    }
}

bitflags::bitflags! {
    /// Card settings fixed at personalization
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SettingsMask: u32 {
        /// Wallet can be recreated after purge
        const IS_REUSABLE = 0x0000_0001;
        /// Card needs activation before use
        const USE_ACTIVATION = 0x0000_0002;
        /// Wallet cannot be purged
        const PROHIBIT_PURGE_WALLET = 0x0000_0004;
        /// Card supports blocking
        const USE_BLOCK = 0x0000_0008;
        /// Access code may be changed
        const ALLOW_SET_PIN1 = 0x0000_0010;
        /// Passcode may be changed
        const ALLOW_SET_PIN2 = 0x0000_0020;
        /// CVC is required
        const USE_CVC = 0x0000_0040;
        /// Default access code is refused
        const PROHIBIT_DEFAULT_PIN1 = 0x0000_0080;
        /// One command per tag activation
        const USE_ONE_COMMAND_AT_TIME = 0x0000_0100;
        /// NDEF is enabled
        const USE_NDEF = 0x0000_0200;
        /// Dynamic NDEF is enabled
        const USE_DYNAMIC_NDEF = 0x0000_0400;
        /// Security delay shortens for repeated operations
        const SMART_SECURITY_DELAY = 0x0000_0800;
        /// Commands may be sent in clear
        const ALLOW_UNENCRYPTED = 0x0000_1000;
        /// Fast encryption is accepted
        const ALLOW_FAST_ENCRYPTION = 0x0000_2000;
        /// Issuer data carries a replay counter
        const PROTECT_ISSUER_DATA_AGAINST_REPLAY = 0x0000_4000;
        /// Blockchain can be chosen at wallet creation
        const ALLOW_SELECT_BLOCKCHAIN = 0x0000_8000;
        /// Precomputed NDEF is disabled
        const DISABLE_PRECOMPUTED_NDEF = 0x0001_0000;
        /// Security delay is skipped when validated by a bank
        const SKIP_SECURITY_DELAY_IF_VALIDATED_BY_BANK = 0x0002_0000;
        /// Passcode check is skipped when validated by the issuer
        const SKIP_CHECK_PIN2_CVC_IF_VALIDATED_BY_ISSUER = 0x0004_0000;
        /// Security delay is skipped for a linked terminal
        const SKIP_SECURITY_DELAY_IF_VALIDATED_BY_LINKED_TERMINAL = 0x0008_0000;
        /// Issuer extra data cannot be overwritten
        const RESTRICT_OVERWRITE_ISSUER_EXTRA_DATA = 0x0010_0000;
        /// Terminal must sign transactions
        const REQUIRE_TERM_TX_SIGNATURE = 0x0100_0000;
        /// Terminal must present a certificate signature
        const REQUIRE_TERM_CERT_SIGNATURE = 0x0200_0000;
        /// PIN3 is checked on card
        const CHECK_PIN3_ON_CARD = 0x0400_0000;
    }
}

bitflags::bitflags! {
    /// Signing methods accepted by a wallet
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SigningMethod: u8 {
        /// Sign a hash
        const SIGN_HASH = 0x81;
        /// Sign raw data
        const SIGN_RAW = 0x82;
        /// Sign a hash signed by the issuer
        const SIGN_HASH_SIGNED_BY_ISSUER = 0x84;
        /// Sign raw data signed by the issuer
        const SIGN_RAW_SIGNED_BY_ISSUER = 0x88;
        /// Sign a hash signed by the issuer and update issuer data
        const SIGN_HASH_SIGNED_BY_ISSUER_AND_UPDATE_ISSUER_DATA = 0x90;
        /// Sign raw data signed by the issuer and update issuer data
        const SIGN_RAW_SIGNED_BY_ISSUER_AND_UPDATE_ISSUER_DATA = 0xA0;
        /// Point of sale signing
        const SIGN_POS = 0xC0;
    }
}

impl SigningMethod {
    /// Interpret the wire byte. A byte without the high bit is a method index.
    pub const fn from_wire(byte: u8) -> Self {
        if byte & 0x80 == 0 {
            Self::from_bits_retain(0x80 | (1u8 << (byte & 0x07)))
        } else {
            Self::from_bits_retain(byte)
        }
    }
}
