use coldtap_apdu_core::StatusWord;

/// Result type for card operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad class of an [`Error`], taken from the leading digit of its code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    /// Reported by the reader or the session lifecycle. Never retried.
    Transport,
    /// Malformed TLV or apdu, or a failed cryptographic step. Fatal to the command.
    Framing,
    /// The card answered with a status the command cannot continue from.
    /// The session stays usable.
    Protocol,
    /// A business rule rejected the current card state.
    Precondition,
    /// Driver misuse or user interaction outcome.
    Driver,
}

/// Error type for card operations
///
/// Every variant has a stable numeric [`code`](Self::code): 1xxxx transport,
/// 2xxxx serialization and crypto, 3xxxx card status, 4xxxx business rules,
/// 5xxxx driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    // Transport
    /// The tag left the field
    #[error("tag lost")]
    TagLost,

    /// The reader gave up waiting for the card
    #[error("reader timeout")]
    Timeout,

    /// Any other reader failure
    #[error("reader error: {0}")]
    ReaderError(String),

    /// The user dismissed the session
    #[error("user cancelled")]
    UserCancelled,

    // Serialization and crypto
    /// TLV or apdu codec failure
    #[error(transparent)]
    Codec(#[from] coldtap_apdu_core::Error),

    /// The response payload could not be parsed as TLV
    #[error("failed to deserialize response apdu")]
    DeserializeApduFailed,

    /// Payload encryption failed
    #[error("failed to encrypt apdu")]
    FailedToEncryptApdu,

    /// Payload decryption or integrity check failed
    #[error("failed to decrypt apdu")]
    FailedToDecryptApdu,

    /// The secure channel handshake could not complete
    #[error("failed to establish encryption")]
    FailedToEstablishEncryption,

    /// The card keeps asking for encryption after the strongest mode was negotiated
    #[error("crypto error: {0}")]
    CryptoUtilsError(String),

    // Card status
    /// Status word outside the registered set
    #[error("unknown status {0:04X}")]
    UnknownStatus(u16),

    /// The card failed internally
    #[error("error processing command")]
    ErrorProcessingCommand,

    /// Command not allowed in the current card state
    #[error("invalid card state")]
    InvalidState,

    /// Instruction not supported by the card
    #[error("instruction not supported")]
    InsNotSupported,

    /// The card rejected the command parameters
    #[error("invalid parameters")]
    InvalidParams,

    /// The card demands encryption outside the escalation loop
    #[error("card requires encryption")]
    NeedEncryption,

    /// File not found
    #[error("file not found")]
    FileNotFound,

    /// Wallet not found
    #[error("wallet not found")]
    WalletNotFound,

    /// The access code was refused
    #[error("wrong access code")]
    InvalidAccessCode,

    /// The passcode was refused
    #[error("wrong passcode")]
    InvalidPasscode,

    /// The card already holds a wallet at the requested slot
    #[error("wallet already created")]
    WalletAlreadyCreated,

    // Business rules
    /// The card was never personalized
    #[error("card is not personalized")]
    NotPersonalized,

    /// The card awaits activation
    #[error("card is not activated")]
    NotActivated,

    /// The wallet was purged and cannot be used
    #[error("wallet is purged")]
    WalletIsPurged,

    /// The command needs a passcode
    #[error("passcode required")]
    PasscodeRequired,

    /// The command needs an access code
    #[error("access code required")]
    AccessCodeRequired,

    /// A wallet exists already
    #[error("wallet already created")]
    AlreadyCreated,

    /// The requested curve is not supported by the card
    #[error("unsupported curve")]
    UnsupportedCurve,

    /// No free wallet slot is left
    #[error("maximum number of wallets created")]
    MaxNumberOfWalletsCreated,

    /// The card settings do not allow the requested wallet configuration
    #[error("unsupported wallet configuration")]
    UnsupportedWalletConfig,

    /// The card settings forbid purging
    #[error("purging the wallet is prohibited")]
    PurgeWalletProhibited,

    // Session
    /// Another session or send is in progress
    #[error("busy")]
    Busy,

    /// The session is not active
    #[error("session inactive")]
    SessionInactive,

    /// The command needs the card snapshot from the preflight read
    #[error("missing preflight read")]
    MissingPreflightRead,

    /// A different card than expected was tapped
    #[error("wrong card{}", .expected.as_deref().map(|id| format!(", expected {id}")).unwrap_or_default())]
    WrongCardNumber {
        /// Card id the session expected
        expected: Option<String>,
    },

    /// The tapped card is filtered out by the configuration
    #[error("wrong card type")]
    WrongCardType,
}

impl Error {
    /// Stable numeric code
    pub const fn code(&self) -> u32 {
        use coldtap_apdu_core::Error as Codec;

        match self {
            Self::TagLost => 10001,
            Self::Timeout => 10002,
            Self::ReaderError(_) => 10003,
            Self::SessionInactive => 10005,

            Self::DeserializeApduFailed => 20002,
            Self::Codec(Codec::EncodeTypeMismatch { .. }) => 20003,
            Self::Codec(Codec::EncodeEmpty(_) | Codec::EncodeFailed { .. }) => 20004,
            Self::Codec(Codec::MissingTag(_)) => 20005,
            Self::Codec(Codec::DecodeTypeMismatch { .. }) => 20006,
            Self::Codec(Codec::MalformedTlv) => 20007,
            Self::FailedToEncryptApdu => 20008,
            Self::FailedToDecryptApdu => 20009,
            Self::FailedToEstablishEncryption => 20010,
            Self::Codec(Codec::InvalidResponse(_)) => 20011,
            Self::CryptoUtilsError(_) => 20012,

            Self::UnknownStatus(_) => 30001,
            Self::ErrorProcessingCommand => 30002,
            Self::InvalidState => 30003,
            Self::InsNotSupported => 30004,
            Self::InvalidParams => 30005,
            Self::NeedEncryption => 30006,
            Self::FileNotFound => 30007,
            Self::WalletNotFound => 30008,
            Self::InvalidAccessCode => 30010,
            Self::InvalidPasscode => 30011,
            Self::WalletAlreadyCreated => 30012,

            Self::NotPersonalized => 40001,
            Self::NotActivated => 40002,
            Self::WalletIsPurged => 40003,
            Self::PasscodeRequired => 40004,
            Self::AccessCodeRequired => 40401,
            Self::AlreadyCreated => 40501,
            Self::UnsupportedCurve => 40502,
            Self::MaxNumberOfWalletsCreated => 40503,
            Self::UnsupportedWalletConfig => 40504,
            Self::PurgeWalletProhibited => 40601,

            Self::UserCancelled => 50002,
            Self::Busy => 50003,
            Self::MissingPreflightRead => 50004,
            Self::WrongCardNumber { .. } => 50005,
            Self::WrongCardType => 50006,
        }
    }

    /// Class of this error
    pub const fn family(&self) -> ErrorFamily {
        match self.code() / 10000 {
            1 => ErrorFamily::Transport,
            2 => ErrorFamily::Framing,
            3 => ErrorFamily::Protocol,
            4 => ErrorFamily::Precondition,
            _ => ErrorFamily::Driver,
        }
    }

    /// Whether the user dismissed the session
    pub const fn is_user_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    /// Map a failure status word to its error. Success and pause statuses map to `None`.
    pub const fn from_status(status: StatusWord) -> Option<Self> {
        let error = match status {
            StatusWord::ErrorProcessingCommand => Self::ErrorProcessingCommand,
            StatusWord::InvalidState => Self::InvalidState,
            StatusWord::InsNotSupported => Self::InsNotSupported,
            StatusWord::InvalidParams => Self::InvalidParams,
            StatusWord::NeedEncryption => Self::NeedEncryption,
            StatusWord::FileNotFound => Self::FileNotFound,
            StatusWord::WalletNotFound => Self::WalletNotFound,
            StatusWord::InvalidAccessCode => Self::InvalidAccessCode,
            StatusWord::InvalidPasscode => Self::InvalidPasscode,
            StatusWord::WalletAlreadyCreated => Self::WalletAlreadyCreated,
            StatusWord::Unknown(sw) => Self::UnknownStatus(sw),
            _ => return None,
        };
        Some(error)
    }
}
