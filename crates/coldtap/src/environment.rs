//! Mutable state threaded through every command of a session

use std::fmt;

use bytes::Bytes;
use k256::{SecretKey, elliptic_curve::sec1::ToEncodedPoint};
use zeroize::{Zeroize, Zeroizing};

use crate::config::Config;
use crate::constants::{DEFAULT_ACCESS_CODE, DEFAULT_PASSCODE};
use crate::crypto::sha256;
use crate::secure_channel::{EncryptionMode, SessionKey};
use crate::types::Card;

/// Which user secret a code stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum UserCodeKind {
    /// PIN1, needed for every command
    #[display("access code")]
    AccessCode,
    /// PIN2, needed for wallet operations
    #[display("passcode")]
    Passcode,
}

impl UserCodeKind {
    /// Value the card ships with
    pub const fn default_value(self) -> &'static str {
        match self {
            Self::AccessCode => DEFAULT_ACCESS_CODE,
            Self::Passcode => DEFAULT_PASSCODE,
        }
    }
}

/// A user secret, held as the SHA-256 of what the user typed
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct UserCode {
    #[zeroize(skip)]
    kind: UserCodeKind,
    value: Option<[u8; 32]>,
}

impl UserCode {
    /// Hash `code` into a user code of `kind`
    pub fn new(kind: UserCodeKind, code: &str) -> Self {
        Self {
            kind,
            value: Some(sha256(code.as_bytes())),
        }
    }

    /// The factory value for `kind`
    pub fn default_for(kind: UserCodeKind) -> Self {
        Self::new(kind, kind.default_value())
    }

    /// A code that still has to be asked for
    pub const fn unset(kind: UserCodeKind) -> Self {
        Self { kind, value: None }
    }

    /// Kind of this code
    pub const fn kind(&self) -> UserCodeKind {
        self.kind
    }

    /// Hashed value, if known
    pub const fn value(&self) -> Option<&[u8; 32]> {
        self.value.as_ref()
    }

    /// Whether the code equals the factory value
    pub fn is_default(&self) -> bool {
        self.value == Some(sha256(self.kind.default_value().as_bytes()))
    }
}

impl fmt::Debug for UserCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCode")
            .field("kind", &self.kind)
            .field("set", &self.value.is_some())
            .finish()
    }
}

/// Key pair identifying this terminal to cards it links with
#[derive(Clone)]
pub struct TerminalKeys {
    /// Uncompressed secp256k1 public key
    pub public_key: Bytes,
    private_key: Zeroizing<Vec<u8>>,
}

impl TerminalKeys {
    /// Generate a fresh key pair
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut rand_v8::thread_rng());
        Self {
            public_key: Bytes::copy_from_slice(secret.public_key().to_encoded_point(false).as_bytes()),
            private_key: Zeroizing::new(secret.to_bytes().to_vec()),
        }
    }

    /// Private key bytes
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for TerminalKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalKeys")
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Per-session state read and written by commands.
///
/// The encryption key only lives as long as the tag stays in the field: it is
/// cleared on every tag loss and on every encryption mode change.
#[derive(Debug, Clone)]
pub struct SessionEnvironment {
    /// Card snapshot from the last read
    pub card: Option<Card>,
    /// Access code (PIN1)
    pub access_code: UserCode,
    /// Passcode (PIN2)
    pub passcode: UserCode,
    /// Card verification code
    pub cvc: Option<Bytes>,
    /// Terminal key pair for linked terminals
    pub terminal_keys: Option<TerminalKeys>,
    /// Negotiated encryption mode
    pub encryption_mode: EncryptionMode,
    /// Session key, present once a channel is established
    pub encryption_key: Option<SessionKey>,
    /// Append the legacy-mode TLV to commands
    pub legacy_mode: bool,
    /// Session configuration
    pub config: Config,
}

impl SessionEnvironment {
    /// Fresh environment with factory user codes
    pub fn new(config: Config) -> Self {
        Self {
            card: None,
            access_code: UserCode::default_for(UserCodeKind::AccessCode),
            passcode: UserCode::default_for(UserCodeKind::Passcode),
            cvc: None,
            terminal_keys: None,
            encryption_mode: config.default_encryption_mode,
            encryption_key: None,
            legacy_mode: config.legacy_mode,
            config,
        }
    }

    /// User code of `kind`
    pub const fn user_code(&self, kind: UserCodeKind) -> &UserCode {
        match kind {
            UserCodeKind::AccessCode => &self.access_code,
            UserCodeKind::Passcode => &self.passcode,
        }
    }

    /// Replace the user code of its kind.
    ///
    /// The session key is derived from the access code, so replacing it drops the key.
    pub fn set_user_code(&mut self, code: UserCode) {
        match code.kind() {
            UserCodeKind::AccessCode => {
                self.access_code = code;
                self.encryption_key = None;
            }
            UserCodeKind::Passcode => self.passcode = code,
        }
    }

    /// Whether a non-default code of `kind` is known
    pub fn is_user_code_set(&self, kind: UserCodeKind) -> bool {
        let code = self.user_code(kind);
        code.value().is_some() && !code.is_default()
    }

    /// Switch encryption mode, dropping any key negotiated for the old one
    pub fn set_encryption_mode(&mut self, mode: EncryptionMode) {
        self.encryption_mode = mode;
        self.encryption_key = None;
    }
}

impl Default for SessionEnvironment {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
