//! Host driver for contactless security tokens
//!
//! The crate runs card commands over a proximity [`Reader`]: it opens a
//! [`CardSession`], reads and verifies the card, negotiates the secure channel
//! when the card asks for one and drives every command through security delays
//! and user code prompts. The wire codec lives in `coldtap-apdu-core`.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod command;
mod commands;
mod config;
mod constants;
mod crypto;
mod delegate;
mod engine;
mod environment;
mod error;
mod reader;
mod secure_channel;
mod session;
mod types;

pub use command::{CardSessionRunnable, Command, PreflightReadMode};
pub use commands::*;
pub use config::{Config, DEFAULT_WRONG_CARD_RETRY_DELAY};
pub use constants::*;
pub use delegate::SessionDelegate;
pub use environment::{SessionEnvironment, TerminalKeys, UserCode, UserCodeKind};
pub use error::{Error, ErrorFamily, Result};
pub use reader::{Reader, TagEvent};
pub use secure_channel::{
    EncryptionHelper, EncryptionMode, SessionKey, decrypt_response, encrypt_command,
};
pub use session::CardSession;
pub use types::{
    Card, CardFilter, CardSettings, FirmwareType, FirmwareVersion, Issuer, ItemFilter,
    Manufacturer, Wallet,
};

pub use coldtap_apdu_core as apdu;
