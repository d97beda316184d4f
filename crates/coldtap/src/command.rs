//! Command abstraction shared by every card operation

use async_trait::async_trait;
use coldtap_apdu_core::{CommandApdu, ResponseApdu, TlvBuilder, TlvTag};

use crate::constants::LEGACY_MODE_NFC_PING;
use crate::delegate::SessionDelegate;
use crate::engine;
use crate::environment::SessionEnvironment;
use crate::reader::Reader;
use crate::session::CardSession;
use crate::types::Card;
use crate::{Error, Result};

/// Whether a session reads the card before running a command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PreflightReadMode {
    /// Skip the read. The command runs without a card snapshot.
    None,
    /// Read the card and verify its identity first
    #[default]
    ReadCardOnly,
}

/// A single card instruction.
///
/// Implementors describe how to lay the command out and how to read the answer.
/// The engine owns sending, retries and error handling.
pub trait Command: Send + Sync {
    /// Typed result of a successful exchange
    type Response: Send;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Whether a card snapshot must exist before the command is sent
    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::ReadCardOnly
    }

    /// Whether the command carries the passcode
    fn requires_passcode(&self) -> bool {
        false
    }

    /// Reject the command against the current card state before anything is sent
    fn pre_check(&self, _card: &Card) -> Result<()> {
        Ok(())
    }

    /// Refine an error reported by the card using the current card state
    fn after_check(&self, _card: Option<&Card>, error: Error) -> Error {
        error
    }

    /// Build the command apdu
    fn serialize(&self, env: &SessionEnvironment) -> Result<CommandApdu>;

    /// Read the typed response from a decrypted success apdu
    fn deserialize(&self, env: &SessionEnvironment, apdu: &ResponseApdu) -> Result<Self::Response>;

    /// Update the environment after success
    fn on_success(&self, _env: &mut SessionEnvironment, _response: &Self::Response) {}
}

/// Something a [`CardSession`] can run between `start` and `stop`
#[async_trait]
pub trait CardSessionRunnable: Send + Sync {
    /// Result of the run
    type Response: Send;

    /// Preflight read performed by `start`
    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::ReadCardOnly
    }

    /// Run against an active session
    async fn run<R: Reader, D: SessionDelegate>(
        &self,
        session: &CardSession<R, D>,
    ) -> Result<Self::Response>;
}

#[async_trait]
impl<C: Command> CardSessionRunnable for C {
    type Response = C::Response;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        Command::preflight_read_mode(self)
    }

    async fn run<R: Reader, D: SessionDelegate>(
        &self,
        session: &CardSession<R, D>,
    ) -> Result<Self::Response> {
        engine::transceive(self, session).await
    }
}

/// Start a payload with the access code and, in legacy mode, the NFC ping flag
pub(crate) fn base_payload(env: &SessionEnvironment) -> Result<TlvBuilder> {
    let access_code = env.access_code.value().ok_or(Error::AccessCodeRequired)?;

    let mut builder = TlvBuilder::new();
    builder.append(TlvTag::Pin, &access_code[..])?;
    if env.legacy_mode {
        builder.append(TlvTag::LegacyMode, &LEGACY_MODE_NFC_PING)?;
    }
    Ok(builder)
}

/// Append the passcode, failing when it is unknown
pub(crate) fn append_passcode(builder: &mut TlvBuilder, env: &SessionEnvironment) -> Result<()> {
    let passcode = env.passcode.value().ok_or(Error::PasscodeRequired)?;
    builder.append(TlvTag::Pin2, &passcode[..])?;
    Ok(())
}

/// The card snapshot a command depends on
pub(crate) fn require_card(env: &SessionEnvironment) -> Result<&Card> {
    env.card.as_ref().ok_or(Error::MissingPreflightRead)
}
