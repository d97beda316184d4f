use coldtap_apdu_core::{CommandApdu, ResponseApdu, TlvTag};

use crate::command::{Command, PreflightReadMode, base_payload};
use crate::constants::ins;
use crate::environment::SessionEnvironment;
use crate::types::Card;
use crate::{Error, Result};

/// Read the card identity, settings and wallets.
///
/// This is the preflight read every session starts with. On success the card
/// snapshot is stored in the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadCommand;

impl ReadCommand {
    /// Create a read command
    pub const fn new() -> Self {
        Self
    }
}

impl Command for ReadCommand {
    type Response = Card;

    fn name(&self) -> &'static str {
        "read"
    }

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    // The card answers a wrong access code with invalid parameters.
    fn after_check(&self, _card: Option<&Card>, error: Error) -> Error {
        match error {
            Error::InvalidParams => Error::AccessCodeRequired,
            other => other,
        }
    }

    fn serialize(&self, env: &SessionEnvironment) -> Result<CommandApdu> {
        let mut builder = base_payload(env)?;
        if env.config.linked_terminal {
            let terminal_key = env.terminal_keys.as_ref().map(|keys| &keys.public_key);
            builder.append_optional(TlvTag::TerminalPublicKey, terminal_key)?;
        }
        Ok(CommandApdu::with_tlv(ins::READ, builder.tlvs()))
    }

    fn deserialize(&self, _env: &SessionEnvironment, apdu: &ResponseApdu) -> Result<Card> {
        let tlvs = apdu.tlv_data().ok_or(Error::DeserializeApduFailed)?;
        Card::deserialize(&tlvs)
    }

    fn on_success(&self, env: &mut SessionEnvironment, card: &Card) {
        env.card = Some(card.clone());
    }
}
