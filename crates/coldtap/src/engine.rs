//! Command protocol engine
//!
//! Runs one [`Command`] through a [`CardSession`]: serialize, send, interpret the
//! status word, and either finish or retry. Two statuses are retried without
//! surfacing to the caller:
//!
//! - `NeedPause`: the card is counting down its security delay. The same apdu is
//!   resent until the card answers with anything else. There is no local bound.
//! - `NeedEncryption`: the encryption mode is escalated `None -> Fast -> Strong`
//!   and the command is serialized again under the new key. Past `Strong` the
//!   exchange fails.
//!
//! When error handling is enabled, user code errors additionally prompt the user
//! and rerun the command.

use coldtap_apdu_core::{CommandApdu, ResponseApdu, StatusWord, TlvDecoder, TlvTag};
use tracing::{debug, instrument, trace};

use crate::command::{Command, PreflightReadMode};
use crate::delegate::SessionDelegate;
use crate::environment::{SessionEnvironment, UserCode, UserCodeKind};
use crate::reader::Reader;
use crate::secure_channel::EncryptionMode;
use crate::session::CardSession;
use crate::{Error, Result};

/// Where a single exchange stands
#[derive(Debug)]
enum Exchange {
    /// Send a freshly serialized apdu
    Sending(CommandApdu),
    /// Resend the unchanged apdu after a security delay notification
    AwaitingDelayRetry(CommandApdu),
    /// Switch to a stronger mode, then serialize again
    EscalatingEncryption(EncryptionMode),
}

/// Remaining security delay reported with `NeedPause`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SecurityDelay {
    remaining_ms: u32,
    /// The countdown is persisted and resumes only after a fresh tag activation
    flash: bool,
}

impl SecurityDelay {
    fn from_response(response: &ResponseApdu) -> Result<Self> {
        let tlvs = response.tlv_data().ok_or(Error::DeserializeApduFailed)?;
        let decoder = TlvDecoder::new(&tlvs);
        let remaining_ms = decoder
            .decode(TlvTag::Pause)
            .map_err(|_| Error::DeserializeApduFailed)?;
        Ok(Self {
            remaining_ms,
            flash: decoder.decode(TlvTag::Flash)?,
        })
    }
}

/// Run `command` on an active session
#[instrument(level = "debug", skip_all, fields(command = command.name()))]
pub(crate) async fn transceive<C, R, D>(command: &C, session: &CardSession<R, D>) -> Result<C::Response>
where
    C: Command,
    R: Reader,
    D: SessionDelegate,
{
    let handle_errors = session.with_environment(|env| {
        if Command::preflight_read_mode(command) != PreflightReadMode::None && env.card.is_none() {
            return Err(Error::MissingPreflightRead);
        }
        if env.config.handle_errors {
            if let Some(card) = &env.card {
                command.pre_check(card)?;
            }
        }
        Ok(env.config.handle_errors)
    })?;

    if handle_errors
        && command.requires_passcode()
        && session.with_environment(|env| env.passcode.value().is_none())
    {
        request_user_code(session, UserCodeKind::Passcode).await?;
    }

    loop {
        let error = match exchange(command, session, handle_errors).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };
        if !handle_errors {
            return Err(error);
        }

        let Some(kind) = session.with_environment(|env| user_code_to_request(command, env, &error))
        else {
            return Err(error);
        };
        debug!(%kind, %error, "requesting user code");
        session.with_environment(|env| env.set_user_code(UserCode::unset(kind)));
        request_user_code(session, kind).await?;
    }
}

async fn exchange<C, R, D>(
    command: &C,
    session: &CardSession<R, D>,
    handle_errors: bool,
) -> Result<C::Response>
where
    C: Command,
    R: Reader,
    D: SessionDelegate,
{
    let mut state = Exchange::Sending(session.with_environment(|env| command.serialize(env))?);

    loop {
        state = match state {
            Exchange::Sending(apdu) | Exchange::AwaitingDelayRetry(apdu) => {
                let response = session.send(&apdu).await?;
                let status = response.status_word();
                trace!(%status, "status");

                match status {
                    status if status.is_success() => return complete(command, session, &response),
                    StatusWord::NeedPause => {
                        let delay = SecurityDelay::from_response(&response)?;
                        debug!(remaining_ms = delay.remaining_ms, flash = delay.flash, "security delay");
                        session.delegate().show_security_delay(delay.remaining_ms);

                        let mode = session.with_environment(|env| env.encryption_mode);
                        if delay.flash && mode == EncryptionMode::None {
                            session.reader().restart_polling().await;
                        }
                        Exchange::AwaitingDelayRetry(apdu)
                    }
                    StatusWord::NeedEncryption => {
                        let current = session.with_environment(|env| env.encryption_mode);
                        let next = current.escalate().ok_or_else(|| {
                            Error::CryptoUtilsError(format!(
                                "card requires encryption after {current} mode"
                            ))
                        })?;
                        Exchange::EscalatingEncryption(next)
                    }
                    status => {
                        let error = Error::from_status(status)
                            .unwrap_or(Error::UnknownStatus(status.to_u16()));
                        if !handle_errors {
                            return Err(error);
                        }
                        return Err(session.with_environment(|env| command.after_check(env.card.as_ref(), error)));
                    }
                }
            }
            Exchange::EscalatingEncryption(mode) => {
                debug!(%mode, "escalating encryption");
                let apdu = session.with_environment(|env| {
                    env.set_encryption_mode(mode);
                    command.serialize(env)
                })?;
                Exchange::Sending(apdu)
            }
        };
    }
}

fn complete<C, R, D>(command: &C, session: &CardSession<R, D>, response: &ResponseApdu) -> Result<C::Response>
where
    C: Command,
    R: Reader,
    D: SessionDelegate,
{
    session.delegate().show_undefined_spinner();
    session.with_environment(|env| {
        let result = command.deserialize(env, response)?;
        command.on_success(env, &result);
        Ok(result)
    })
}

/// Which code, if any, to ask for before rerunning after `error`
fn user_code_to_request<C: Command>(
    command: &C,
    env: &SessionEnvironment,
    error: &Error,
) -> Option<UserCodeKind> {
    match error {
        Error::AccessCodeRequired => Some(UserCodeKind::AccessCode),
        Error::InvalidParams if command.requires_passcode() => {
            // A card without a passcode rejected the default one: the parameters are wrong.
            let card_has_no_passcode =
                env.card.as_ref().and_then(|card| card.is_passcode_set) == Some(false);
            if card_has_no_passcode && !env.is_user_code_set(UserCodeKind::Passcode) {
                None
            } else {
                Some(UserCodeKind::Passcode)
            }
        }
        _ => None,
    }
}

async fn request_user_code<R: Reader, D: SessionDelegate>(
    session: &CardSession<R, D>,
    kind: UserCodeKind,
) -> Result<()> {
    let code = session
        .delegate()
        .request_user_code(kind)
        .await
        .ok_or(Error::UserCancelled)?;
    session.with_environment(|env| env.set_user_code(UserCode::new(kind, &code)));
    Ok(())
}
