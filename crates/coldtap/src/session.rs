//! Card session lifecycle
//!
//! A [`CardSession`] owns one proximity session: it opens the reader, follows
//! tag presence, performs the preflight read and moves apdus through the secure
//! channel. Only one session may be active and only one apdu may be in flight
//! at a time.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use coldtap_apdu_core::{CommandApdu, ResponseApdu};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::command::{CardSessionRunnable, PreflightReadMode};
use crate::commands::{OpenSessionCommand, ReadCommand};
use crate::config::Config;
use crate::delegate::SessionDelegate;
use crate::engine;
use crate::environment::SessionEnvironment;
use crate::reader::{Reader, TagEvent};
use crate::secure_channel::{
    EncryptionHelper, EncryptionMode, SessionKey, decrypt_response, encrypt_command,
};
use crate::types::Card;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Inactive,
    Active,
    /// Ended by a stop. Sends still in progress fail as cancelled.
    Stopped,
}

#[derive(Debug, Default)]
struct TagState {
    /// Tag currently in the field
    current: Option<Bytes>,
    /// First tag seen by the session. Apdus are only sent to this tag.
    session: Option<Bytes>,
}

/// Clears the in-flight flag when a send completes
struct SendGuard<'a>(&'a AtomicBool);

impl<'a> SendGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One proximity session with a card
pub struct CardSession<R, D> {
    reader: R,
    delegate: D,
    expected_card_id: Option<String>,
    environment: Mutex<SessionEnvironment>,
    state: Mutex<SessionState>,
    tags: Mutex<TagState>,
    events: tokio::sync::Mutex<Option<broadcast::Receiver<TagEvent>>>,
    sending: AtomicBool,
}

impl<R: fmt::Debug, D> fmt::Debug for CardSession<R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardSession")
            .field("reader", &self.reader)
            .field("expected_card_id", &self.expected_card_id)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<R: Reader, D: SessionDelegate> CardSession<R, D> {
    /// Create an inactive session.
    ///
    /// When `expected_card_id` is set, the preflight read only accepts that card.
    pub fn new(reader: R, delegate: D, config: Config, expected_card_id: Option<String>) -> Self {
        Self {
            reader,
            delegate,
            expected_card_id,
            environment: Mutex::new(SessionEnvironment::new(config)),
            state: Mutex::new(SessionState::Inactive),
            tags: Mutex::new(TagState::default()),
            events: tokio::sync::Mutex::new(None),
            sending: AtomicBool::new(false),
        }
    }

    /// The reader
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// The UI delegate
    pub const fn delegate(&self) -> &D {
        &self.delegate
    }

    /// Whether the session is active
    pub fn is_active(&self) -> bool {
        *self.state.lock() == SessionState::Active
    }

    /// Snapshot of the environment
    pub fn environment(&self) -> SessionEnvironment {
        self.environment.lock().clone()
    }

    /// Read or update the environment
    pub fn with_environment<T>(&self, f: impl FnOnce(&mut SessionEnvironment) -> T) -> T {
        f(&mut self.environment.lock())
    }

    /// Forward progress of a long running operation to the UI
    pub fn show_progress(&self, percent: u8) {
        self.delegate.show_progress(percent);
    }

    /// Open the reader and, unless skipped, read and verify the card
    #[instrument(level = "debug", skip(self))]
    pub async fn start(&self, preflight: PreflightReadMode) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Active {
                return Err(Error::Busy);
            }
            *state = SessionState::Active;
        }

        self.with_environment(|env| {
            env.card = None;
            env.encryption_key = None;
        });
        *self.tags.lock() = TagState::default();
        *self.events.lock().await = Some(self.reader.subscribe());

        if let Err(error) = self.reader.open().await {
            *self.state.lock() = SessionState::Inactive;
            self.release().await;
            return Err(error);
        }
        self.delegate.session_started();
        info!("session started");

        if preflight == PreflightReadMode::ReadCardOnly {
            if let Err(error) = self.preflight_read().await {
                self.stop_with_error(&error).await;
                return Err(error);
            }
        }
        Ok(())
    }

    /// Start, run `runnable`, then stop with its outcome
    pub async fn run<T: CardSessionRunnable>(&self, runnable: &T) -> Result<T::Response> {
        self.start(runnable.preflight_read_mode()).await?;

        let result = runnable.run(self).await;
        match &result {
            Ok(_) => self.stop(None).await,
            Err(error) => self.stop_with_error(error).await,
        }
        result
    }

    /// End the session, showing `message`
    pub async fn stop(&self, message: Option<&str>) {
        if !self.deactivate() {
            return;
        }
        self.reader.stop_session(message).await;
        self.release().await;
        self.delegate.session_stopped();
        info!("session stopped");
    }

    /// End the session because of `error`
    pub async fn stop_with_error(&self, error: &Error) {
        if !self.deactivate() {
            return;
        }
        self.reader.stop_session_with_error(error).await;
        self.release().await;
        self.delegate.session_stopped();
        info!(%error, "session stopped");
    }

    /// Encrypt, transmit and decrypt one apdu.
    ///
    /// Opens the secure channel first when the environment asks for encryption
    /// and no key is negotiated yet. Status words are not interpreted here.
    #[instrument(level = "debug", skip_all, fields(ins = apdu.ins()))]
    pub async fn send(&self, apdu: &CommandApdu) -> Result<ResponseApdu> {
        let _guard = SendGuard::acquire(&self.sending)?;
        match *self.state.lock() {
            SessionState::Active => {}
            SessionState::Stopped => return Err(Error::UserCancelled),
            SessionState::Inactive => return Err(Error::SessionInactive),
        }

        self.wait_for_session_tag().await?;
        self.establish_encryption_if_needed().await?;

        let (mode, key) = self.with_environment(|env| (env.encryption_mode, env.encryption_key.clone()));
        self.exchange(apdu, mode, key.as_ref()).await
    }

    fn deactivate(&self) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Active {
            return false;
        }
        *state = SessionState::Stopped;
        true
    }

    async fn release(&self) {
        *self.events.lock().await = None;
        *self.tags.lock() = TagState::default();
        self.with_environment(|env| env.encryption_key = None);
    }

    async fn preflight_read(&self) -> Result<()> {
        loop {
            let card = engine::transceive(&ReadCommand::new(), self).await?;
            let Err(error) = self.verify_card(&card) else {
                debug!(card_id = %card.card_id, "preflight read complete");
                return Ok(());
            };

            warn!(%error, card_id = %card.card_id, "card rejected");
            let delay = self.with_environment(|env| {
                env.card = None;
                env.encryption_key = None;
                env.config.wrong_card_retry_delay
            });
            self.delegate.wrong_card(&error.to_string());
            tokio::time::sleep(delay).await;

            if !self.reader.is_ready() {
                return Err(Error::UserCancelled);
            }
            self.tags.lock().session = None;
            self.reader.restart_polling().await;
        }
    }

    fn verify_card(&self, card: &Card) -> Result<()> {
        if let Some(expected) = &self.expected_card_id {
            if !expected.eq_ignore_ascii_case(&card.card_id) {
                return Err(Error::WrongCardNumber {
                    expected: Some(expected.clone()),
                });
            }
        }
        self.with_environment(|env| env.config.filter.verify(card))
    }

    /// Consume pending tag events and wait until the session tag is in the field
    async fn wait_for_session_tag(&self) -> Result<()> {
        let mut events = self.events.lock().await;
        let events = events.as_mut().ok_or(Error::SessionInactive)?;

        loop {
            loop {
                match events.try_recv() {
                    Ok(event) => self.handle_tag_event(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Lagged(skipped)) => self.handle_lag(skipped),
                    Err(TryRecvError::Closed) => return Err(Error::UserCancelled),
                }
            }

            let (current, session) = {
                let tags = self.tags.lock();
                (tags.current.clone(), tags.session.clone())
            };

            match (current, session) {
                (Some(current), Some(session)) if current == session => return Ok(()),
                (Some(current), None) => {
                    debug!(tag = %hex::encode(&current), "session tag");
                    self.tags.lock().session = Some(current);
                    return Ok(());
                }
                (Some(current), Some(_)) => {
                    warn!(tag = %hex::encode(&current), "wrong tag in the field");
                    self.delegate
                        .wrong_card(&Error::WrongCardNumber { expected: None }.to_string());
                    let delay = self.with_environment(|env| env.config.wrong_card_retry_delay);
                    tokio::time::sleep(delay).await;
                    self.tags.lock().current = None;
                    self.reader.restart_polling().await;
                }
                (None, _) => {
                    debug!("waiting for tag");
                    match events.recv().await {
                        Ok(event) => self.handle_tag_event(event),
                        Err(RecvError::Lagged(skipped)) => self.handle_lag(skipped),
                        Err(RecvError::Closed) => return Err(Error::UserCancelled),
                    }
                }
            }
        }
    }

    fn handle_tag_event(&self, event: TagEvent) {
        match event {
            TagEvent::Connected(uid) => {
                debug!(tag = %hex::encode(&uid), "tag connected");
                self.tags.lock().current = Some(uid);
                self.delegate.tag_connected();
            }
            TagEvent::Disconnected => {
                debug!("tag lost");
                self.tags.lock().current = None;
                self.with_environment(|env| env.encryption_key = None);
                self.delegate.tag_lost();
            }
        }
    }

    fn handle_lag(&self, skipped: u64) {
        warn!(skipped, "missed tag events");
        self.with_environment(|env| env.encryption_key = None);
        self.tags.lock().current = self.reader.tag_id();
    }

    async fn establish_encryption_if_needed(&self) -> Result<()> {
        let (mode, has_key, access_code) = self.with_environment(|env| {
            (
                env.encryption_mode,
                env.encryption_key.is_some(),
                env.access_code.value().copied().map(Zeroizing::new),
            )
        });
        if mode == EncryptionMode::None || has_key {
            return Ok(());
        }
        let access_code = access_code.ok_or(Error::AccessCodeRequired)?;
        let helper = EncryptionHelper::new(mode).ok_or(Error::FailedToEstablishEncryption)?;
        debug!(%mode, "opening secure channel");

        let command = OpenSessionCommand::new(mode, helper.key_a());
        let apdu = self.with_environment(|env| command.serialize(env))?;
        let response = self.exchange(&apdu, EncryptionMode::None, None).await?;

        let status = response.status_word();
        if let Some(error) = Error::from_status(status) {
            return Err(error);
        }
        if !status.is_success() {
            return Err(Error::FailedToEstablishEncryption);
        }

        let opened = OpenSessionCommand::deserialize(&response)?;
        let uid = match opened.uid {
            Some(uid) => uid,
            None => self
                .tags
                .lock()
                .current
                .clone()
                .ok_or(Error::FailedToEstablishEncryption)?,
        };

        let secret = helper.generate_secret(&opened.session_key_b)?;
        let key = SessionKey::derive(&secret, &access_code[..], &uid);
        self.with_environment(|env| env.encryption_key = Some(key));
        debug!(%mode, "secure channel established");
        Ok(())
    }

    async fn exchange(
        &self,
        apdu: &CommandApdu,
        mode: EncryptionMode,
        key: Option<&SessionKey>,
    ) -> Result<ResponseApdu> {
        let encrypted = encrypt_command(apdu, mode, key)?;
        let raw = self.reader.transmit(&encrypted.to_bytes()).await?;
        let response = ResponseApdu::from_bytes(&raw)?;
        decrypt_response(&response, key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn test_send_guard() {
        let flag = AtomicBool::new(false);
        {
            let _guard = SendGuard::acquire(&flag).unwrap();
            assert!(flag.load(Ordering::Acquire));
            assert!(matches!(SendGuard::acquire(&flag), Err(Error::Busy)));
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(SendGuard::acquire(&flag).is_ok());
    }
}
