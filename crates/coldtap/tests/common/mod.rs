//! Common test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coldtap::apdu::prelude::*;
use coldtap::{
    CardSession, Config, Error, Reader, Result, SessionDelegate, SessionKey, TagEvent, UserCodeKind,
    ins,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::{Notify, broadcast};

/// Read response of a single-wallet SDK card, firmware 1.28
pub const READ_RESPONSE: &str = "0108FF00000000000111200B534D415254204341534800020102800A312E3238642053444B000341044CB1004B43B407419E29A8FFDB64D4E54B623CEB37F3C2037B3ED6F38EEE0C1F2E5AB5D015DF78FE15EFA5327F59A24C059C999AFC1D3F2A8DDEEE16467CA75F0A027E310C5E8102FFFF820407E2071B830B54414E47454D2053444B00840342544386405D7FFCE7446DAA9084595F383E712A63B2AC4CF7BDE7673F05D6FC629F0D3E0F637910B5A675F66B633331630AEFB614345AF05208DEECF2274FF3B44642AC883041045F16BD1D2EAFE463E62A335A09E6B2BBCBD04452526885CB679FC4D27AF1BD22F553C7DEEFB54FD3D4F361D14E6DC3F11B7D4EA183250A60720EBDF9E110CD26050A736563703235366B3100080400000064070100090205DC604104B45FF0D628E1B59F7AEFA1D5B45AB9D7C47FC090D8B29ACCB515431BDBAD2802DDB3AC5E83A06BD8F13ABB84A465CA3C0FA0B44301F80295A9B4C5E35D5FDFE56204000000646304000000000F0100";

pub const CARD_ID: &str = "FF00000000000111";

pub type TestSession = CardSession<SimulatedCard, RecordingDelegate>;

/// Session configuration without retry delays
pub fn config() -> Config {
    Config::new().with_wrong_card_retry_delay(Duration::ZERO)
}

pub fn session(card: SimulatedCard, delegate: RecordingDelegate) -> TestSession {
    CardSession::new(card, delegate, config(), None)
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Read response of a loaded card on multi-wallet firmware with three slots
pub fn multiwallet_read_response() -> Vec<Tlv> {
    let mut tlvs = Tlv::parse_all(&hex::decode(READ_RESPONSE).unwrap()).unwrap();
    tlvs.retain(|tlv| !matches!(tlv.tag, TlvTag::FirmwareVersion | TlvTag::WalletsCount));
    tlvs.push(Tlv::encode(TlvTag::FirmwareVersion, "4.52r").unwrap());
    tlvs.push(Tlv::encode(TlvTag::WalletsCount, &3u8).unwrap());
    tlvs.push(Tlv::encode(TlvTag::Pin2IsDefault, &true).unwrap());
    tlvs
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Scripted card answer to the next non `OpenSession` command
#[derive(Debug, Clone)]
pub enum Reply {
    Status(StatusWord),
    Pause { remaining_ms: u32, flash: bool },
    Payload(Vec<Tlv>),
}

/// A card tapped on the simulated reader
#[derive(Debug, Clone)]
pub struct SimulatedTag {
    pub card_id: String,
    pub uid: Bytes,
}

impl SimulatedTag {
    pub fn new(card_id: &str, uid: &[u8]) -> Self {
        Self {
            card_id: card_id.to_owned(),
            uid: Bytes::copy_from_slice(uid),
        }
    }
}

/// In-memory reader with a card that speaks the secure channel
#[derive(Debug)]
pub struct SimulatedCard {
    tags: Mutex<VecDeque<SimulatedTag>>,
    events: Mutex<Option<broadcast::Sender<TagEvent>>>,
    replies: Mutex<VecDeque<Reply>>,
    key: Mutex<Option<SessionKey>>,
    access_code: Mutex<String>,
    ready: Mutex<bool>,
    gate: Mutex<Option<Arc<Notify>>>,
    /// Raw bytes as received from the host
    pub transmitted: Mutex<Vec<Bytes>>,
    /// Commands after decryption
    pub commands: Mutex<Vec<CommandApdu>>,
    pub restarts: AtomicUsize,
    pub stop_messages: Mutex<Vec<Option<String>>>,
}

impl Default for SimulatedCard {
    fn default() -> Self {
        Self::with_tags([SimulatedTag::new(CARD_ID, &[0x04, 0x11, 0x22, 0x33])])
    }
}

impl SimulatedCard {
    /// Tags are tapped in order: each polling restart moves to the next one
    pub fn with_tags(tags: impl IntoIterator<Item = SimulatedTag>) -> Self {
        Self {
            tags: Mutex::new(tags.into_iter().collect()),
            events: Mutex::new(None),
            replies: Mutex::new(VecDeque::new()),
            key: Mutex::new(None),
            access_code: Mutex::new("000000".to_owned()),
            ready: Mutex::new(true),
            gate: Mutex::new(None),
            transmitted: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            restarts: AtomicUsize::new(0),
            stop_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.replies.lock().extend(replies);
    }

    pub fn set_access_code(&self, code: &str) {
        *self.access_code.lock() = code.to_owned();
    }

    pub fn set_ready(&self, ready: bool) {
        *self.ready.lock() = ready;
    }

    /// Hold every transmission until `gate` is notified
    pub fn set_gate(&self, gate: Arc<Notify>) {
        *self.gate.lock() = Some(gate);
    }

    /// Take the tag out of the field and put it back
    pub fn lose_tag(&self) {
        self.emit(TagEvent::Disconnected);
        if let Some(uid) = self.current_uid() {
            self.emit(TagEvent::Connected(uid));
        }
    }

    pub fn commands_with_ins(&self, ins: u8) -> Vec<CommandApdu> {
        self.commands
            .lock()
            .iter()
            .filter(|command| command.ins() == ins)
            .cloned()
            .collect()
    }

    fn current_tag(&self) -> Option<SimulatedTag> {
        self.tags.lock().front().cloned()
    }

    fn current_uid(&self) -> Option<Bytes> {
        self.current_tag().map(|tag| tag.uid)
    }

    fn emit(&self, event: TagEvent) {
        if let Some(sender) = &*self.events.lock() {
            let _ = sender.send(event);
        }
    }

    fn parse_command(raw: &[u8]) -> Result<CommandApdu> {
        if raw.len() < 4 {
            return Err(Error::ReaderError("short command".into()));
        }
        let payload = match raw.get(4..7) {
            Some([0x00, hi, lo]) => {
                let len = usize::from(u16::from_be_bytes([*hi, *lo]));
                raw.get(7..7 + len)
                    .ok_or_else(|| Error::ReaderError("truncated payload".into()))?
            }
            _ => &[],
        };
        Ok(CommandApdu::from_parts(
            raw[0],
            raw[1],
            raw[2],
            raw[3],
            None,
            Bytes::copy_from_slice(payload),
        ))
    }

    fn open_session(&self, command: &CommandApdu) -> Result<ResponseApdu> {
        let tlvs = Tlv::parse_all(command.payload())
            .ok_or_else(|| Error::ReaderError("bad open session payload".into()))?;
        let key_a = tlvs
            .value(TlvTag::SessionKeyA)
            .ok_or_else(|| Error::ReaderError("missing key a".into()))?
            .clone();
        let uid = self.current_uid().unwrap_or_default();

        let (secret, key_b) = if command.p2() == 0x02 {
            let card = SecretKey::random(&mut rand_v8::thread_rng());
            let host = PublicKey::from_sec1_bytes(&key_a)
                .map_err(|_| Error::ReaderError("bad host key".into()))?;
            let shared = k256::ecdh::diffie_hellman(card.to_nonzero_scalar(), host.as_affine());
            let key_b = card.public_key().to_encoded_point(false).as_bytes().to_vec();
            (shared.raw_secret_bytes().to_vec(), key_b)
        } else {
            let key_b: [u8; 16] = rand::random();
            ([&key_a[..], &key_b[..]].concat(), key_b.to_vec())
        };

        let access_code = sha256(self.access_code.lock().as_bytes());
        *self.key.lock() = Some(SessionKey::derive(&secret, &access_code, &uid));

        let payload = Tlv::serialize_all(&[
            Tlv::new(TlvTag::SessionKeyB, key_b),
            Tlv::new(TlvTag::Uid, uid),
        ]);
        Ok(ResponseApdu::with_status(payload, StatusWord::ProcessCompleted))
    }

    fn default_reply(&self, command: &CommandApdu) -> Result<Vec<Tlv>> {
        let card_id = self.current_tag().map(|tag| tag.card_id).unwrap_or_default();
        let card_id = Tlv::encode(TlvTag::CardId, card_id.as_str())?;

        Ok(match command.ins() {
            ins::READ => {
                let raw = hex::decode(READ_RESPONSE).map_err(|e| Error::ReaderError(e.to_string()))?;
                let mut tlvs = Tlv::parse_all(&raw)
                    .ok_or_else(|| Error::ReaderError("bad read fixture".into()))?;
                tlvs.retain(|tlv| tlv.tag != TlvTag::CardId);
                tlvs.insert(0, card_id);
                tlvs
            }
            ins::CREATE_WALLET => vec![card_id, Tlv::new(TlvTag::WalletPublicKey, vec![0x04; 65])],
            _ => vec![card_id],
        })
    }

    fn respond(&self, command: &CommandApdu) -> Result<ResponseApdu> {
        let reply = self.replies.lock().pop_front();
        Ok(match reply {
            Some(Reply::Status(status)) => ResponseApdu::with_status(Bytes::new(), status),
            Some(Reply::Pause { remaining_ms, flash }) => {
                let mut tlvs = vec![Tlv::encode(TlvTag::Pause, &remaining_ms)?];
                if flash {
                    tlvs.push(Tlv::encode(TlvTag::Flash, &true)?);
                }
                ResponseApdu::with_status(Tlv::serialize_all(&tlvs), StatusWord::NeedPause)
            }
            Some(Reply::Payload(tlvs)) => {
                ResponseApdu::with_status(Tlv::serialize_all(&tlvs), StatusWord::ProcessCompleted)
            }
            None => ResponseApdu::with_status(
                Tlv::serialize_all(&self.default_reply(command)?),
                StatusWord::ProcessCompleted,
            ),
        })
    }
}

#[async_trait]
impl Reader for SimulatedCard {
    async fn open(&self) -> Result<()> {
        if let Some(uid) = self.current_uid() {
            self.emit(TagEvent::Connected(uid));
        }
        Ok(())
    }

    async fn stop_session(&self, message: Option<&str>) {
        self.stop_messages.lock().push(message.map(str::to_owned));
        self.events.lock().take();
        self.key.lock().take();
    }

    async fn restart_polling(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.key.lock().take();
        self.emit(TagEvent::Disconnected);
        {
            let mut tags = self.tags.lock();
            if tags.len() > 1 {
                tags.pop_front();
            }
        }
        if let Some(uid) = self.current_uid() {
            self.emit(TagEvent::Connected(uid));
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<TagEvent> {
        self.events
            .lock()
            .get_or_insert_with(|| broadcast::channel(16).0)
            .subscribe()
    }

    fn is_ready(&self) -> bool {
        *self.ready.lock()
    }

    fn tag_id(&self) -> Option<Bytes> {
        self.current_uid()
    }

    async fn do_transmit(&self, raw: &[u8]) -> Result<Bytes> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.transmitted.lock().push(Bytes::copy_from_slice(raw));

        let mut command = Self::parse_command(raw)?;
        if command.ins() == ins::OPEN_SESSION {
            self.commands.lock().push(command.clone());
            return Ok(self.open_session(&command)?.to_bytes());
        }

        let key = if command.p1() != 0 {
            let key = self.key.lock().clone().ok_or(Error::FailedToDecryptApdu)?;
            if !command.payload().is_empty() {
                // A key derived from another access code does not decrypt.
                let Ok(plain) = key.decrypt(command.payload()) else {
                    return Ok(ResponseApdu::with_status(Bytes::new(), StatusWord::InvalidParams)
                        .to_bytes());
                };
                command = command.with_payload(plain);
            }
            Some(key)
        } else {
            None
        };
        self.commands.lock().push(command.clone());

        let mut response = self.respond(&command)?;
        if let Some(key) = key {
            if !response.payload().is_empty() {
                response = response.with_payload(key.encrypt(response.payload())?);
            }
        }
        Ok(response.to_bytes())
    }
}

/// Delegate recording every notification and answering code prompts from a script
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    codes: Mutex<VecDeque<Option<String>>>,
    pub requests: Mutex<Vec<UserCodeKind>>,
    pub delays: Mutex<Vec<u32>>,
    pub wrong_cards: Mutex<Vec<String>>,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub connected: AtomicUsize,
    pub lost: AtomicUsize,
    pub spinners: AtomicUsize,
}

impl RecordingDelegate {
    /// Answer the next prompts in order. `None` cancels.
    pub fn with_codes(codes: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        Self {
            codes: Mutex::new(codes.into_iter().map(|code| code.map(str::to_owned)).collect()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SessionDelegate for RecordingDelegate {
    fn session_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn session_stopped(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn tag_connected(&self) {
        self.connected.fetch_add(1, Ordering::SeqCst);
    }

    fn tag_lost(&self) {
        self.lost.fetch_add(1, Ordering::SeqCst);
    }

    fn wrong_card(&self, message: &str) {
        self.wrong_cards.lock().push(message.to_owned());
    }

    fn show_security_delay(&self, remaining_ms: u32) {
        self.delays.lock().push(remaining_ms);
    }

    fn show_undefined_spinner(&self) {
        self.spinners.fetch_add(1, Ordering::SeqCst);
    }

    async fn request_user_code(&self, kind: UserCodeKind) -> Option<String> {
        self.requests.lock().push(kind);
        self.codes.lock().pop_front().flatten()
    }
}
