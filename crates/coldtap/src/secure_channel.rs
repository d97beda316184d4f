//! Secure channel between host and card
//!
//! A channel is negotiated with `OpenSession`: the host sends its half of the
//! key agreement (`keyA`), the card answers with `keyB` and optionally its UID.
//! Both sides then derive
//!
//! ```text
//! session_key = SHA-256(secret || PBKDF2-HMAC-SHA256(access_code, salt = uid, rounds = 50))
//! ```
//!
//! where `secret` depends on the [`EncryptionMode`]: `keyA || keyB` for fast
//! mode, the ECDH x-coordinate over secp256k1 for strong mode.

use std::fmt;

use coldtap_apdu_core::{CommandApdu, ResponseApdu};
use k256::{PublicKey, SecretKey, elliptic_curve::sec1::ToEncodedPoint};
use rand::{RngCore, rng};
use tracing::trace;
use zeroize::{Zeroize, Zeroizing};

use crate::constants::SESSION_KEY_PBKDF2_ROUNDS;
use crate::crypto::{
    decrypt_payload, encrypt_payload, generate_ecdh_shared_secret, pbkdf2_sha256, sha256,
};
use crate::{Error, Result};

/// Payload protection negotiated with the card. The wire value travels in `P1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, derive_more::Display)]
#[repr(u8)]
pub enum EncryptionMode {
    /// Payloads travel in clear
    #[default]
    #[display("none")]
    None = 0x00,
    /// Symmetric key agreement from two random halves
    #[display("fast")]
    Fast = 0x01,
    /// ECDH key agreement over secp256k1
    #[display("strong")]
    Strong = 0x02,
}

impl EncryptionMode {
    /// Wire value
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Next stronger mode, `None` once `Strong` is reached
    pub const fn escalate(self) -> Option<Self> {
        match self {
            Self::None => Some(Self::Fast),
            Self::Fast => Some(Self::Strong),
            Self::Strong => None,
        }
    }
}

/// Symmetric key protecting apdu payloads for the rest of a session
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Wrap raw key bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the session key from the agreed secret, the access code hash and the tag UID
    pub fn derive(secret: &[u8], access_code: &[u8], uid: &[u8]) -> Self {
        let protocol_key = Zeroizing::new(pbkdf2_sha256(access_code, uid, SESSION_KEY_PBKDF2_ROUNDS));

        let mut material = Zeroizing::new(Vec::with_capacity(secret.len() + protocol_key.len()));
        material.extend_from_slice(secret);
        material.extend_from_slice(&protocol_key[..]);

        Self(sha256(&material))
    }

    /// Raw key bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt a payload under this key
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt_payload(&self.0, plaintext)
    }

    /// Decrypt and verify a payload encrypted under this key
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        decrypt_payload(&self.0, ciphertext)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Host side of the key agreement for one `OpenSession` exchange
pub enum EncryptionHelper {
    /// Fast mode: a random 16-byte half
    Fast {
        /// Host half sent to the card
        key_a: Zeroizing<[u8; 16]>,
    },
    /// Strong mode: an ephemeral secp256k1 key pair
    Strong {
        /// Ephemeral private key
        secret: SecretKey,
    },
}

impl fmt::Debug for EncryptionHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast { .. } => f.write_str("EncryptionHelper::Fast"),
            Self::Strong { .. } => f.write_str("EncryptionHelper::Strong"),
        }
    }
}

impl EncryptionHelper {
    /// Fresh helper for `mode`. There is nothing to agree on for [`EncryptionMode::None`].
    pub fn new(mode: EncryptionMode) -> Option<Self> {
        match mode {
            EncryptionMode::None => None,
            EncryptionMode::Fast => {
                let mut key_a = Zeroizing::new([0u8; 16]);
                rng().fill_bytes(&mut key_a[..]);
                Some(Self::Fast { key_a })
            }
            EncryptionMode::Strong => Some(Self::Strong {
                secret: SecretKey::random(&mut rand_v8::thread_rng()),
            }),
        }
    }

    /// Mode this helper negotiates
    pub const fn mode(&self) -> EncryptionMode {
        match self {
            Self::Fast { .. } => EncryptionMode::Fast,
            Self::Strong { .. } => EncryptionMode::Strong,
        }
    }

    /// Host half sent in `OpenSession`. Strong mode sends the uncompressed public key.
    pub fn key_a(&self) -> Vec<u8> {
        match self {
            Self::Fast { key_a } => key_a.to_vec(),
            Self::Strong { secret } => secret
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
        }
    }

    /// Combine the card half into the shared secret
    pub fn generate_secret(&self, key_b: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if key_b.is_empty() {
            return Err(Error::FailedToEstablishEncryption);
        }

        match self {
            Self::Fast { key_a } => {
                let mut secret = Zeroizing::new(Vec::with_capacity(key_a.len() + key_b.len()));
                secret.extend_from_slice(&key_a[..]);
                secret.extend_from_slice(key_b);
                Ok(secret)
            }
            Self::Strong { secret } => {
                let card_key = PublicKey::from_sec1_bytes(key_b)
                    .map_err(|_| Error::FailedToEstablishEncryption)?;
                let shared = generate_ecdh_shared_secret(secret, &card_key);
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
        }
    }
}

/// Encrypt the payload of `apdu` and record `mode` in `P1`.
///
/// Commands without a payload or sent with [`EncryptionMode::None`] pass through.
pub fn encrypt_command(
    apdu: &CommandApdu,
    mode: EncryptionMode,
    key: Option<&SessionKey>,
) -> Result<CommandApdu> {
    let key = match (mode, key) {
        (EncryptionMode::None, _) => return Ok(apdu.clone()),
        (_, Some(key)) => key,
        (_, None) => return Err(Error::FailedToEncryptApdu),
    };

    let apdu = apdu.clone().with_p1(mode.as_byte());
    if apdu.payload().is_empty() {
        return Ok(apdu);
    }

    let encrypted = key.encrypt(apdu.payload())?;
    trace!(%mode, plain = apdu.payload().len(), encrypted = encrypted.len(), "encrypt");
    Ok(apdu.with_payload(encrypted))
}

/// Decrypt the payload of `response` when a session key is active.
///
/// Empty payloads carry no ciphertext and pass through unchanged.
pub fn decrypt_response(response: &ResponseApdu, key: Option<&SessionKey>) -> Result<ResponseApdu> {
    match key {
        Some(key) if !response.payload().is_empty() => {
            let plain = key.decrypt(response.payload())?;
            Ok(response.with_payload(plain))
        }
        _ => Ok(response.clone()),
    }
}

#[cfg(test)]
mod tests {
    use coldtap_apdu_core::StatusWord;

    use super::*;

    #[test]
    fn test_escalation_order() {
        assert_eq!(EncryptionMode::None.escalate(), Some(EncryptionMode::Fast));
        assert_eq!(EncryptionMode::Fast.escalate(), Some(EncryptionMode::Strong));
        assert_eq!(EncryptionMode::Strong.escalate(), None);
        assert_eq!(EncryptionMode::Strong.as_byte(), 0x02);
    }

    #[test]
    fn test_fast_agreement() {
        let helper = EncryptionHelper::new(EncryptionMode::Fast).unwrap();
        let key_a = helper.key_a();
        assert_eq!(key_a.len(), 16);

        let key_b = [0xAB; 16];
        let secret = helper.generate_secret(&key_b).unwrap();
        assert_eq!(&secret[..16], &key_a[..]);
        assert_eq!(&secret[16..], &key_b[..]);

        assert_eq!(
            helper.generate_secret(&[]).map(|_| ()),
            Err(Error::FailedToEstablishEncryption)
        );
    }

    #[test]
    fn test_strong_agreement() {
        let helper = EncryptionHelper::new(EncryptionMode::Strong).unwrap();
        let key_a = helper.key_a();
        assert_eq!(key_a.len(), 65);
        assert_eq!(key_a[0], 0x04);

        let card = SecretKey::random(&mut rand_v8::thread_rng());
        let card_key_b = card.public_key().to_encoded_point(false);
        let host_secret = helper.generate_secret(card_key_b.as_bytes()).unwrap();

        let host_public = PublicKey::from_sec1_bytes(&key_a).unwrap();
        let card_secret = generate_ecdh_shared_secret(&card, &host_public);
        assert_eq!(&host_secret[..], card_secret.raw_secret_bytes().as_slice());

        assert_eq!(
            helper.generate_secret(&[0x04, 0x01]).map(|_| ()),
            Err(Error::FailedToEstablishEncryption)
        );
    }

    #[test]
    fn test_session_key_derivation() {
        let access_code = sha256(b"000000");
        let uid = hex::decode("04A1B2C3D4E5F6").unwrap();

        let key = SessionKey::derive(b"secret", &access_code, &uid);
        assert_eq!(key, SessionKey::derive(b"secret", &access_code, &uid));
        assert_ne!(key, SessionKey::derive(b"secret", &access_code, b"other uid"));
        assert_ne!(key, SessionKey::derive(b"other", &access_code, &uid));

        let mut expected = b"secret".to_vec();
        expected.extend_from_slice(&pbkdf2_sha256(&access_code, &uid, 50));
        assert_eq!(key.as_bytes(), &sha256(&expected));
        assert_eq!(format!("{key:?}"), "SessionKey(..)");
    }

    #[test]
    fn test_command_encryption() {
        let key = SessionKey::from_bytes(sha256(b"key"));
        let apdu = CommandApdu::new(0xF2, vec![0x10, 0x01, 0x00]);

        let clear = encrypt_command(&apdu, EncryptionMode::None, Some(&key)).unwrap();
        assert_eq!(clear, apdu);

        let encrypted = encrypt_command(&apdu, EncryptionMode::Fast, Some(&key)).unwrap();
        assert_eq!(encrypted.p1(), 0x01);
        assert_eq!(encrypted.ins(), 0xF2);
        assert_eq!(
            decrypt_payload(key.as_bytes(), encrypted.payload()).unwrap(),
            apdu.payload().to_vec()
        );

        assert_eq!(
            encrypt_command(&apdu, EncryptionMode::Strong, None),
            Err(Error::FailedToEncryptApdu)
        );
    }

    #[test]
    fn test_response_decryption() {
        let key = SessionKey::from_bytes(sha256(b"key"));
        let cipher = encrypt_payload(key.as_bytes(), &[0x0F, 0x01, 0x00]).unwrap();
        let response = ResponseApdu::with_status(cipher, StatusWord::ProcessCompleted);

        let plain = decrypt_response(&response, Some(&key)).unwrap();
        assert_eq!(plain.payload().as_ref(), &[0x0F, 0x01, 0x00]);
        assert_eq!(plain.status_word(), StatusWord::ProcessCompleted);

        let empty = ResponseApdu::with_status(Vec::new(), StatusWord::NeedEncryption);
        assert_eq!(decrypt_response(&empty, Some(&key)).unwrap(), empty);

        let garbage = ResponseApdu::with_status(vec![0x01; 16], StatusWord::ProcessCompleted);
        assert_eq!(
            decrypt_response(&garbage, Some(&key)),
            Err(Error::FailedToDecryptApdu)
        );
    }
}
