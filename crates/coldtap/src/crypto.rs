use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use crc::{CRC_16_ISO_IEC_14443_3_A, Crc};
use k256::{PublicKey, SecretKey, ecdh::SharedSecret};
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

/// CRC-16 of ISO/IEC 14443-3 type A, initial value `0x6363`
const CRC_A: Crc<u16> = Crc::<u16>::new(&CRC_16_ISO_IEC_14443_3_A);

/// The channel always runs with a zero IV; every session has a fresh key.
const ZERO_IV: [u8; 16] = [0; 16];

/// `len:u16 | crc:u16` prepended to every plaintext
const FRAME_HEADER_LEN: usize = 4;

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub(crate) fn pbkdf2_sha256(password: &[u8], salt: &[u8], rounds: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut out);
    out
}

pub(crate) fn generate_ecdh_shared_secret(private: &SecretKey, public: &PublicKey) -> SharedSecret {
    k256::elliptic_curve::ecdh::diffie_hellman(private.to_nonzero_scalar(), public.as_affine())
}

pub(crate) fn crc16(data: &[u8]) -> u16 {
    CRC_A.checksum(data)
}

/// Encrypt a command payload with AES-256-CBC.
///
/// The plaintext is framed as `len:u16 BE | crc16:u16 LE | plaintext` and PKCS#7
/// padded before encryption.
pub(crate) fn encrypt_payload(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(plaintext.len()).map_err(|_| Error::FailedToEncryptApdu)?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + plaintext.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&crc16(plaintext).to_le_bytes());
    frame.extend_from_slice(plaintext);

    let encryptor =
        Encryptor::new_from_slices(key, &ZERO_IV).map_err(|_| Error::FailedToEncryptApdu)?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(&frame))
}

/// Reverse [`encrypt_payload`], verifying padding, length and checksum
pub(crate) fn decrypt_payload(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let decryptor =
        Decryptor::new_from_slices(key, &ZERO_IV).map_err(|_| Error::FailedToDecryptApdu)?;
    let frame = decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::FailedToDecryptApdu)?;

    if frame.len() < FRAME_HEADER_LEN {
        return Err(Error::FailedToDecryptApdu);
    }
    let (header, plaintext) = frame.split_at(FRAME_HEADER_LEN);
    let len = usize::from(u16::from_be_bytes([header[0], header[1]]));
    let crc = u16::from_le_bytes([header[2], header[3]]);

    if len != plaintext.len() || crc != crc16(plaintext) {
        return Err(Error::FailedToDecryptApdu);
    }
    Ok(plaintext.to_vec())
}
