use coldtap_apdu_core::{Bytes, CommandApdu, ResponseApdu, TlvBuilder, TlvDecoder, TlvTag};

use crate::constants::{LEGACY_MODE_NFC_PING, ins};
use crate::environment::SessionEnvironment;
use crate::secure_channel::EncryptionMode;
use crate::{Error, Result};

/// Card half of the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenSessionResponse {
    /// Card half of the key agreement
    pub(crate) session_key_b: Bytes,
    /// Tag UID, when the card reports it
    pub(crate) uid: Option<Bytes>,
}

/// Start a secure channel. Sent in clear by the session only.
#[derive(Debug, Clone)]
pub(crate) struct OpenSessionCommand {
    mode: EncryptionMode,
    session_key_a: Bytes,
}

impl OpenSessionCommand {
    /// Offer `session_key_a` for `mode`
    pub(crate) fn new(mode: EncryptionMode, session_key_a: impl Into<Bytes>) -> Self {
        Self {
            mode,
            session_key_a: session_key_a.into(),
        }
    }

    pub(crate) fn serialize(&self, env: &SessionEnvironment) -> Result<CommandApdu> {
        let mut builder = TlvBuilder::new();
        if env.legacy_mode {
            builder.append(TlvTag::LegacyMode, &LEGACY_MODE_NFC_PING)?;
        }
        builder.append(TlvTag::SessionKeyA, &self.session_key_a)?;

        let p2 = match self.mode {
            EncryptionMode::Strong => EncryptionMode::Strong,
            EncryptionMode::None | EncryptionMode::Fast => EncryptionMode::Fast,
        };
        Ok(CommandApdu::with_tlv(ins::OPEN_SESSION, builder.tlvs()).with_p2(p2.as_byte()))
    }

    pub(crate) fn deserialize(apdu: &ResponseApdu) -> Result<OpenSessionResponse> {
        let tlvs = apdu.tlv_data().ok_or(Error::DeserializeApduFailed)?;
        let decoder = TlvDecoder::new(&tlvs);
        Ok(OpenSessionResponse {
            session_key_b: decoder.decode(TlvTag::SessionKeyB)?,
            uid: decoder.decode_optional(TlvTag::Uid)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use coldtap_apdu_core::{StatusWord, Tlv};

    use super::*;

    #[test]
    fn test_serialize() {
        let env = SessionEnvironment::default();
        let apdu = OpenSessionCommand::new(EncryptionMode::Strong, vec![0xAA; 4])
            .serialize(&env)
            .unwrap();
        assert_eq!(hex::encode_upper(apdu.to_bytes()), "00FF00020000061A04AAAAAAAA");

        let apdu = OpenSessionCommand::new(EncryptionMode::Fast, vec![0xAA; 4])
            .serialize(&env)
            .unwrap();
        assert_eq!(apdu.p2(), 0x01);
        assert_eq!(apdu.p1(), 0x00);
    }

    fn completed(payload: Bytes) -> ResponseApdu {
        ResponseApdu::with_status(payload, StatusWord::ProcessCompleted)
    }

    #[test]
    fn test_deserialize() {
        let payload = Tlv::serialize_all(&[
            Tlv::new(TlvTag::SessionKeyB, vec![0x02; 16]),
            Tlv::new(TlvTag::Uid, vec![0x04, 0x11, 0x22]),
        ]);
        let response = OpenSessionCommand::deserialize(&completed(payload)).unwrap();
        assert_eq!(response.session_key_b.as_ref(), &[0x02; 16]);
        assert_eq!(response.uid.as_deref(), Some(&[0x04, 0x11, 0x22][..]));

        let payload = Tlv::serialize_all(&[Tlv::new(TlvTag::SessionKeyB, vec![0x02; 16])]);
        let response = OpenSessionCommand::deserialize(&completed(payload)).unwrap();
        assert_eq!(response.uid, None);

        assert_eq!(
            OpenSessionCommand::deserialize(&completed(Bytes::new())),
            Err(Error::DeserializeApduFailed)
        );
    }
}
