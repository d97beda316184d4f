use coldtap_apdu_core::prelude::*;

use crate::command::{Command, append_passcode, base_payload, require_card};
use crate::constants::ins;
use crate::environment::SessionEnvironment;
use crate::types::{Card, FirmwareVersion, Wallet};
use crate::{Error, Result};

/// Result of [`CreateWalletCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWalletResponse {
    /// Card that created the wallet
    pub card_id: String,
    /// The new wallet
    pub wallet: Wallet,
}

/// Generate a wallet key pair on the card in the first free slot
#[derive(Debug, Clone, Copy)]
pub struct CreateWalletCommand {
    curve: EllipticCurve,
    signing_method: SigningMethod,
}

impl CreateWalletCommand {
    /// Create a wallet on `curve`
    pub const fn new(curve: EllipticCurve) -> Self {
        Self {
            curve,
            signing_method: SigningMethod::SIGN_HASH,
        }
    }

    /// First slot without a wallet
    fn wallet_index(card: &Card) -> Result<u8> {
        let max = card.settings.max_wallets;
        (0..max)
            .find(|index| card.wallet(*index).is_none())
            .ok_or(if max == 1 {
                Error::AlreadyCreated
            } else {
                Error::MaxNumberOfWalletsCreated
            })
    }
}

impl Command for CreateWalletCommand {
    type Response = CreateWalletResponse;

    fn name(&self) -> &'static str {
        "create_wallet"
    }

    fn requires_passcode(&self) -> bool {
        true
    }

    fn pre_check(&self, card: &Card) -> Result<()> {
        if !card.supported_curves.contains(&self.curve) {
            return Err(Error::UnsupportedCurve);
        }

        if !card.firmware_version.is_at_least(FirmwareVersion::MULTIWALLET_AVAILABLE) {
            if let Some(methods) = card.settings.default_signing_methods {
                if !methods.contains(self.signing_method) {
                    return Err(Error::UnsupportedWalletConfig);
                }
            }
        }

        Self::wallet_index(card).map(|_| ())
    }

    fn after_check(&self, card: Option<&Card>, error: Error) -> Error {
        let Some(card) = card else { return error };
        match error {
            Error::InvalidParams
                if card.firmware_version.is_at_least(FirmwareVersion::PASSCODE_STATUS_AVAILABLE)
                    && card.is_passcode_set == Some(false) =>
            {
                Error::AlreadyCreated
            }
            other => other,
        }
    }

    fn serialize(&self, env: &SessionEnvironment) -> Result<CommandApdu> {
        let card = require_card(env)?;

        let mut builder = base_payload(env)?;
        append_passcode(&mut builder, env)?;
        builder
            .append(TlvTag::CardId, card.card_id.as_str())?
            .append_optional(TlvTag::Cvc, env.cvc.as_ref())?;

        if card.firmware_version.is_at_least(FirmwareVersion::MULTIWALLET_AVAILABLE) {
            // Recent cards apply their own reusable setting and ignore this one.
            builder
                .append(TlvTag::SettingsMask, &SettingsMask::IS_REUSABLE)?
                .append(TlvTag::CurveId, &self.curve)?
                .append(TlvTag::SigningMethod, &self.signing_method)?
                .append(TlvTag::WalletIndex, &Self::wallet_index(card)?)?;
        }

        Ok(CommandApdu::with_tlv(ins::CREATE_WALLET, builder.tlvs()))
    }

    fn deserialize(&self, env: &SessionEnvironment, apdu: &ResponseApdu) -> Result<Self::Response> {
        let card = require_card(env)?;
        let tlvs = apdu.tlv_data().ok_or(Error::DeserializeApduFailed)?;
        let decoder = TlvDecoder::new(&tlvs);

        let multiwallet = card.firmware_version.is_at_least(FirmwareVersion::MULTIWALLET_AVAILABLE);
        let (index, remaining_signatures) = if multiwallet {
            let index = match decoder.decode_optional(TlvTag::WalletIndex)? {
                Some(index) => index,
                None => Self::wallet_index(card)?,
            };
            (index, None)
        } else {
            (0, card.remaining_signatures)
        };

        Ok(CreateWalletResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
            wallet: Wallet {
                public_key: decoder.decode(TlvTag::WalletPublicKey)?,
                curve: self.curve,
                index,
                total_signed_hashes: Some(0),
                remaining_signatures,
            },
        })
    }

    fn on_success(&self, env: &mut SessionEnvironment, response: &Self::Response) {
        if let Some(card) = env.card.as_mut() {
            card.wallets.retain(|wallet| wallet.index != response.wallet.index);
            card.wallets.push(response.wallet.clone());
            card.wallets.sort_by_key(|wallet| wallet.index);
            card.status = CardStatus::Loaded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::read_response_tlvs;

    fn legacy_card() -> Card {
        Card::deserialize(&read_response_tlvs()).unwrap()
    }

    fn multiwallet_card() -> Card {
        let mut card = legacy_card();
        card.firmware_version = FirmwareVersion::parse("4.52r");
        card.settings.max_wallets = 3;
        card.supported_curves = EllipticCurve::ALL.to_vec();
        card.is_passcode_set = Some(false);
        card.wallets.clear();
        card.status = CardStatus::Empty;
        card
    }

    fn env_with(card: Card) -> SessionEnvironment {
        let mut env = SessionEnvironment::default();
        env.card = Some(card);
        env
    }

    #[test]
    fn test_pre_check() {
        let command = CreateWalletCommand::new(EllipticCurve::Secp256k1);
        assert_eq!(command.pre_check(&legacy_card()), Err(Error::AlreadyCreated));

        let mut card = legacy_card();
        card.wallets.clear();
        assert_eq!(command.pre_check(&card), Ok(()));

        let ed25519 = CreateWalletCommand::new(EllipticCurve::Ed25519);
        assert_eq!(ed25519.pre_check(&card), Err(Error::UnsupportedCurve));

        card.settings.default_signing_methods = Some(SigningMethod::SIGN_RAW);
        assert_eq!(command.pre_check(&card), Err(Error::UnsupportedWalletConfig));
    }

    #[test]
    fn test_wallet_index() {
        let mut card = multiwallet_card();
        assert_eq!(CreateWalletCommand::wallet_index(&card), Ok(0));

        for index in [0, 2] {
            card.wallets.push(Wallet {
                public_key: Bytes::from_static(&[0x04]),
                curve: EllipticCurve::Secp256k1,
                index,
                total_signed_hashes: None,
                remaining_signatures: None,
            });
        }
        assert_eq!(CreateWalletCommand::wallet_index(&card), Ok(1));

        card.wallets[0].index = 1;
        card.wallets.push(Wallet { index: 0, ..card.wallets[0].clone() });
        assert_eq!(
            CreateWalletCommand::wallet_index(&card),
            Err(Error::MaxNumberOfWalletsCreated)
        );
    }

    #[test]
    fn test_serialize() {
        let command = CreateWalletCommand::new(EllipticCurve::Secp256r1);
        assert_eq!(
            command.serialize(&SessionEnvironment::default()).map(|_| ()),
            Err(Error::MissingPreflightRead)
        );

        let mut env = env_with(multiwallet_card());
        env.cvc = Some(Bytes::from_static(b"123"));
        let apdu = command.serialize(&env).unwrap();
        assert_eq!(apdu.ins(), 0xF8);

        let tlvs = Tlv::parse_all(apdu.payload()).unwrap();
        let decoder = TlvDecoder::new(&tlvs);
        assert_eq!(decoder.decode::<String>(TlvTag::CardId).unwrap(), "FF00000000000111");
        assert!(decoder.decode::<Bytes>(TlvTag::Pin2).is_ok());
        assert_eq!(decoder.decode::<Bytes>(TlvTag::Cvc).unwrap().as_ref(), b"123");
        assert_eq!(
            decoder.decode::<EllipticCurve>(TlvTag::CurveId).unwrap(),
            EllipticCurve::Secp256r1
        );
        assert_eq!(decoder.decode::<u8>(TlvTag::WalletIndex).unwrap(), 0);
        assert_eq!(
            decoder.decode::<SigningMethod>(TlvTag::SigningMethod).unwrap(),
            SigningMethod::SIGN_HASH
        );

        // Legacy cards take no wallet parameters.
        let mut card = legacy_card();
        card.wallets.clear();
        let apdu = command.serialize(&env_with(card)).unwrap();
        let tlvs = Tlv::parse_all(apdu.payload()).unwrap();
        assert!(tlvs.item(TlvTag::WalletIndex).is_none());
        assert!(tlvs.item(TlvTag::CurveId).is_none());
    }

    #[test]
    fn test_deserialize_and_update_card() {
        let command = CreateWalletCommand::new(EllipticCurve::Secp256k1);
        let mut env = env_with(multiwallet_card());

        let payload = Tlv::serialize_all(&[
            Tlv::encode(TlvTag::CardId, "FF00000000000111").unwrap(),
            Tlv::new(TlvTag::WalletPublicKey, vec![0x04; 65]),
            Tlv::new(TlvTag::WalletIndex, vec![0x00]),
        ]);
        let response = command
            .deserialize(&env, &ResponseApdu::with_status(payload, StatusWord::ProcessCompleted))
            .unwrap();
        assert_eq!(response.card_id, "FF00000000000111");
        assert_eq!(response.wallet.index, 0);
        assert_eq!(response.wallet.public_key.len(), 65);

        command.on_success(&mut env, &response);
        let card = env.card.as_ref().unwrap();
        assert_eq!(card.status, CardStatus::Loaded);
        assert_eq!(card.wallets, vec![response.wallet]);
    }

    #[test]
    fn test_legacy_response_keeps_remaining_signatures() {
        let command = CreateWalletCommand::new(EllipticCurve::Secp256k1);
        let mut card = legacy_card();
        card.wallets.clear();
        let env = env_with(card);

        let payload = Tlv::serialize_all(&[
            Tlv::encode(TlvTag::CardId, "FF00000000000111").unwrap(),
            Tlv::new(TlvTag::WalletPublicKey, vec![0x04; 65]),
        ]);
        let response = command
            .deserialize(&env, &ResponseApdu::with_status(payload, StatusWord::ProcessCompleted))
            .unwrap();
        assert_eq!(response.wallet.index, 0);
        assert_eq!(response.wallet.remaining_signatures, Some(100));
    }

    #[test]
    fn test_after_check() {
        let command = CreateWalletCommand::new(EllipticCurve::Secp256k1);
        let card = multiwallet_card();
        assert_eq!(
            command.after_check(Some(&card), Error::InvalidParams),
            Error::AlreadyCreated
        );
        assert_eq!(command.after_check(None, Error::InvalidParams), Error::InvalidParams);
        assert_eq!(
            command.after_check(Some(&legacy_card()), Error::InvalidParams),
            Error::InvalidParams
        );
    }
}
