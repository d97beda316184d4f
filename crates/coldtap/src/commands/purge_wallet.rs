use coldtap_apdu_core::prelude::*;

use crate::command::{Command, append_passcode, base_payload, require_card};
use crate::constants::ins;
use crate::environment::SessionEnvironment;
use crate::types::{Card, FirmwareVersion};
use crate::{Error, Result};

/// Result of [`PurgeWalletCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeWalletResponse {
    /// Card that purged the wallet
    pub card_id: String,
}

/// Delete the wallet stored in a slot
#[derive(Debug, Clone, Copy)]
pub struct PurgeWalletCommand {
    wallet_index: u8,
}

impl PurgeWalletCommand {
    /// Purge the wallet at `wallet_index`
    pub const fn new(wallet_index: u8) -> Self {
        Self { wallet_index }
    }
}

impl Command for PurgeWalletCommand {
    type Response = PurgeWalletResponse;

    fn name(&self) -> &'static str {
        "purge_wallet"
    }

    fn requires_passcode(&self) -> bool {
        true
    }

    fn pre_check(&self, card: &Card) -> Result<()> {
        // Otherwise the card answers WalletNotFound itself.
        if card.lists_wallets() && card.wallet(self.wallet_index).is_none() {
            return Err(Error::WalletNotFound);
        }
        if !card.settings.is_purge_allowed() {
            return Err(Error::PurgeWalletProhibited);
        }
        Ok(())
    }

    fn serialize(&self, env: &SessionEnvironment) -> Result<CommandApdu> {
        let card = require_card(env)?;

        let mut builder = base_payload(env)?;
        append_passcode(&mut builder, env)?;
        builder.append(TlvTag::CardId, card.card_id.as_str())?;
        if card.firmware_version.is_at_least(FirmwareVersion::MULTIWALLET_AVAILABLE) {
            builder.append(TlvTag::WalletIndex, &self.wallet_index)?;
        }

        Ok(CommandApdu::with_tlv(ins::PURGE_WALLET, builder.tlvs()))
    }

    fn deserialize(&self, _env: &SessionEnvironment, apdu: &ResponseApdu) -> Result<Self::Response> {
        let tlvs = apdu.tlv_data().ok_or(Error::DeserializeApduFailed)?;
        Ok(PurgeWalletResponse {
            card_id: TlvDecoder::new(&tlvs).decode(TlvTag::CardId)?,
        })
    }

    fn on_success(&self, env: &mut SessionEnvironment, _response: &Self::Response) {
        if let Some(card) = env.card.as_mut() {
            card.wallets.retain(|wallet| wallet.index != self.wallet_index);
            if card.is_single_wallet() {
                card.status = CardStatus::Empty;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::read_response_tlvs;

    fn card() -> Card {
        Card::deserialize(&read_response_tlvs()).unwrap()
    }

    #[test]
    fn test_pre_check() {
        let mut card = card();
        assert_eq!(PurgeWalletCommand::new(0).pre_check(&card), Ok(()));
        assert_eq!(PurgeWalletCommand::new(1).pre_check(&card), Err(Error::WalletNotFound));

        card.settings.mask |= SettingsMask::PROHIBIT_PURGE_WALLET;
        assert_eq!(
            PurgeWalletCommand::new(0).pre_check(&card),
            Err(Error::PurgeWalletProhibited)
        );

        card.wallets.clear();
        assert_eq!(PurgeWalletCommand::new(0).pre_check(&card), Err(Error::WalletNotFound));
    }

    #[test]
    fn test_pre_check_multiwallet_card() {
        let mut tlvs = read_response_tlvs();
        tlvs.retain(|tlv| !matches!(tlv.tag, TlvTag::FirmwareVersion | TlvTag::WalletsCount));
        tlvs.push(Tlv::encode(TlvTag::FirmwareVersion, "4.52r").unwrap());
        tlvs.push(Tlv::encode(TlvTag::WalletsCount, &3u8).unwrap());

        let mut card = Card::deserialize(&tlvs).unwrap();
        assert_eq!(card.status, CardStatus::Loaded);
        assert!(card.wallets.is_empty());
        for index in 0..3 {
            assert_eq!(PurgeWalletCommand::new(index).pre_check(&card), Ok(()));
        }

        card.settings.mask |= SettingsMask::PROHIBIT_PURGE_WALLET;
        assert_eq!(
            PurgeWalletCommand::new(1).pre_check(&card),
            Err(Error::PurgeWalletProhibited)
        );
    }

    #[test]
    fn test_serialize() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card());

        let apdu = PurgeWalletCommand::new(0).serialize(&env).unwrap();
        assert_eq!(apdu.ins(), 0xFC);
        let tlvs = Tlv::parse_all(apdu.payload()).unwrap();
        assert!(tlvs.item(TlvTag::Pin2).is_some());
        assert!(tlvs.item(TlvTag::WalletIndex).is_none());

        if let Some(card) = env.card.as_mut() {
            card.firmware_version = FirmwareVersion::parse("4.12r");
        }
        let apdu = PurgeWalletCommand::new(0).serialize(&env).unwrap();
        let tlvs = Tlv::parse_all(apdu.payload()).unwrap();
        assert_eq!(TlvDecoder::new(&tlvs).decode::<u8>(TlvTag::WalletIndex).unwrap(), 0);
    }

    #[test]
    fn test_on_success_empties_single_wallet_card() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card());

        let command = PurgeWalletCommand::new(0);
        let payload = Tlv::serialize_all(&[Tlv::encode(TlvTag::CardId, "FF00000000000111").unwrap()]);
        let response = command
            .deserialize(&env, &ResponseApdu::with_status(payload, StatusWord::ProcessCompleted))
            .unwrap();
        assert_eq!(response.card_id, "FF00000000000111");

        command.on_success(&mut env, &response);
        let card = env.card.as_ref().unwrap();
        assert!(card.wallets.is_empty());
        assert_eq!(card.status, CardStatus::Empty);
    }
}
