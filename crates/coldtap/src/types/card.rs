use bytes::Bytes;
use coldtap_apdu_core::prelude::*;

use super::firmware::FirmwareVersion;
use crate::{Error, Result};

/// Card snapshot built from the read response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Unique card identifier, upper-case hex
    pub card_id: String,
    /// Production batch, upper-case hex
    pub batch_id: String,
    /// Card public key
    pub card_public_key: Bytes,
    /// Firmware version
    pub firmware_version: FirmwareVersion,
    /// Manufacturer details
    pub manufacturer: Manufacturer,
    /// Issuer details
    pub issuer: Issuer,
    /// Settings fixed at personalization
    pub settings: CardSettings,
    /// Whether the current terminal is linked to the card
    pub linked_terminal: bool,
    /// Whether a non-default passcode is set. Only known for firmware 4.1 and newer.
    pub is_passcode_set: Option<bool>,
    /// Curves accepted for new wallets
    pub supported_curves: Vec<EllipticCurve>,
    /// Wallets on the card, ordered by index
    pub wallets: Vec<Wallet>,
    /// Card health indicator
    pub health: Option<u8>,
    /// Remaining signatures of a legacy card
    pub remaining_signatures: Option<u32>,
    /// Lifecycle status
    pub status: CardStatus,
}

/// Card manufacturer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manufacturer {
    /// Manufacturer name
    pub name: String,
    /// Manufacture date
    pub manufacture_date: ManufactureDate,
    /// Manufacturer signature over the card id
    pub signature: Option<Bytes>,
}

/// Card issuer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    /// Issuer name
    pub name: String,
    /// Issuer public key
    pub public_key: Bytes,
}

/// Settings fixed at personalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSettings {
    /// Delay before sensitive operations, in milliseconds
    pub security_delay_ms: u32,
    /// Number of wallet slots
    pub max_wallets: u8,
    /// Settings bitmask
    pub mask: SettingsMask,
    /// Signing methods allowed by default
    pub default_signing_methods: Option<SigningMethod>,
    /// Curve of the legacy wallet
    pub default_curve: Option<EllipticCurve>,
}

impl CardSettings {
    /// Whether wallets may be purged
    pub const fn is_purge_allowed(&self) -> bool {
        !self.mask.contains(SettingsMask::PROHIBIT_PURGE_WALLET)
    }
}

/// A wallet key pair held by the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    /// Wallet public key
    pub public_key: Bytes,
    /// Curve of the key
    pub curve: EllipticCurve,
    /// Slot index
    pub index: u8,
    /// Number of hashes signed so far
    pub total_signed_hashes: Option<u32>,
    /// Signatures left on a legacy card
    pub remaining_signatures: Option<u32>,
}

impl Card {
    /// Wallet stored at `index`
    pub fn wallet(&self, index: u8) -> Option<&Wallet> {
        self.wallets.iter().find(|wallet| wallet.index == index)
    }

    /// Whether the read response carries the wallet list.
    ///
    /// Multi-wallet firmware leaves [`Card::wallets`] empty after a read, so an
    /// empty list does not mean the slots are free.
    pub fn lists_wallets(&self) -> bool {
        !self.firmware_version.is_at_least(FirmwareVersion::MULTIWALLET_AVAILABLE)
    }

    /// Whether the card has a single wallet slot
    pub const fn is_single_wallet(&self) -> bool {
        self.settings.max_wallets <= 1
    }

    /// Build the snapshot from a decrypted read response
    pub fn deserialize(tlvs: &[Tlv]) -> Result<Self> {
        let decoder = TlvDecoder::new(tlvs);

        let status: CardStatus = decoder.decode(TlvTag::Status)?;
        match status {
            CardStatus::NotPersonalized => return Err(Error::NotPersonalized),
            CardStatus::Purged => return Err(Error::WalletIsPurged),
            CardStatus::Empty | CardStatus::Loaded => {}
        }
        if decoder.decode::<bool>(TlvTag::IsActivated)? {
            return Err(Error::NotActivated);
        }

        let card_data = decoder
            .nested(TlvTag::CardData)
            .ok_or(Error::DeserializeApduFailed)?;
        let card_data = TlvDecoder::new(&card_data);

        let firmware_version = FirmwareVersion::parse(&decoder.decode::<String>(TlvTag::FirmwareVersion)?);
        let mask: SettingsMask = decoder.decode(TlvTag::SettingsMask)?;
        let multiwallet = firmware_version.is_at_least(FirmwareVersion::MULTIWALLET_AVAILABLE);

        let is_passcode_set = if firmware_version.is_at_least(FirmwareVersion::PASSCODE_STATUS_AVAILABLE) {
            Some(!decoder.decode::<bool>(TlvTag::Pin2IsDefault)?)
        } else {
            None
        };

        let default_curve: Option<EllipticCurve> = decoder.decode_optional(TlvTag::CurveId)?;
        let supported_curves = if multiwallet {
            EllipticCurve::ALL.to_vec()
        } else {
            default_curve.into_iter().collect()
        };

        let mut wallets = Vec::new();
        let mut remaining_signatures = None;
        if !multiwallet && status == CardStatus::Loaded {
            let curve = default_curve.ok_or(coldtap_apdu_core::Error::MissingTag(TlvTag::CurveId))?;
            remaining_signatures = decoder.decode_optional(TlvTag::WalletRemainingSignatures)?;
            wallets.push(Wallet {
                public_key: decoder.decode(TlvTag::WalletPublicKey)?,
                curve,
                index: 0,
                total_signed_hashes: decoder.decode_optional(TlvTag::WalletSignedHashes)?,
                remaining_signatures,
            });
        }

        let manufacturer = Manufacturer {
            name: decoder.decode(TlvTag::ManufacturerName)?,
            manufacture_date: card_data.decode(TlvTag::ManufactureDateTime)?,
            signature: card_data.decode_optional(TlvTag::CardIdManufacturerSignature)?,
        };

        let issuer = Issuer {
            name: card_data.decode(TlvTag::IssuerName)?,
            public_key: decoder.decode(TlvTag::IssuerPublicKey)?,
        };

        let security_delay: Option<u16> = decoder.decode_optional(TlvTag::PauseBeforePin2)?;
        let settings = CardSettings {
            security_delay_ms: security_delay.map_or(0, |delay| u32::from(delay) * 10),
            // Cards without the tag always have exactly one slot.
            max_wallets: decoder.decode_optional(TlvTag::WalletsCount)?.unwrap_or(1),
            mask,
            default_signing_methods: decoder.decode_optional(TlvTag::SigningMethod)?,
            default_curve,
        };

        Ok(Self {
            card_id: decoder.decode(TlvTag::CardId)?,
            batch_id: card_data.decode(TlvTag::BatchId)?,
            card_public_key: decoder.decode(TlvTag::CardPublicKey)?,
            firmware_version,
            manufacturer,
            issuer,
            settings,
            linked_terminal: decoder.decode(TlvTag::IsLinked)?,
            is_passcode_set,
            supported_curves,
            wallets,
            health: decoder.decode_optional(TlvTag::Health)?,
            remaining_signatures,
            status,
        })
    }
}
