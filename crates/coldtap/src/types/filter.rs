use std::collections::HashSet;

use super::{card::Card, firmware::FirmwareType};
use crate::{Error, Result};

/// Allow or deny list over identifiers. Matching ignores ASCII case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFilter {
    /// Only the listed items pass
    Allow(HashSet<String>),
    /// Everything except the listed items passes
    Deny(HashSet<String>),
}

impl ItemFilter {
    /// Allow list over `items`
    pub fn allow<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Allow(normalize(items))
    }

    /// Deny list over `items`
    pub fn deny<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Deny(normalize(items))
    }

    /// Whether `item` passes the filter
    pub fn is_allowed(&self, item: &str) -> bool {
        let item = item.to_ascii_uppercase();
        match self {
            Self::Allow(items) => items.contains(&item),
            Self::Deny(items) => !items.contains(&item),
        }
    }
}

fn normalize<I, S>(items: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().to_ascii_uppercase())
        .collect()
}

/// Restricts which cards a session accepts after the preflight read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFilter {
    /// Firmware flavours accepted
    pub allowed_card_types: Vec<FirmwareType>,
    /// Card id filter
    pub card_id_filter: Option<ItemFilter>,
    /// Batch id filter
    pub batch_id_filter: Option<ItemFilter>,
    /// Issuer name filter
    pub issuer_filter: Option<ItemFilter>,
}

impl Default for CardFilter {
    fn default() -> Self {
        Self {
            allowed_card_types: vec![FirmwareType::Release, FirmwareType::Sdk],
            card_id_filter: None,
            batch_id_filter: None,
            issuer_filter: None,
        }
    }
}

impl CardFilter {
    /// Check `card` against every configured filter
    pub fn verify(&self, card: &Card) -> Result<()> {
        if !self.allowed_card_types.contains(&card.firmware_version.kind) {
            return Err(Error::WrongCardType);
        }

        let checks = [
            (&self.batch_id_filter, card.batch_id.as_str()),
            (&self.issuer_filter, card.issuer.name.as_str()),
            (&self.card_id_filter, card.card_id.as_str()),
        ];
        for (filter, item) in checks {
            if filter.as_ref().is_some_and(|filter| !filter.is_allowed(item)) {
                return Err(Error::WrongCardType);
            }
        }

        Ok(())
    }
}
