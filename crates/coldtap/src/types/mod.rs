mod card;
mod filter;
mod firmware;

pub use card::{Card, CardSettings, Issuer, Manufacturer, Wallet};
pub use filter::{CardFilter, ItemFilter};
pub use firmware::{FirmwareType, FirmwareVersion};

#[cfg(test)]
pub(crate) use card::tests::{READ_RESPONSE, read_response_tlvs};
