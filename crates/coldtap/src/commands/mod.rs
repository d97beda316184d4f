//! Card commands

mod create_wallet;
mod open_session;
mod purge_wallet;
mod read;

pub use create_wallet::{CreateWalletCommand, CreateWalletResponse};
pub(crate) use open_session::OpenSessionCommand;
pub use purge_wallet::{PurgeWalletCommand, PurgeWalletResponse};
pub use read::ReadCommand;
