/// Instruction bytes understood by the card
pub mod ins {
    /// Read card data
    pub const READ: u8 = 0xF2;
    /// Create a wallet
    pub const CREATE_WALLET: u8 = 0xF8;
    /// Purge a wallet
    pub const PURGE_WALLET: u8 = 0xFC;
    /// Open an encrypted session
    pub const OPEN_SESSION: u8 = 0xFF;
}

/// Access code a card ships with
pub const DEFAULT_ACCESS_CODE: &str = "000000";

/// Passcode a card ships with
pub const DEFAULT_PASSCODE: &str = "000";

/// Legacy-mode TLV value: keep the NFC module pinged during long operations
pub const LEGACY_MODE_NFC_PING: u8 = 4;

/// Rounds of PBKDF2 stretching the access code into the session key
pub const SESSION_KEY_PBKDF2_ROUNDS: u32 = 50;
