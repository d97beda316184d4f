//! Session configuration

use std::time::Duration;

use crate::secure_channel::EncryptionMode;
use crate::types::CardFilter;

/// Pause before polling restarts after a wrong card was tapped
pub const DEFAULT_WRONG_CARD_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Configuration for a card session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Run pre-checks, after-check error remapping and user code prompts
    pub handle_errors: bool,

    /// Append the legacy-mode TLV to every command, for readers that drop long
    /// running commands
    pub legacy_mode: bool,

    /// Send the terminal public key in `Read` so the card can link the terminal
    pub linked_terminal: bool,

    /// Encryption mode a session starts with
    pub default_encryption_mode: EncryptionMode,

    /// Pause before polling restarts after a wrong card was tapped
    pub wrong_card_retry_delay: Duration,

    /// Cards accepted after the preflight read
    pub filter: CardFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            handle_errors: true,
            legacy_mode: false,
            linked_terminal: false,
            default_encryption_mode: EncryptionMode::None,
            wrong_card_retry_delay: DEFAULT_WRONG_CARD_RETRY_DELAY,
            filter: CardFilter::default(),
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the engine handles errors
    pub const fn with_handle_errors(mut self, handle_errors: bool) -> Self {
        self.handle_errors = handle_errors;
        self
    }

    /// Set legacy mode
    pub const fn with_legacy_mode(mut self, legacy_mode: bool) -> Self {
        self.legacy_mode = legacy_mode;
        self
    }

    /// Set whether the terminal key is sent in `Read`
    pub const fn with_linked_terminal(mut self, linked_terminal: bool) -> Self {
        self.linked_terminal = linked_terminal;
        self
    }

    /// Set the initial encryption mode
    pub const fn with_default_encryption_mode(mut self, mode: EncryptionMode) -> Self {
        self.default_encryption_mode = mode;
        self
    }

    /// Set the wrong card retry delay
    pub const fn with_wrong_card_retry_delay(mut self, delay: Duration) -> Self {
        self.wrong_card_retry_delay = delay;
        self
    }

    /// Set the card filter
    pub fn with_filter(mut self, filter: CardFilter) -> Self {
        self.filter = filter;
        self
    }
}
