use async_trait::async_trait;

use crate::environment::UserCodeKind;

/// User interface hooks driven by a card session.
///
/// Every notification defaults to a no-op; only user code entry must be provided.
#[async_trait]
pub trait SessionDelegate: Send + Sync {
    /// The session started polling
    fn session_started(&self) {}

    /// The session ended
    fn session_stopped(&self) {}

    /// A tag entered the field
    fn tag_connected(&self) {}

    /// The tag left the field
    fn tag_lost(&self) {}

    /// A card other than the expected one was tapped
    fn wrong_card(&self, _message: &str) {}

    /// The card is counting down its security delay
    fn show_security_delay(&self, _remaining_ms: u32) {}

    /// Progress of a long running operation
    fn show_progress(&self, _percent: u8) {}

    /// The card answered and the result is being processed
    fn show_undefined_spinner(&self) {}

    /// Ask the user for a code. `None` means the user cancelled.
    async fn request_user_code(&self, kind: UserCodeKind) -> Option<String>;
}
