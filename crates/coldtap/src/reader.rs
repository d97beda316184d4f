//! Proximity reader abstraction
//!
//! A reader moves raw byte buffers to and from a tag and reports tag presence.
//! It knows nothing about apdu structure, encryption or status words.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Tag presence change reported by a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    /// A tag entered the field
    Connected(Bytes),
    /// The tag left the field
    Disconnected,
}

/// Trait for proximity readers
///
/// Failures are reported as [`Error::TagLost`], [`Error::Timeout`],
/// [`Error::ReaderError`] or [`Error::UserCancelled`] and are forwarded by the
/// session without interpretation.
#[async_trait]
pub trait Reader: Send + Sync + fmt::Debug {
    /// Start polling for a tag
    async fn open(&self) -> Result<()>;

    /// End the proximity session, showing `message` if the platform supports it
    async fn stop_session(&self, message: Option<&str>);

    /// End the proximity session because of `error`
    async fn stop_session_with_error(&self, error: &Error) {
        self.stop_session(Some(&error.to_string())).await;
    }

    /// Drop the current tag and poll for a fresh activation
    async fn restart_polling(&self);

    /// Subscribe to tag presence changes. Dropping the sender ends the session.
    fn subscribe(&self) -> broadcast::Receiver<TagEvent>;

    /// Whether the reader can still poll
    fn is_ready(&self) -> bool;

    /// Identifier of the tag currently in the field
    fn tag_id(&self) -> Option<Bytes>;

    /// Send raw command bytes and return the raw response
    async fn transmit(&self, command: &[u8]) -> Result<Bytes> {
        trace!(command = %hex::encode(command), "transmit");
        let result = self.do_transmit(command).await;
        match &result {
            Ok(response) => trace!(response = %hex::encode(response), "receive"),
            Err(error) => debug!(%error, "reader error during transmission"),
        }
        result
    }

    /// Internal implementation of [`transmit`](Self::transmit)
    async fn do_transmit(&self, command: &[u8]) -> Result<Bytes>;
}
