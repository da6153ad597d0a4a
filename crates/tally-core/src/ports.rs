use async_trait::async_trait;

use crate::{domain::Chatter, Result};

/// Outbound side of the chat platform.
///
/// Twitch Helix is the first implementation; the shape is narrow on purpose so
/// tests can substitute a capture transport and the engine never holds a lock
/// across one of these calls.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver one line of text to the channel.
    async fn send(&self, text: &str) -> Result<()>;

    /// Current participant list for the channel.
    async fn fetch_chatters(&self) -> Result<Vec<Chatter>>;
}
