//! Traits and interfaces between the link fixer and the chat platform

use anyhow::Result;
use async_trait::async_trait;

/// Anything that can post a text message into a channel
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `content` to `channel_id`
    ///
    /// # Arguments
    /// * `channel_id` - Target channel snowflake
    /// * `content` - Message text
    ///
    /// # Returns
    /// * `Result<()>` - Error if the platform rejected or never received it
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<()>;
}
