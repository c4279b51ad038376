use std::sync::Arc;

use tracing::{debug, error, info};

use crate::models::Message;
use crate::preview::has_sufficient_preview;
use crate::rewriter::{contains_status_link, find_status_links, rewrite_links};
use crate::traits::MessageSink;

/// What the bot did with one incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Own message, no link, escaped link or nothing to change
    Ignored,
    /// Discord already shows platform media for the link
    PreviewPresent,
    /// A reply was attempted with this content
    Replied(String),
}

#[derive(Clone)]
pub struct LinkFixer {
    sink: Arc<dyn MessageSink>,
    bot_user_id: Option<String>,
}

impl LinkFixer {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            sink,
            bot_user_id: None,
        }
    }

    /// Records the bot's own user id once the gateway reports it.
    pub fn set_bot_user_id(&mut self, user_id: String) {
        self.bot_user_id = Some(user_id);
    }

    /// Handles a single message. Delivery failures are logged, not returned.
    pub async fn handle_message(&self, message: &Message) -> Outcome {
        if self.bot_user_id.as_deref() == Some(message.author.id.as_str()) {
            return Outcome::Ignored;
        }

        debug!(
            "Message {} from {} (bot: {}) in guild {:?}",
            message.id, message.author.username, message.author.bot, message.guild_id
        );

        if message.content == "hello" {
            return self.reply(&message.channel_id, "world!").await;
        }

        if !contains_status_link(&message.content) {
            return Outcome::Ignored;
        }

        for embed in &message.embeds {
            debug!(
                "Embed on {}: type {:?}, title {:?}, description {:?}",
                message.id, embed.kind, embed.title, embed.description
            );
        }
        for attachment in &message.attachments {
            debug!(
                "Attachment on {}: {} ({} bytes)",
                message.id, attachment.filename, attachment.size
            );
        }

        if has_sufficient_preview(&message.embeds, &message.attachments) {
            debug!(
                "Message {} already has a working preview; skipping",
                message.id
            );
            return Outcome::PreviewPresent;
        }

        let rewritten = rewrite_links(&message.content);
        if rewritten == message.content {
            debug!("Message {} only holds escaped links", message.id);
            return Outcome::Ignored;
        }

        for link in find_status_links(&message.content)
            .iter()
            .filter(|link| !link.escaped)
        {
            info!(
                "Rewriting {} status {} to {}",
                link.domain.host(),
                link.id,
                link.mirror_url()
            );
        }

        self.reply(&message.channel_id, &rewritten).await
    }

    async fn reply(&self, channel_id: &str, content: &str) -> Outcome {
        if let Err(e) = self.sink.send_message(channel_id, content).await {
            error!("Error sending message to channel {}: {:#}", channel_id, e);
        }
        Outcome::Replied(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, Embed, EmbedMedia, User};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_message(&self, channel_id: &str, content: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), content.to_string()));
            if self.fail {
                return Err(anyhow!("503 Service Unavailable"));
            }
            Ok(())
        }
    }

    fn message(author_id: &str, content: &str) -> Message {
        Message {
            id: "m-1".to_string(),
            channel_id: "c-1".to_string(),
            author: User {
                id: author_id.to_string(),
                ..User::default()
            },
            content: content.to_string(),
            ..Message::default()
        }
    }

    fn fixer() -> (LinkFixer, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let mut fixer = LinkFixer::new(sink.clone());
        fixer.set_bot_user_id("bot".to_string());
        (fixer, sink)
    }

    #[tokio::test]
    async fn replies_with_rewritten_link() {
        let (fixer, sink) = fixer();
        let outcome = fixer
            .handle_message(&message("u", "Check out https://twitter.com/user/status/123456"))
            .await;

        let expected = "Check out https://fxtwitter.com/user/status/123456";
        assert_eq!(outcome, Outcome::Replied(expected.to_string()));
        assert_eq!(sink.sent(), vec![("c-1".to_string(), expected.to_string())]);
    }

    #[tokio::test]
    async fn media_attachment_suppresses_reply() {
        let (fixer, sink) = fixer();
        let mut msg = message("u", "https://x.com/user/status/1");
        msg.attachments.push(Attachment {
            filename: "a.jpg".to_string(),
            url: "https://pbs.twimg.com/media/a.jpg".to_string(),
            size: 100,
        });

        assert_eq!(fixer.handle_message(&msg).await, Outcome::PreviewPresent);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn placeholder_thumbnail_still_gets_reply() {
        let (fixer, sink) = fixer();
        let mut msg = message("u", "https://x.com/user/status/1");
        msg.embeds.push(Embed {
            thumbnail: Some(EmbedMedia {
                url: "https://pbs.twimg.com/tweet_video_thumb/a.jpg".to_string(),
            }),
            ..Embed::default()
        });

        assert_eq!(
            fixer.handle_message(&msg).await,
            Outcome::Replied("https://fixupx.com/user/status/1".to_string())
        );
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn link_card_without_media_still_gets_reply() {
        let (fixer, sink) = fixer();
        let mut msg = message("u", "https://twitter.com/user/status/5");
        msg.embeds.push(Embed {
            kind: Some("link".to_string()),
            title: Some("user on X".to_string()),
            description: Some("a post".to_string()),
            url: Some("https://twitter.com/user/status/5".to_string()),
            ..Embed::default()
        });
        msg.attachments.push(Attachment {
            filename: "notes.txt".to_string(),
            url: "https://cdn.discordapp.com/attachments/1/2/notes.txt".to_string(),
            size: 12,
        });

        assert_eq!(
            fixer.handle_message(&msg).await,
            Outcome::Replied("https://fxtwitter.com/user/status/5".to_string())
        );
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn ignores_own_messages() {
        let (fixer, sink) = fixer();
        let outcome = fixer
            .handle_message(&message("bot", "https://x.com/user/status/1"))
            .await;
        assert_eq!(outcome, Outcome::Ignored);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn escaped_link_is_not_reposted() {
        let (fixer, sink) = fixer();
        let outcome = fixer
            .handle_message(&message(
                "u",
                "Don't modify this: <https://twitter.com/user/status/123456>",
            ))
            .await;
        assert_eq!(outcome, Outcome::Ignored);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn plain_text_is_ignored() {
        let (fixer, sink) = fixer();
        let outcome = fixer.handle_message(&message("u", "good morning")).await;
        assert_eq!(outcome, Outcome::Ignored);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn answers_hello() {
        let (fixer, sink) = fixer();
        let outcome = fixer.handle_message(&message("u", "hello")).await;
        assert_eq!(outcome, Outcome::Replied("world!".to_string()));
        assert_eq!(sink.sent()[0].1, "world!");
    }

    #[tokio::test]
    async fn delivery_failure_does_not_stop_later_messages() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let fixer = LinkFixer::new(sink.clone());

        fixer
            .handle_message(&message("u", "https://x.com/a/status/1"))
            .await;
        fixer
            .handle_message(&message("u", "https://x.com/b/status/2"))
            .await;

        assert_eq!(sink.sent().len(), 2);
    }
}
