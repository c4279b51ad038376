//! Data models for Discord gateway messages and REST payloads

use serde::{Deserialize, Serialize};

/// Author of a Discord message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// A message delivered by the gateway's `MESSAGE_CREATE` dispatch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Rich preview Discord generated for a link in the message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Embed {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<EmbedMedia>,
    #[serde(default)]
    pub thumbnail: Option<EmbedMedia>,
}

/// Image or thumbnail block inside an embed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbedMedia {
    #[serde(default)]
    pub url: String,
}

/// File uploaded alongside a message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: u64,
}

/// Body of `POST /channels/{id}/messages`
#[derive(Debug, Serialize)]
pub struct CreateMessage<'a> {
    pub content: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_message_with_previews() {
        let payload = json!({
            "id": "1",
            "channel_id": "42",
            "guild_id": "7",
            "author": { "id": "99", "username": "someone" },
            "content": "https://x.com/user/status/1",
            "embeds": [{
                "type": "rich",
                "url": "https://x.com/user/status/1",
                "thumbnail": { "url": "https://pbs.twimg.com/media/a.jpg", "width": 400 }
            }],
            "attachments": [{
                "id": "5",
                "filename": "clip.mp4",
                "url": "https://cdn.discordapp.com/attachments/clip.mp4",
                "size": 1024
            }]
        });

        let message: Message = serde_json::from_value(payload).unwrap();
        assert_eq!(message.channel_id, "42");
        assert!(!message.author.bot);
        assert_eq!(message.embeds[0].kind.as_deref(), Some("rich"));
        assert_eq!(
            message.embeds[0].thumbnail.as_ref().map(|t| t.url.as_str()),
            Some("https://pbs.twimg.com/media/a.jpg")
        );
        assert!(message.embeds[0].image.is_none());
        assert_eq!(message.attachments[0].filename, "clip.mp4");
        assert_eq!(message.attachments[0].size, 1024);
    }

    #[test]
    fn missing_optional_fields_default() {
        let payload = json!({
            "id": "1",
            "channel_id": "42",
            "author": { "id": "99" }
        });

        let message: Message = serde_json::from_value(payload).unwrap();
        assert!(message.content.is_empty());
        assert!(message.embeds.is_empty());
        assert!(message.attachments.is_empty());
        assert!(message.guild_id.is_none());
    }
}
