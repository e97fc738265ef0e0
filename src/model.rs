//! Wire shapes returned by the guild message search endpoint.
//!
//! Every field carries a serde default so partially populated records (older
//! messages, system messages, embeds without a footer) still decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of search results.
///
/// `messages` is a list of context groups: the remote returns each hit
/// surrounded by neighbouring messages, flagged through [`Message::hit`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub analytics_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Vec<Message>>,
}

impl SearchPage {
    /// A page with no groups marks the end of pagination, whatever
    /// `total_results` claims.
    pub fn is_exhausted(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub author: Author,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mentions: Vec<Author>,
    #[serde(default)]
    pub mention_roles: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub proxy_url: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<EmbedAuthor>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default)]
    pub footer: Option<EmbedFooter>,
    #[serde(default)]
    pub thumbnail: Option<EmbedMedia>,
    #[serde(default)]
    pub video: Option<EmbedMedia>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub proxy_icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub proxy_icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedMedia {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"{
        "total_results": 2,
        "analytics_id": "abc",
        "messages": [[
            {
                "id": "100",
                "channel_id": "c1",
                "author": {
                    "id": "u1",
                    "username": "someone",
                    "discriminator": "0001",
                    "avatar": null,
                    "bot": false
                },
                "content": "hello",
                "timestamp": "2018-03-14T12:00:00.000000+00:00",
                "edited_timestamp": null,
                "attachments": [{
                    "id": "a1",
                    "url": "https://cdn.example/a1/cat.png",
                    "proxy_url": "https://media.example/a1/cat.png",
                    "filename": "cat.png",
                    "size": 1024,
                    "width": 64,
                    "height": 48
                }],
                "embeds": [{
                    "type": "rich",
                    "description": "d",
                    "fields": [{"name": "n", "value": "v"}]
                }],
                "mentions": [],
                "mention_roles": [],
                "pinned": false,
                "mention_everyone": false,
                "tts": false,
                "type": 0,
                "hit": true
            }
        ]]
    }"#;

    #[test]
    fn test_decode_search_page() {
        let page: SearchPage = serde_json::from_str(SAMPLE_PAGE).unwrap();
        assert_eq!(page.total_results, 2);
        assert!(!page.is_exhausted());

        let msg = &page.messages[0][0];
        assert_eq!(msg.id, "100");
        assert_eq!(msg.author.id, "u1");
        assert_eq!(msg.timestamp.timestamp(), 1521028800);
        assert!(msg.edited_timestamp.is_none());
        assert_eq!(msg.hit, Some(true));
        assert_eq!(msg.attachments[0].filename, "cat.png");
        assert_eq!(msg.attachments[0].width, Some(64));
        assert_eq!(msg.embeds[0].fields[0].value, "v");
    }

    #[test]
    fn test_total_results_does_not_mean_more_pages() {
        let page: SearchPage =
            serde_json::from_str(r#"{"total_results": 500, "messages": []}"#).unwrap();
        assert!(page.is_exhausted());
    }

    #[test]
    fn test_offset_timestamps_normalize_to_utc() {
        let raw = r#"{"id": "1", "channel_id": "c", "author": {"id": "u"},
                      "timestamp": "2020-01-01T02:00:00+02:00"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.timestamp.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert!(msg.attachments.is_empty());
    }
}
