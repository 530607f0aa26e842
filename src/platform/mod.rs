pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message moving through the relay, in either direction.
///
/// Inbound records are built by the listener and drained by the poll
/// endpoint; outbound records are parsed from `/send` request bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "msgId", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "voiceURL", default, skip_serializing_if = "Option::is_none")]
    pub voice_url: Option<String>,
    #[serde(rename = "imageURL", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "fileExt", default, skip_serializing_if = "Option::is_none")]
    pub file_ext: Option<String>,
}

impl MessageRecord {
    /// The pending attachment, if any. Voice takes precedence over image.
    pub fn attachment(&self) -> Option<(MediaKind, &str)> {
        if let Some(url) = self.voice_url.as_deref() {
            return Some((MediaKind::Voice, url));
        }
        self.image_url
            .as_deref()
            .map(|url| (MediaKind::Image, url))
    }
}

/// Identity of whoever sent an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Sender {
    /// Display string carried on records, e.g. `Ada Lovelace (ada)`.
    pub fn display(&self) -> String {
        format!(
            "{} {} ({})",
            self.first_name,
            self.last_name.as_deref().unwrap_or_default(),
            self.username.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Voice,
    Image,
}

impl MediaKind {
    /// Noun phrase used in the attachment annotation.
    pub fn describe(self) -> &'static str {
        match self {
            MediaKind::Voice => "a voice file",
            MediaKind::Image => "an image file",
        }
    }
}

/// Platform file handle that still has to be resolved to a download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
}

/// A platform message reduced to what the relay cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: Option<Sender>,
    pub chat_id: i64,
    pub message_id: i32,
    pub text: Option<String>,
    pub media: Option<MediaRef>,
}

/// A file resolved through the platform's file API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub url: String,
    /// Path of the file on the platform side; its extension names the artifact.
    pub path: String,
}

#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve(&self, file_id: &str) -> Result<ResolvedFile>;
}

/// Outbound half of the platform: deliver a text message to a chat.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<()>;
}
