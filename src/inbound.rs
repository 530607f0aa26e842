use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::auth::AllowList;
use crate::platform::{FileResolver, InboundEvent, MediaKind, MessageRecord};
use crate::relay::RelayQueue;

/// Turns platform events into relay records and enqueues them.
///
/// Attachments are only resolved to their download URL here; fetching them
/// into the workspace happens when the agent polls.
pub struct Listener {
    allow_list: Arc<AllowList>,
    queue: Arc<RelayQueue>,
    files: Arc<dyn FileResolver>,
}

impl Listener {
    pub fn new(
        allow_list: Arc<AllowList>,
        queue: Arc<RelayQueue>,
        files: Arc<dyn FileResolver>,
    ) -> Self {
        Self {
            allow_list,
            queue,
            files,
        }
    }

    /// Process one event. Failures drop this event only.
    pub async fn handle(&self, event: InboundEvent) {
        let chat_id = event.chat_id;
        match self.normalize(event).await {
            Ok(Some(record)) => self.queue.enqueue(record).await,
            Ok(None) => {}
            Err(e) => error!("Dropping message in chat {}: {:#}", chat_id, e),
        }
    }

    /// Build the record for `event`, or `None` if it should be skipped.
    pub async fn normalize(&self, event: InboundEvent) -> Result<Option<MessageRecord>> {
        if !self.allow_list.is_authorized(event.sender.as_ref()) {
            match &event.sender {
                Some(sender) => warn!(
                    "Unauthorized user: id={} username={}",
                    sender.id,
                    sender.username.as_deref().unwrap_or("-")
                ),
                None => warn!("Unauthorized message without sender in chat {}", event.chat_id),
            }
            return Ok(None);
        }

        if event.text.is_none() && event.media.is_none() {
            debug!("Skipping message {} with no text or media", event.message_id);
            return Ok(None);
        }

        let mut record = MessageRecord {
            user: event.sender.as_ref().map(|s| s.display()),
            chat_id: event.chat_id.to_string(),
            msg_id: Some(event.message_id.to_string()),
            text: event.text.unwrap_or_default(),
            ..Default::default()
        };
        info!(
            "Received a message in chat {} from {}",
            record.chat_id,
            record.user.as_deref().unwrap_or("-")
        );

        if let Some(media) = event.media {
            let file = self
                .files
                .resolve(&media.file_id)
                .await
                .with_context(|| format!("Failed to get {:?} URL", media.kind))?;
            record.file_ext = Some(file_extension(&file.path));
            match media.kind {
                MediaKind::Voice => record.voice_url = Some(file.url),
                MediaKind::Image => record.image_url = Some(file.url),
            }
        }

        Ok(Some(record))
    }
}

/// Extension of `path` including the leading dot, or empty if it has none.
fn file_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}
