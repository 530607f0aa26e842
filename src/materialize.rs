use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::platform::{MediaKind, MessageRecord};
use crate::workspace::Workspace;

/// Downloads remote attachments into the workspace and rewrites message text
/// so the agent can find them.
pub struct Materializer {
    client: reqwest::Client,
    workspace: Arc<dyn Workspace>,
}

impl Materializer {
    pub fn new(workspace: Arc<dyn Workspace>, fetch_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, workspace })
    }

    /// Fetch `url` once and store it in the workspace under a fresh
    /// `<uuid><extension>` name, which is returned.
    pub async fn materialize(&self, url: &str, extension: &str) -> Result<String> {
        let local_id = format!("{}{}", Uuid::new_v4(), extension);

        debug!("Fetching attachment into {}", local_id);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to fetch attachment")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Attachment download failed with status {}", status);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read attachment body")?;

        self.workspace
            .write_file(&local_id, &bytes)
            .await
            .with_context(|| format!("Failed to write {} to workspace", local_id))?;

        info!("Materialized attachment as {} ({} bytes)", local_id, bytes.len());
        Ok(local_id)
    }

    /// Materialize the record's attachment, if it has one, and fold the result
    /// into its text. Records without attachments are returned unchanged.
    pub async fn annotate(&self, mut record: MessageRecord) -> Result<MessageRecord> {
        let (kind, url) = match record.attachment() {
            Some((kind, url)) => (kind, url.to_string()),
            None => return Ok(record),
        };
        let extension = record.file_ext.clone().unwrap_or_default();

        let local_id = self
            .materialize(&url, &extension)
            .await
            .with_context(|| format!("Failed to upload {}", kind_noun(kind)))?;

        // Download URLs embed the bot token; keep them out of the text.
        record.voice_url = None;
        record.image_url = None;
        record.file_ext = None;
        let original =
            serde_json::to_string(&record).context("Failed to serialize original message")?;
        record.text = annotation(kind, &local_id, &original);
        Ok(record)
    }
}

fn kind_noun(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Voice => "voice file",
        MediaKind::Image => "image file",
    }
}

/// Text handed to the agent in place of the original message body.
pub fn annotation(kind: MediaKind, local_id: &str, original: &str) -> String {
    format!(
        "<INFO>This message contains {} which you can find in the workspace at {}<INFO>\n<MESSAGE>{}</MESSAGE>",
        kind.describe(),
        local_id,
        original
    )
}
