use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, MessageId, ReplyParameters};
use tracing::{debug, info};

use super::{ChatSender, FileResolver, InboundEvent, MediaKind, MediaRef, ResolvedFile, Sender};
use crate::inbound::Listener;

/// Check the bot credential and return the bot's username.
pub async fn verify(bot: &Bot) -> Result<String> {
    let me = bot
        .get_me()
        .await
        .context("Failed to create bot: Telegram rejected the token")?;
    Ok(me.username().to_string())
}

/// Run the Telegram update loop until the update stream ends.
///
/// Updates are handled one at a time, in arrival order. Returning at all is
/// an error: the relay has lost its source.
pub async fn run(bot: Bot, listener: Arc<Listener>) -> Result<()> {
    info!("Starting Telegram listener...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![listener])
        .distribution_function(|_| Some(()))
        .default_handler(|upd| async move {
            debug!("Ignoring non-message update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    anyhow::bail!("Telegram update stream ended")
}

async fn handle_message(msg: Message, listener: Arc<Listener>) -> ResponseResult<()> {
    listener.handle(event_from_message(&msg)).await;
    Ok(())
}

/// Reduce a Telegram message to a platform-neutral event. Captions stand in
/// for text on media messages; for photos the first size offered is used.
fn event_from_message(msg: &Message) -> InboundEvent {
    let sender = msg.from.as_ref().map(|user| Sender {
        id: user.id.0,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    });

    let media = if let Some(voice) = msg.voice() {
        Some(MediaRef {
            kind: MediaKind::Voice,
            file_id: voice.file.id.to_string(),
        })
    } else {
        msg.photo()
            .and_then(|sizes| sizes.first())
            .map(|photo| MediaRef {
                kind: MediaKind::Image,
                file_id: photo.file.id.to_string(),
            })
    };

    InboundEvent {
        sender,
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        media,
    }
}

#[async_trait]
impl FileResolver for Bot {
    async fn resolve(&self, file_id: &str) -> Result<ResolvedFile> {
        let file = self
            .get_file(FileId(file_id.to_string()))
            .await
            .context("Failed to get file info from Telegram")?;

        // https://api.telegram.org/file/bot<token>/<file_path>
        let url = self
            .api_url()
            .join(&format!("file/bot{}/{}", self.token(), file.path))
            .context("Failed to build file download URL")?;

        Ok(ResolvedFile {
            url: url.to_string(),
            path: file.path,
        })
    }
}

#[async_trait]
impl ChatSender for Bot {
    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<()> {
        let mut request = self.send_message(ChatId(chat_id), text);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(id)));
        }
        request.await.context("Failed to send message")?;
        Ok(())
    }
}
