use anyhow::Result;
use async_trait::async_trait;
use mirror_relay_core::utils::retry_transport_operation;
use mirror_relay_runtime::{Attachment, AttachmentFetcher};
use std::path::Path;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Extract the uploadable attachment of a message.
///
/// Documents and videos keep their own name; photos (largest size) are named
/// `photo.jpg`.
#[must_use]
pub fn pick_media(msg: &Message) -> Option<Attachment> {
    if let Some(doc) = msg.document() {
        return Some(Attachment {
            file_id: doc.file.id.0.clone(),
            filename: doc.file_name.clone().unwrap_or_else(|| "file".to_string()),
            size: Some(u64::from(doc.file.size)),
        });
    }
    if let Some(video) = msg.video() {
        return Some(Attachment {
            file_id: video.file.id.0.clone(),
            filename: video
                .file_name
                .clone()
                .unwrap_or_else(|| "video.mp4".to_string()),
            size: Some(u64::from(video.file.size)),
        });
    }
    let photo = msg.photo()?.last()?;
    Some(Attachment {
        file_id: photo.file.id.0.clone(),
        filename: "photo.jpg".to_string(),
        size: Some(u64::from(photo.file.size)),
    })
}

/// Downloads attachments through the Bot API file endpoint.
pub struct TelegramFetcher {
    bot: Bot,
}

impl TelegramFetcher {
    /// Create a fetcher bound to `bot`.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl AttachmentFetcher for TelegramFetcher {
    async fn fetch(&self, file_id: &str, dest: &Path) -> Result<()> {
        let file = retry_transport_operation(|| async {
            self.bot
                .get_file(FileId(file_id.to_string()))
                .await
                .map_err(|e| anyhow::anyhow!("Telegram getFile error: {e}"))
        })
        .await?;

        debug!(file_id = %file_id, path = %file.path, "Downloading attachment");
        let mut out = tokio::fs::File::create(dest).await?;
        self.bot.download_file(&file.path, &mut out).await?;
        out.flush().await?;
        Ok(())
    }
}
