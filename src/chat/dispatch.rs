//! Routes chat events to the indexing and query pipelines and builds the
//! replies posted back to the channel.

use crate::chat::events::{ChatEvent, ChatReply, SharedFile};
use crate::config::ChatConfig;
use crate::error::{ChatragError, Result};
use crate::service::RagService;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use std::sync::Arc;

/// Fetches the bytes of a shared file from the chat platform.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn fetch(&self, file: &SharedFile) -> Result<Vec<u8>>;
}

/// Reads base64 contents carried inside the event itself.
pub struct InlineFileSource;

#[async_trait]
impl FileSource for InlineFileSource {
    async fn fetch(&self, file: &SharedFile) -> Result<Vec<u8>> {
        let encoded = file
            .content_base64
            .as_deref()
            .ok_or_else(|| ChatragError::InvalidInput("file has no inline content".to_string()))?;
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| ChatragError::InvalidInput(format!("invalid base64 content: {}", e)))
    }
}

pub struct ChatDispatcher {
    service: Arc<RagService>,
    files: Arc<dyn FileSource>,
    mention: Option<Regex>,
    reset_keyword: String,
}

impl ChatDispatcher {
    pub fn new(service: Arc<RagService>, files: Arc<dyn FileSource>, config: &ChatConfig) -> Result<Self> {
        let mention = match config.bot_user_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => Some(
                Regex::new(&format!(r"<@{}>", regex::escape(id)))
                    .map_err(|e| ChatragError::Config(format!("Invalid bot user id: {}", e)))?,
            ),
            None => {
                log::warn!("chat.bot_user_id not set; the reset command is disabled");
                None
            }
        };

        // An empty keyword would match every mention
        let reset_keyword = config.reset_keyword.trim().to_lowercase();
        if reset_keyword.is_empty() {
            return Err(ChatragError::Config(
                "chat.reset_keyword must not be empty".to_string(),
            ));
        }

        Ok(Self {
            service,
            files,
            mention,
            reset_keyword,
        })
    }

    /// Handle one event, returning the replies to post (possibly none).
    pub async fn handle(&self, event: &ChatEvent) -> Vec<ChatReply> {
        match event {
            ChatEvent::FileShare { files, .. } => self.handle_files(event, files).await,
            ChatEvent::Message {
                text,
                bot_id,
                subtype,
                ..
            } => {
                if bot_id.is_some() || subtype.is_some() {
                    return Vec::new();
                }
                self.handle_message(event, text).await.into_iter().collect()
            }
        }
    }

    async fn handle_files(&self, event: &ChatEvent, files: &[SharedFile]) -> Vec<ChatReply> {
        let channel = Some(event.channel_id());
        let mut replies = Vec::new();

        for file in files {
            let Some(descriptor) = file.descriptor() else {
                log::debug!("Skipping shared file without an id");
                continue;
            };
            if self.service.is_indexed(&descriptor.id) {
                log::debug!("Skipping `{}`: already indexed", descriptor.display_name());
                continue;
            }
            let name = descriptor.display_name().to_string();

            let bytes = match self.files.fetch(file).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Could not download `{}`: {}", name, e);
                    replies.push(ChatReply::to_event(
                        event,
                        format!("❌ Could not download `{}`: {}", name, e),
                    ));
                    continue;
                }
            };

            let text = match self.service.index_file(bytes, &descriptor, channel).await {
                Ok(ids) if !ids.is_empty() => {
                    format!("✅ Saved `{}` and indexed {} chunks.", name, ids.len())
                }
                // Empty extraction leaves the id unmarked; a lost dedup race finds it marked
                Ok(_) if self.service.is_indexed(&descriptor.id) => {
                    format!("ℹ️ `{}` is already indexed.", name)
                }
                Ok(_) => format!("⚠️ No extractable text in `{}`; nothing was indexed.", name),
                Err(e) => {
                    log::error!("{}", e);
                    format!("❌ Failed to process `{}`: {}", name, e.root())
                }
            };
            replies.push(ChatReply::to_event(event, text));
        }

        replies
    }

    async fn handle_message(&self, event: &ChatEvent, text: &str) -> Option<ChatReply> {
        let mentioned = self.mention.as_ref().is_some_and(|re| re.is_match(text));

        if mentioned && text.trim().to_lowercase().ends_with(&self.reset_keyword) {
            let removed = self.service.delete_all().await;
            return Some(ChatReply::to_event(
                event,
                format!("✅ Deleted all embeddings ({} chunks removed).", removed),
            ));
        }

        let question = match &self.mention {
            Some(re) => re.replace_all(text, "").trim().to_string(),
            None => text.trim().to_string(),
        };
        if question.is_empty() {
            return None;
        }

        let reply = match self
            .service
            .answer(&question, Some(event.channel_id()), None)
            .await
        {
            Ok(answer) => answer.answer,
            Err(e) => {
                log::error!("{}", e);
                format!("❌ Error answering: {}", e.root())
            }
        };
        Some(ChatReply::to_event(event, reply))
    }
}
