use crate::ingest::FileDescriptor;
use serde::{Deserialize, Serialize};

/// An event delivered by the chat platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// One or more files uploaded to a channel
    FileShare {
        channel_id: String,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        ts: Option<String>,
        #[serde(default)]
        thread_ts: Option<String>,
        #[serde(default)]
        files: Vec<SharedFile>,
    },
    /// A plain text message
    Message {
        channel_id: String,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        text: String,
        #[serde(default)]
        ts: Option<String>,
        #[serde(default)]
        thread_ts: Option<String>,
        /// Set when another bot (or this one) posted the message
        #[serde(default)]
        bot_id: Option<String>,
        #[serde(default)]
        subtype: Option<String>,
    },
}

impl ChatEvent {
    pub fn channel_id(&self) -> &str {
        match self {
            Self::FileShare { channel_id, .. } | Self::Message { channel_id, .. } => channel_id,
        }
    }

    /// Thread to reply into: the event's thread, else the event itself.
    pub fn reply_thread(&self) -> Option<&str> {
        match self {
            Self::FileShare { ts, thread_ts, .. } | Self::Message { ts, thread_ts, .. } => {
                thread_ts.as_deref().or(ts.as_deref())
            }
        }
    }
}

/// A file attached to a [`ChatEvent::FileShare`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SharedFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "mimetype")]
    pub media_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Base64 file contents, for transports that inline the bytes
    #[serde(default)]
    pub content_base64: Option<String>,
}

impl SharedFile {
    /// Descriptor for indexing, or `None` when the platform sent no id.
    pub fn descriptor(&self) -> Option<FileDescriptor> {
        let id = self.id.as_deref().filter(|id| !id.trim().is_empty())?;
        Some(FileDescriptor {
            id: id.to_string(),
            media_type: self.media_type.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
        })
    }
}

/// A message to post back to the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub text: String,
}

impl ChatReply {
    pub fn to_event(event: &ChatEvent, text: impl Into<String>) -> Self {
        Self {
            channel_id: event.channel_id().to_string(),
            thread_ts: event.reply_thread().map(String::from),
            text: text.into(),
        }
    }
}
