pub mod discord;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PlatformResult;

/// Top-level container owning channels and threads. Threads are listed per guild.
#[derive(Debug, Clone, PartialEq)]
pub struct Guild {
    pub id: u64,
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Text, announcement or voice-text channel
    Text,
    /// Public, private or announcement thread
    Thread,
    /// Categories, forums, stages: nothing to fetch messages from
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: u64,
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn holds_messages(&self) -> bool {
        matches!(self.kind, ChannelKind::Text | ChannelKind::Thread)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadVisibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub emoji: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub content_type: Option<String>,
}

/// A message as seen by the preview pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub content: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub reactions: Vec<Reaction>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Embed {
    pub description: Option<String>,
    pub color: u32,
    pub author: Option<Author>,
    pub footer_text: Option<String>,
    pub footer_icon_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Vec<EmbedField>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Buttons attached under a preview.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkButtons {
    /// Custom id of the button that reveals the link privately
    pub reveal_custom_id: String,
    /// URL of the direct-link button
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub file: Option<FileUpload>,
    pub buttons: Option<LinkButtons>,
    pub ephemeral: bool,
}

impl OutgoingMessage {
    /// A short text-only notice visible only to the requester.
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ephemeral: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryTarget {
    /// Reply to the message that contained the link
    Reply { channel_id: u64, message_id: u64 },
    /// Follow-up to a deferred slash command
    Followup { interaction_token: String },
}

/// Everything the preview pipeline needs from the chat platform.
/// Every call is fallible and independent of the others.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn guild(&self, guild_id: u64) -> PlatformResult<Guild>;

    /// Local cache first, then a remote fetch.
    async fn channel(&self, channel_id: u64) -> PlatformResult<Channel>;

    async fn message(&self, channel: &Channel, message_id: u64) -> PlatformResult<Message>;

    async fn active_threads(&self, guild: &Guild) -> PlatformResult<Vec<Channel>>;

    async fn archived_threads(
        &self,
        guild: &Guild,
        visibility: ThreadVisibility,
        limit: u64,
    ) -> PlatformResult<Vec<Channel>>;

    async fn download(&self, url: &str) -> PlatformResult<Vec<u8>>;

    async fn send(&self, target: &DeliveryTarget, message: OutgoingMessage) -> PlatformResult<()>;
}
