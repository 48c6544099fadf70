//! In-memory platform double that records every call and every outgoing message.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use image::{ImageFormat, Rgba, RgbaImage};

use super::{
    Attachment, Author, Channel, ChannelKind, DeliveryTarget, Guild, Message, OutgoingMessage,
    Platform, ThreadVisibility,
};
use crate::error::{PlatformError, PlatformResult};

#[derive(Default)]
pub struct MockPlatform {
    guilds: HashMap<u64, Guild>,
    channels: HashMap<u64, Channel>,
    messages: HashMap<(u64, u64), Message>,
    active_threads: Vec<Channel>,
    public_archived: Vec<Channel>,
    private_archived: Vec<Channel>,
    failing_listings: HashSet<&'static str>,
    downloads: HashMap<String, Vec<u8>>,
    reject_sends: bool,
    reject_previews: bool,
    calls: Mutex<Vec<String>>,
    sent: Mutex<Vec<(DeliveryTarget, OutgoingMessage)>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guild(mut self, id: u64, name: &str) -> Self {
        self.guilds.insert(
            id,
            Guild {
                id,
                name: name.to_string(),
                icon_url: None,
            },
        );
        self
    }

    pub fn with_channel(mut self, id: u64, name: &str, kind: ChannelKind) -> Self {
        self.channels.insert(id, channel(id, name, kind));
        self
    }

    pub fn with_message(mut self, channel_id: u64, message: Message) -> Self {
        self.messages.insert((channel_id, message.id), message);
        self
    }

    pub fn with_active_thread(mut self, id: u64, name: &str) -> Self {
        self.active_threads.push(channel(id, name, ChannelKind::Thread));
        self
    }

    pub fn with_archived_thread(mut self, visibility: ThreadVisibility, id: u64, name: &str) -> Self {
        let thread = channel(id, name, ChannelKind::Thread);
        match visibility {
            ThreadVisibility::Public => self.public_archived.push(thread),
            ThreadVisibility::Private => self.private_archived.push(thread),
        }
        self
    }

    /// Make a listing fail: "active", "public" or "private".
    pub fn failing_listing(mut self, listing: &'static str) -> Self {
        self.failing_listings.insert(listing);
        self
    }

    pub fn with_download(mut self, url: &str, data: Vec<u8>) -> Self {
        self.downloads.insert(url.to_string(), data);
        self
    }

    pub fn rejecting_sends(mut self) -> Self {
        self.reject_sends = true;
        self
    }

    /// Reject only messages carrying embeds; plain notices still go through.
    pub fn rejecting_previews(mut self) -> Self {
        self.reject_previews = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn listed_threads(&self) -> bool {
        self.calls().iter().any(|c| c.ends_with("threads"))
    }

    pub fn sent(&self) -> Vec<(DeliveryTarget, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn listing(&self, name: &'static str, threads: &[Channel], limit: usize) -> PlatformResult<Vec<Channel>> {
        if self.failing_listings.contains(name) {
            return Err(PlatformError::PermissionDenied(format!("{name} threads")));
        }
        Ok(threads.iter().take(limit).cloned().collect())
    }
}

fn channel(id: u64, name: &str, kind: ChannelKind) -> Channel {
    Channel {
        id,
        name: name.to_string(),
        kind,
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn guild(&self, guild_id: u64) -> PlatformResult<Guild> {
        self.record(format!("guild:{guild_id}"));
        self.guilds
            .get(&guild_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("guild {guild_id}")))
    }

    async fn channel(&self, channel_id: u64) -> PlatformResult<Channel> {
        self.record(format!("channel:{channel_id}"));
        self.channels
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("channel {channel_id}")))
    }

    async fn message(&self, channel: &Channel, message_id: u64) -> PlatformResult<Message> {
        self.record(format!("message:{}:{message_id}", channel.id));
        if !channel.holds_messages() {
            return Err(PlatformError::Unsupported(format!("channel {}", channel.id)));
        }
        self.messages
            .get(&(channel.id, message_id))
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("message {message_id}")))
    }

    async fn active_threads(&self, _guild: &Guild) -> PlatformResult<Vec<Channel>> {
        self.record("active_threads".to_string());
        self.listing("active", &self.active_threads, usize::MAX)
    }

    async fn archived_threads(
        &self,
        _guild: &Guild,
        visibility: ThreadVisibility,
        limit: u64,
    ) -> PlatformResult<Vec<Channel>> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        match visibility {
            ThreadVisibility::Public => {
                self.record("public_archived_threads".to_string());
                self.listing("public", &self.public_archived, limit)
            }
            ThreadVisibility::Private => {
                self.record("private_archived_threads".to_string());
                self.listing("private", &self.private_archived, limit)
            }
        }
    }

    async fn download(&self, url: &str) -> PlatformResult<Vec<u8>> {
        self.record(format!("download:{url}"));
        self.downloads
            .get(url)
            .cloned()
            .ok_or_else(|| PlatformError::transient(format!("connection reset fetching {url}")))
    }

    async fn send(&self, target: &DeliveryTarget, message: OutgoingMessage) -> PlatformResult<()> {
        self.record("send".to_string());
        if self.reject_sends || (self.reject_previews && !message.embeds.is_empty()) {
            return Err(PlatformError::DeliveryRejected("Missing Permissions".to_string()));
        }
        self.sent.lock().unwrap().push((target.clone(), message));
        Ok(())
    }
}

pub fn text_message(id: u64, content: &str) -> Message {
    Message {
        id,
        content: content.to_string(),
        author: Author {
            display_name: "alice".to_string(),
            avatar_url: Some("https://cdn.example/avatar.png".to_string()),
        },
        timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        reactions: Vec::new(),
        attachments: Vec::new(),
    }
}

pub fn attachment(filename: &str, content_type: Option<&str>) -> Attachment {
    Attachment {
        filename: filename.to_string(),
        url: format!("https://cdn.example/{filename}"),
        content_type: content_type.map(str::to_string),
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}
