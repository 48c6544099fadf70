use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::PreviewConfig;
use crate::grid::{self, GridImage, MAX_TILES};
use crate::links::MessageLink;
use crate::platform::{Attachment, Author, Platform, Reaction};
use crate::resolver::ResolvedLocation;

pub const NO_CONTENT: &str = "*[No content]*";

/// Attachment kind derived from its declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentClass {
    Image,
    Video,
    Other,
}

impl AttachmentClass {
    pub fn of(content_type: Option<&str>) -> Self {
        let content_type = content_type.unwrap_or_default();
        if content_type.starts_with("image/") {
            AttachmentClass::Image
        } else if content_type.starts_with("video/") {
            AttachmentClass::Video
        } else {
            AttachmentClass::Other
        }
    }

    pub fn of_attachment(attachment: &Attachment) -> Self {
        Self::of(attachment.content_type.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImagePresentation {
    None,
    /// Single image shown directly in the main embed
    Inline(String),
    /// First image inline, the rest as image-only embeds
    Extra { first: String, rest: Vec<String> },
    /// Composited grid uploaded as a file
    Grid(GridImage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseDescription {
    pub text: String,
    pub author: Author,
    pub footer_text: String,
    pub footer_icon_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Everything needed to render one preview.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewPayload {
    pub base: BaseDescription,
    pub color: u32,
    pub reactions: Vec<Reaction>,
    pub attachment_names: Option<String>,
    pub video_links: Option<String>,
    pub images: ImagePresentation,
    /// Link the interactive buttons point to
    pub controls: Option<MessageLink>,
}

impl PreviewPayload {
    /// `emoji count` pairs joined by spaces, in platform order.
    pub fn reaction_summary(&self) -> Option<String> {
        if self.reactions.is_empty() {
            return None;
        }
        Some(
            self.reactions
                .iter()
                .map(|r| format!("{} {}", r.emoji, r.count))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

pub struct PreviewComposer<'a> {
    platform: &'a dyn Platform,
    config: &'a PreviewConfig,
}

impl<'a> PreviewComposer<'a> {
    pub fn new(platform: &'a dyn Platform, config: &'a PreviewConfig) -> Self {
        Self { platform, config }
    }

    pub async fn compose(&self, resolved: &ResolvedLocation, link: &MessageLink) -> PreviewPayload {
        let message = &resolved.message;

        let mut images = Vec::new();
        let mut videos = Vec::new();
        let mut others = Vec::new();
        for attachment in &message.attachments {
            match AttachmentClass::of_attachment(attachment) {
                AttachmentClass::Image => images.push(attachment),
                AttachmentClass::Video => {
                    videos.push(attachment);
                    others.push(attachment);
                }
                AttachmentClass::Other => others.push(attachment),
            }
        }

        let text = if message.content.is_empty() {
            NO_CONTENT.to_string()
        } else {
            message.content.clone()
        };
        let display_name = if message.author.display_name.is_empty() {
            "Unknown".to_string()
        } else {
            message.author.display_name.clone()
        };

        let base = BaseDescription {
            text,
            author: Author {
                display_name,
                avatar_url: message.author.avatar_url.clone(),
            },
            footer_text: format!("#{} | {}", resolved.channel.name, resolved.guild.name),
            footer_icon_url: resolved.guild.icon_url.clone(),
            timestamp: message.timestamp,
        };

        let attachment_names = (!others.is_empty()).then(|| {
            others
                .iter()
                .map(|a| a.filename.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        });

        let video_links = (!videos.is_empty()).then(|| {
            videos
                .iter()
                .take(self.config.max_videos)
                .map(|v| format!("[Video]({})", v.url))
                .collect::<Vec<_>>()
                .join("\n")
        });

        let image_urls: Vec<&str> = images
            .iter()
            .take(self.config.max_images.min(MAX_TILES))
            .map(|a| a.url.as_str())
            .collect();

        PreviewPayload {
            base,
            color: self.config.embed_color,
            reactions: message.reactions.clone(),
            attachment_names,
            video_links,
            images: self.present_images(&image_urls).await,
            controls: self.config.show_buttons.then_some(*link),
        }
    }

    async fn present_images(&self, urls: &[&str]) -> ImagePresentation {
        match urls {
            [] => ImagePresentation::None,
            [only] => ImagePresentation::Inline(only.to_string()),
            [first, rest @ ..] => {
                match grid::compose_grid(self.platform, urls, self.config.tile_size).await {
                    Ok(grid) => ImagePresentation::Grid(grid),
                    Err(e) => {
                        debug!(error = %e, "failed to compose grid image");
                        ImagePresentation::Extra {
                            first: first.to_string(),
                            rest: rest.iter().map(|u| u.to_string()).collect(),
                        }
                    }
                }
            }
        }
    }
}
