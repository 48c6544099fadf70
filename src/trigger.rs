//! Entry points deciding when the preview pipeline runs.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::PreviewConfig;
use crate::delivery;
use crate::error::PlatformError;
use crate::links::{extract_links, MessageLink};
use crate::platform::{DeliveryTarget, OutgoingMessage, Platform};
use crate::preview::PreviewComposer;
use crate::resolver::MessageResolver;

pub const INVALID_LINK: &str = "Invalid message link.";
pub const NOT_FOUND: &str = "Message not found.";
pub const DELIVERY_FAILED: &str = "Something went wrong while sending the preview.";

/// An inbound text message, as far as passive scanning cares.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub channel_id: u64,
    pub message_id: u64,
    pub author_is_bot: bool,
    pub content: String,
}

#[derive(Debug)]
enum PreviewError {
    NotFound,
    Delivery(PlatformError),
}

/// `true` when the message starts with a mention of the bot followed by a space.
pub fn starts_with_mention(content: &str, bot_id: u64) -> bool {
    content.starts_with(&format!("<@{bot_id}> ")) || content.starts_with(&format!("<@!{bot_id}> "))
}

/// The link a `/preview` argument points to, if it holds one.
pub fn command_link(argument: &str) -> Option<MessageLink> {
    extract_links(argument).next()
}

/// Runs resolution, composition and delivery for one trigger.
/// Holds no mutable state, so concurrent triggers share it freely.
pub struct PreviewService {
    platform: Arc<dyn Platform>,
    config: PreviewConfig,
}

impl PreviewService {
    pub fn new(platform: Arc<dyn Platform>, config: PreviewConfig) -> Self {
        Self { platform, config }
    }

    /// Passive scanning. Only messages that open with a mention of the bot
    /// are considered; each link gets its own reply, one after another.
    /// Returns how many previews were delivered.
    pub async fn handle_message(&self, message: &IncomingMessage, bot_id: Option<u64>) -> usize {
        if message.author_is_bot {
            return 0;
        }
        let Some(bot_id) = bot_id else {
            debug!("bot identity not known yet, skipping message scan");
            return 0;
        };
        if !starts_with_mention(&message.content, bot_id) {
            return 0;
        }

        let target = DeliveryTarget::Reply {
            channel_id: message.channel_id,
            message_id: message.message_id,
        };

        // Collected up front so no matcher state is held across awaits
        let links: Vec<MessageLink> = extract_links(&message.content).collect();

        let mut delivered = 0;
        for link in links {
            match self.preview(&link, &target).await {
                Ok(()) => delivered += 1,
                Err(PreviewError::NotFound) => {
                    warn!(
                        "Message {} not found in channel/thread {} (guild {})",
                        link.message_id, link.channel_id, link.guild_id
                    );
                }
                Err(PreviewError::Delivery(e)) => {
                    debug!(error = %e, "passive preview dropped");
                }
            }
        }
        delivered
    }

    /// On-demand `/preview` command. Always produces exactly one follow-up:
    /// the preview or a short notice.
    pub async fn handle_command(&self, argument: &str, interaction_token: &str) {
        let target = DeliveryTarget::Followup {
            interaction_token: interaction_token.to_string(),
        };

        let link = command_link(argument);
        let Some(link) = link else {
            self.notify(&target, INVALID_LINK).await;
            return;
        };

        match self.preview(&link, &target).await {
            Ok(()) => {}
            Err(PreviewError::NotFound) => {
                warn!(
                    "Message {} not found in channel/thread {} (guild {})",
                    link.message_id, link.channel_id, link.guild_id
                );
                self.notify(&target, NOT_FOUND).await;
            }
            Err(PreviewError::Delivery(e)) => {
                debug!(error = %e, "reporting failed delivery to requester");
                self.notify(&target, DELIVERY_FAILED).await;
            }
        }
    }

    /// Text of the private response to the "Open original message" button.
    pub fn handle_reveal(&self, custom_id: &str) -> Option<String> {
        MessageLink::from_custom_id(custom_id).map(|link| link.url())
    }

    async fn preview(&self, link: &MessageLink, target: &DeliveryTarget) -> Result<(), PreviewError> {
        let platform = self.platform.as_ref();

        let resolver = MessageResolver::new(platform, self.config.archived_thread_limit);
        let resolved = resolver.resolve(link).await.ok_or(PreviewError::NotFound)?;
        debug!(
            message_id = link.message_id,
            stage = resolved.stage.label(),
            "composing preview"
        );

        let payload = PreviewComposer::new(platform, &self.config)
            .compose(&resolved, link)
            .await;

        delivery::deliver(platform, payload, target)
            .await
            .map_err(PreviewError::Delivery)
    }

    async fn notify(&self, target: &DeliveryTarget, text: &str) {
        if let Err(e) = self.platform.send(target, OutgoingMessage::notice(text)).await {
            error!(error = %e, "failed to send notice");
        }
    }
}
