use tracing::debug;

use crate::error::PlatformError;
use crate::links::MessageLink;
use crate::platform::{Channel, Guild, Message, Platform, ThreadVisibility};

/// Where a linked message was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub message: Message,
    /// The linked channel, or the thread the message turned up in
    pub channel: Channel,
    pub guild: Guild,
    pub stage: SearchStage,
}

/// Search stages, tried in declaration order until one finds the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    Direct,
    ActiveThreads,
    PublicArchivedThreads,
    PrivateArchivedThreads,
}

impl SearchStage {
    pub const ORDER: [SearchStage; 4] = [
        SearchStage::Direct,
        SearchStage::ActiveThreads,
        SearchStage::PublicArchivedThreads,
        SearchStage::PrivateArchivedThreads,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SearchStage::Direct => "direct",
            SearchStage::ActiveThreads => "active threads",
            SearchStage::PublicArchivedThreads => "public archived threads",
            SearchStage::PrivateArchivedThreads => "private archived threads",
        }
    }
}

enum StageOutcome {
    Found(Message, Channel),
    Missed,
    Failed(PlatformError),
}

pub struct MessageResolver<'a> {
    platform: &'a dyn Platform,
    archived_thread_limit: u64,
}

impl<'a> MessageResolver<'a> {
    pub fn new(platform: &'a dyn Platform, archived_thread_limit: u64) -> Self {
        Self {
            platform,
            archived_thread_limit,
        }
    }

    /// Locate the linked message. `None` means not found anywhere; no failure
    /// of an individual lookup escapes this call.
    pub async fn resolve(&self, link: &MessageLink) -> Option<ResolvedLocation> {
        let guild = match self.platform.guild(link.guild_id).await {
            Ok(guild) => guild,
            Err(e) => {
                debug!(guild_id = link.guild_id, error = %e, "guild not available");
                return None;
            }
        };

        // A missing top channel still leaves the thread stages to try
        let channel = match self.platform.channel(link.channel_id).await {
            Ok(channel) => Some(channel),
            Err(e) => {
                debug!(channel_id = link.channel_id, error = %e, "channel not available");
                None
            }
        };

        for stage in SearchStage::ORDER {
            match self.run_stage(stage, &guild, channel.as_ref(), link).await {
                StageOutcome::Found(message, channel) => {
                    debug!(
                        message_id = link.message_id,
                        channel_id = channel.id,
                        stage = stage.label(),
                        "resolved message"
                    );
                    return Some(ResolvedLocation {
                        message,
                        channel,
                        guild,
                        stage,
                    });
                }
                StageOutcome::Missed => {}
                StageOutcome::Failed(e) => {
                    debug!(
                        message_id = link.message_id,
                        stage = stage.label(),
                        error = %e,
                        "search stage failed"
                    );
                }
            }
        }

        None
    }

    async fn run_stage(
        &self,
        stage: SearchStage,
        guild: &Guild,
        channel: Option<&Channel>,
        link: &MessageLink,
    ) -> StageOutcome {
        let listing = match stage {
            SearchStage::Direct => {
                return match channel {
                    Some(channel) if channel.holds_messages() => {
                        match self.platform.message(channel, link.message_id).await {
                            Ok(message) => StageOutcome::Found(message, channel.clone()),
                            Err(e) => StageOutcome::Failed(e),
                        }
                    }
                    _ => StageOutcome::Missed,
                };
            }
            SearchStage::ActiveThreads => self.platform.active_threads(guild).await,
            SearchStage::PublicArchivedThreads => {
                self.platform
                    .archived_threads(guild, ThreadVisibility::Public, self.archived_thread_limit)
                    .await
            }
            SearchStage::PrivateArchivedThreads => {
                self.platform
                    .archived_threads(guild, ThreadVisibility::Private, self.archived_thread_limit)
                    .await
            }
        };

        match listing {
            Ok(threads) => {
                // The linked channel already had its direct attempt
                let direct_tried = channel.filter(|c| c.holds_messages()).map(|c| c.id);
                self.search_threads(threads, link.message_id, direct_tried)
                    .await
            }
            Err(e) => StageOutcome::Failed(e),
        }
    }

    async fn search_threads(
        &self,
        threads: Vec<Channel>,
        message_id: u64,
        skip: Option<u64>,
    ) -> StageOutcome {
        for thread in threads {
            if !thread.holds_messages() || Some(thread.id) == skip {
                continue;
            }
            match self.platform.message(&thread, message_id).await {
                Ok(message) => return StageOutcome::Found(message, thread),
                Err(PlatformError::NotFound(_)) => {}
                Err(e) => debug!(thread_id = thread.id, error = %e, "thread fetch failed"),
            }
        }
        StageOutcome::Missed
    }
}
