use std::sync::LazyLock;

use regex::Regex;

/// Matches message links on the canonical host and its known mirrors.
/// Scheme and `www.` are optional; host matching ignores case.
static MESSAGE_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:https?://)?(?i:www\.)?(?i:discord(?:app)?\.com|canary\.discord\.com|ptb\.discord\.com)/channels/(\d+)/(\d+)/(\d+)",
    )
    .unwrap_or_else(|e| panic!("invalid message link pattern: {e}"))
});

/// A parsed reference to a message: guild, channel and message ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageLink {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

impl MessageLink {
    pub fn new(guild_id: u64, channel_id: u64, message_id: u64) -> Self {
        Self {
            guild_id,
            channel_id,
            message_id,
        }
    }

    /// Canonical URL of the referenced message.
    pub fn url(&self) -> String {
        format!(
            "https://discord.com/channels/{}/{}/{}",
            self.guild_id, self.channel_id, self.message_id
        )
    }

    /// Encode as the custom id of the "reveal link" button.
    pub fn to_custom_id(&self) -> String {
        format!(
            "{}{}:{}:{}",
            REVEAL_PREFIX, self.guild_id, self.channel_id, self.message_id
        )
    }

    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.strip_prefix(REVEAL_PREFIX)?.split(':');
        let link = Self::new(
            parse_id(parts.next()?)?,
            parse_id(parts.next()?)?,
            parse_id(parts.next()?)?,
        );
        if parts.next().is_some() {
            return None;
        }
        Some(link)
    }
}

const REVEAL_PREFIX: &str = "msglink:reveal:";

/// Ids are positive 64-bit integers; zero or overflow is not a valid id.
fn parse_id(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|id| *id != 0)
}

/// Lazily yield every message link in `text`, left to right, duplicates included.
pub fn extract_links(text: &str) -> impl Iterator<Item = MessageLink> + '_ {
    MESSAGE_LINK_PATTERN.captures_iter(text).filter_map(|caps| {
        Some(MessageLink::new(
            parse_id(caps.get(1)?.as_str())?,
            parse_id(caps.get(2)?.as_str())?,
            parse_id(caps.get(3)?.as_str())?,
        ))
    })
}
