//! Discord backend: serenity-backed [`Platform`] plus the gateway event handler.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use chrono::DateTime;
use serenity::all::{
    ButtonStyle, ChannelType, Command, CommandOptionType, Context, EventHandler, GatewayIntents,
    Interaction, Ready,
};
use serenity::builder::{
    CreateActionRow, CreateAttachment, CreateButton, CreateCommand, CreateCommandOption,
    CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateMessage,
};
use serenity::cache::Cache;
use serenity::http::{Http, HttpError};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use serenity::model::Timestamp;
use serenity::prelude::Client;
use tracing::{debug, error, info, warn};

use super::{
    Attachment, Author, Channel, ChannelKind, DeliveryTarget, Embed, Guild, LinkButtons, Message,
    OutgoingMessage, Platform, Reaction, ThreadVisibility,
};
use crate::config::{Config, PreviewConfig};
use crate::error::{PlatformError, PlatformResult};
use crate::trigger::{command_link, IncomingMessage, PreviewService, INVALID_LINK};

pub const COMMAND_NAME: &str = "preview";
const REVEAL_LABEL: &str = "Open original message";
const DIRECT_LABEL: &str = "Direct link";

/// Map a serenity error onto the platform error taxonomy.
fn classify(err: serenity::Error) -> PlatformError {
    if let serenity::Error::Http(http_err) = &err {
        return classify_http(http_err);
    }
    PlatformError::transient(err)
}

fn classify_http(http_err: &HttpError) -> PlatformError {
    match http_err {
        HttpError::UnsuccessfulRequest(resp) => {
            PlatformError::from_status(resp.status_code.as_u16(), resp.error.message.clone())
        }
        other => PlatformError::transient(other),
    }
}

fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text | ChannelType::News | ChannelType::Voice => ChannelKind::Text,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            ChannelKind::Thread
        }
        _ => ChannelKind::Other,
    }
}

fn convert_channel(channel: &serenity::model::channel::GuildChannel) -> Channel {
    Channel {
        id: channel.id.get(),
        name: channel.name.clone(),
        kind: channel_kind(channel.kind),
    }
}

fn convert_message(msg: serenity::model::channel::Message) -> Message {
    let display_name = msg
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .or_else(|| msg.author.global_name.clone())
        .unwrap_or_else(|| msg.author.name.clone());

    Message {
        id: msg.id.get(),
        content: msg.content.clone(),
        author: Author {
            display_name,
            avatar_url: Some(msg.author.face()),
        },
        timestamp: DateTime::from_timestamp(msg.timestamp.unix_timestamp(), 0).unwrap_or_default(),
        reactions: msg
            .reactions
            .iter()
            .map(|r| Reaction {
                emoji: r.reaction_type.to_string(),
                count: r.count,
            })
            .collect(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| Attachment {
                filename: a.filename.clone(),
                url: a.url.clone(),
                content_type: a.content_type.clone(),
            })
            .collect(),
    }
}

fn create_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new().colour(embed.color);
    if let Some(description) = &embed.description {
        builder = builder.description(description);
    }
    if let Some(author) = &embed.author {
        let mut author_builder = CreateEmbedAuthor::new(&author.display_name);
        if let Some(icon) = &author.avatar_url {
            author_builder = author_builder.icon_url(icon);
        }
        builder = builder.author(author_builder);
    }
    if let Some(text) = &embed.footer_text {
        let mut footer = CreateEmbedFooter::new(text);
        if let Some(icon) = &embed.footer_icon_url {
            footer = footer.icon_url(icon);
        }
        builder = builder.footer(footer);
    }
    if let Some(ts) = embed
        .timestamp
        .and_then(|ts| Timestamp::from_unix_timestamp(ts.timestamp()).ok())
    {
        builder = builder.timestamp(ts);
    }
    for field in &embed.fields {
        builder = builder.field(&field.name, &field.value, field.inline);
    }
    if let Some(url) = &embed.image_url {
        builder = builder.image(url);
    }
    builder
}

fn action_rows(buttons: Option<&LinkButtons>) -> Vec<CreateActionRow> {
    let Some(buttons) = buttons else {
        return Vec::new();
    };
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(&buttons.reveal_custom_id)
            .label(REVEAL_LABEL)
            .style(ButtonStyle::Primary),
        CreateButton::new_link(&buttons.url).label(DIRECT_LABEL),
    ])]
}

/// Platform access through serenity's cache and HTTP client.
pub struct DiscordPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
    downloader: reqwest::Client,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, downloader: reqwest::Client) -> Self {
        Self {
            http,
            cache,
            downloader,
        }
    }

    /// Channels that can own threads.
    async fn thread_parents(&self, guild_id: GuildId) -> PlatformResult<Vec<ChannelId>> {
        let channels = self.http.get_channels(guild_id).await.map_err(classify)?;
        Ok(channels
            .into_iter()
            .filter(|c| {
                matches!(
                    c.kind,
                    ChannelType::Text | ChannelType::News | ChannelType::Forum
                )
            })
            .map(|c| c.id)
            .collect())
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn guild(&self, guild_id: u64) -> PlatformResult<Guild> {
        let id = GuildId::new(guild_id);
        let cached = self.cache.guild(id).map(|g| Guild {
            id: guild_id,
            name: g.name.clone(),
            icon_url: g.icon_url(),
        });
        if let Some(guild) = cached {
            return Ok(guild);
        }

        let guild = self.http.get_guild(id).await.map_err(classify)?;
        Ok(Guild {
            id: guild_id,
            name: guild.name.clone(),
            icon_url: guild.icon_url(),
        })
    }

    async fn channel(&self, channel_id: u64) -> PlatformResult<Channel> {
        let id = ChannelId::new(channel_id);
        let cached = self.cache.channel(id).map(|c| convert_channel(&c));
        if let Some(channel) = cached {
            return Ok(channel);
        }

        match self.http.get_channel(id).await.map_err(classify)? {
            serenity::model::channel::Channel::Guild(channel) => Ok(convert_channel(&channel)),
            _ => Ok(Channel {
                id: channel_id,
                name: "direct-message".to_string(),
                kind: ChannelKind::Other,
            }),
        }
    }

    async fn message(&self, channel: &Channel, message_id: u64) -> PlatformResult<Message> {
        if !channel.holds_messages() {
            return Err(PlatformError::Unsupported(format!(
                "channel {} has no messages",
                channel.id
            )));
        }
        let msg = self
            .http
            .get_message(ChannelId::new(channel.id), MessageId::new(message_id))
            .await
            .map_err(classify)?;
        Ok(convert_message(msg))
    }

    async fn active_threads(&self, guild: &Guild) -> PlatformResult<Vec<Channel>> {
        let data = self
            .http
            .get_guild_active_threads(GuildId::new(guild.id))
            .await
            .map_err(classify)?;
        Ok(data.threads.iter().map(convert_channel).collect())
    }

    async fn archived_threads(
        &self,
        guild: &Guild,
        visibility: ThreadVisibility,
        limit: u64,
    ) -> PlatformResult<Vec<Channel>> {
        let cap = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut threads = Vec::new();

        // Archived threads are listed per parent channel; one page each, capped overall
        for parent in self.thread_parents(GuildId::new(guild.id)).await? {
            if threads.len() >= cap {
                break;
            }
            let page = match visibility {
                ThreadVisibility::Public => {
                    self.http
                        .get_channel_archived_public_threads(parent, None, Some(limit))
                        .await
                }
                ThreadVisibility::Private => {
                    self.http
                        .get_channel_archived_private_threads(parent, None, Some(limit))
                        .await
                }
            };
            match page {
                Ok(data) => threads.extend(data.threads.iter().map(convert_channel)),
                Err(e) => {
                    debug!(channel_id = parent.get(), error = %e, "archived thread listing failed");
                }
            }
        }

        threads.truncate(cap);
        Ok(threads)
    }

    async fn download(&self, url: &str) -> PlatformResult<Vec<u8>> {
        let response = self
            .downloader
            .get(url)
            .send()
            .await
            .map_err(PlatformError::transient)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::from_status(
                status.as_u16(),
                format!("download of {url} failed"),
            ));
        }

        let bytes = response.bytes().await.map_err(PlatformError::transient)?;
        Ok(bytes.to_vec())
    }

    async fn send(&self, target: &DeliveryTarget, message: OutgoingMessage) -> PlatformResult<()> {
        let embeds: Vec<CreateEmbed> = message.embeds.iter().map(create_embed).collect();
        let components = action_rows(message.buttons.as_ref());
        let file = message
            .file
            .map(|f| CreateAttachment::bytes(f.data, f.filename));

        let result = match target {
            DeliveryTarget::Reply {
                channel_id,
                message_id,
            } => {
                let channel = ChannelId::new(*channel_id);
                let mut builder = CreateMessage::new()
                    .embeds(embeds)
                    .components(components)
                    .reference_message((channel, MessageId::new(*message_id)));
                if let Some(content) = message.content {
                    builder = builder.content(content);
                }
                if let Some(file) = file {
                    builder = builder.add_file(file);
                }
                channel.send_message(&*self.http, builder).await.map(|_| ())
            }
            DeliveryTarget::Followup { interaction_token } => {
                let mut builder = CreateInteractionResponseFollowup::new()
                    .embeds(embeds)
                    .components(components)
                    .ephemeral(message.ephemeral);
                if let Some(content) = message.content {
                    builder = builder.content(content);
                }
                self.http
                    .create_followup_message(interaction_token, &builder, file.into_iter().collect())
                    .await
                    .map(|_| ())
            }
        };

        result.map_err(|e| match classify(e) {
            PlatformError::Transient(msg) => PlatformError::Transient(msg),
            other => PlatformError::DeliveryRejected(other.to_string()),
        })
    }
}

/// Gateway event handler wiring Discord events to the preview service.
pub struct Handler {
    config: PreviewConfig,
    register_commands: bool,
    downloader: reqwest::Client,
    bot_id: OnceLock<u64>,
}

impl Handler {
    pub fn new(config: PreviewConfig, register_commands: bool) -> Self {
        Self {
            config,
            register_commands,
            downloader: reqwest::Client::new(),
            bot_id: OnceLock::new(),
        }
    }

    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
    }

    fn service(&self, ctx: &Context) -> PreviewService {
        let platform = DiscordPlatform::new(
            ctx.http.clone(),
            ctx.cache.clone(),
            self.downloader.clone(),
        );
        PreviewService::new(Arc::new(platform), self.config.clone())
    }

    async fn register_command(&self, ctx: &Context) {
        let command = CreateCommand::new(COMMAND_NAME)
            .description("Preview a Discord message link")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "link", "Message link")
                    .required(true),
            );
        match Command::create_global_command(&ctx.http, command).await {
            Ok(_) => info!("Registered /{} command", COMMAND_NAME),
            Err(e) => error!("Failed to register /{} command: {}", COMMAND_NAME, e),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            bot_id = ready.user.id.get(),
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
        let _ = self.bot_id.set(ready.user.id.get());

        if self.register_commands {
            self.register_command(&ctx).await;
        }
    }

    async fn message(&self, ctx: Context, msg: serenity::model::channel::Message) {
        let incoming = IncomingMessage {
            channel_id: msg.channel_id.get(),
            message_id: msg.id.get(),
            author_is_bot: msg.author.bot,
            content: msg.content.clone(),
        };
        self.service(&ctx)
            .handle_message(&incoming, self.bot_id.get().copied())
            .await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(cmd) if cmd.data.name == COMMAND_NAME => {
                let argument = cmd
                    .data
                    .options
                    .iter()
                    .find(|o| o.name == "link")
                    .and_then(|o| o.value.as_str())
                    .unwrap_or_default();

                // Answered right away so the notice stays private; a deferred
                // response fixes the visibility of the first follow-up.
                if command_link(argument).is_none() {
                    let response = CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content(INVALID_LINK)
                            .ephemeral(true),
                    );
                    if let Err(e) = cmd.create_response(&ctx.http, response).await {
                        warn!(error = %e, "failed to reject /{} interaction", COMMAND_NAME);
                    }
                    return;
                }

                let defer = CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new());
                if let Err(e) = cmd.create_response(&ctx.http, defer).await {
                    warn!(error = %e, "failed to defer /{} interaction", COMMAND_NAME);
                    return;
                }

                self.service(&ctx).handle_command(argument, &cmd.token).await;
            }
            Interaction::Component(comp) => {
                let Some(url) = self.service(&ctx).handle_reveal(&comp.data.custom_id) else {
                    return;
                };
                let response = CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(url)
                        .ephemeral(true),
                );
                if let Err(e) = comp.create_response(&ctx.http, response).await {
                    warn!(error = %e, "failed to answer reveal button");
                }
            }
            _ => {}
        }
    }
}

/// Connect to the gateway and run until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let handler = Handler::new(config.preview.clone(), config.discord.register_commands);

    let mut client = Client::builder(&config.discord.bot_token, Handler::intents())
        .event_handler(handler)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    // Close all shards on Ctrl+C or SIGTERM
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    tokio::signal::ctrl_c().await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
        }
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");
    client
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Discord client error: {}", e))?;

    info!("Discord bot stopped");
    Ok(())
}
