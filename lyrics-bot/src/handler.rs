//! Serenity event handler answering `!lyrics` commands over DM.

use crate::command;
use crate::format::lyrics_reply;
use crate::models::context::ContextPointer;
use log::{debug, error, info, warn};
use serenity::async_trait;
use serenity::client::{Context, EventHandler};
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use utils::string::split_into_chunks;

/// Discord rejects messages longer than this many characters
pub const MESSAGE_LIMIT: usize = 2000;

const DM_CHANNEL_FAILED: &str = "Something went wrong while sending the DM!";
const DM_SEND_FAILED: &str =
    "Failed to send you a DM. Did you disable DM in your privacy settings?";

pub struct LyricsHandler {
    context: ContextPointer,
}

impl LyricsHandler {
    pub fn new(context: ContextPointer) -> Self {
        Self { context }
    }

    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
    }

    async fn say_in_channel(ctx: &Context, msg: &Message, text: &str) {
        if let Err(err) = msg.channel_id.say(&ctx.http, text).await {
            error!("Error replying in channel {}: {}", msg.channel_id, err);
        }
    }
}

#[async_trait]
impl EventHandler for LyricsHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "Connected to Discord as {} ({} guilds)",
            ready.user.name,
            ready.guilds.len()
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore all messages created by the bot itself
        let bot_id = ctx.cache.current_user().id;
        if msg.author.id == bot_id {
            return;
        }

        let query = match command::parse(&msg.content) {
            None => return,
            Some(Err(err)) => {
                debug!("Rejected command from {}: {:?}", msg.author.name, msg.content);
                Self::say_in_channel(&ctx, &msg, &format!("# {}", err)).await;
                return;
            }
            Some(Ok(query)) => query,
        };

        let channel = match msg.author.create_dm_channel(&ctx).await {
            Ok(channel) => channel,
            Err(err) => {
                error!("Error creating DM channel for {}: {}", msg.author.name, err);
                Self::say_in_channel(&ctx, &msg, DM_CHANNEL_FAILED).await;
                return;
            }
        };

        info!("Lyrics requested by {}: {:?}", msg.author.name, query);
        let reply = lyrics_reply(self.context.lyrics_client(), &query).await;

        for chunk in split_into_chunks(&reply, MESSAGE_LIMIT) {
            if let Err(err) = channel.say(&ctx.http, chunk).await {
                warn!("Error sending DM message to {}: {}", msg.author.name, err);
                Self::say_in_channel(&ctx, &msg, DM_SEND_FAILED).await;
                return;
            }
        }
    }
}

