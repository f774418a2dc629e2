use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::warn;

use crate::{
    audio::{PlaybackNotifier, Track},
    error::MusicError,
    ui::embeds,
};

/// Publica los avisos del controlador en el canal de texto desde el que la
/// guild usó su último comando.
///
/// El `Http` llega recién con el evento `ready`, por eso se adjunta tarde;
/// hasta entonces los avisos solo se loguean.
pub struct ChannelNotifier {
    http: RwLock<Option<Arc<Http>>>,
    channels: DashMap<GuildId, ChannelId>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self {
            http: RwLock::new(None),
            channels: DashMap::new(),
        }
    }

    pub fn attach_http(&self, http: Arc<Http>) {
        *self.http.write() = Some(http);
    }

    /// Recuerda el canal de texto del último comando de la guild.
    pub fn set_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    fn target(&self, guild_id: GuildId) -> Option<(Arc<Http>, ChannelId)> {
        let http = self.http.read().clone()?;
        let channel = self.channels.get(&guild_id).map(|entry| *entry)?;
        Some((http, channel))
    }

    async fn send(&self, guild_id: GuildId, message: CreateMessage) {
        let Some((http, channel)) = self.target(guild_id) else {
            warn!("Aviso para guild {} sin canal registrado", guild_id);
            return;
        };

        if let Err(e) = channel.send_message(&http, message).await {
            warn!("Error al enviar aviso a guild {}: {:?}", guild_id, e);
        }
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackNotifier for ChannelNotifier {
    async fn now_playing(&self, guild_id: GuildId, track: &Track) {
        let embed = embeds::create_now_playing_embed(track);
        self.send(guild_id, CreateMessage::new().embed(embed)).await;
    }

    async fn track_failed(&self, guild_id: GuildId, title: &str, error: &MusicError) {
        let embed = embeds::create_track_failed_embed(title, &error.to_string());
        self.send(guild_id, CreateMessage::new().embed(embed)).await;
    }

    async fn queue_drained(&self, guild_id: GuildId) {
        self.send(
            guild_id,
            CreateMessage::new().content("📭 Cola vacía. Desconectando del canal de voz."),
        )
        .await;
    }
}
