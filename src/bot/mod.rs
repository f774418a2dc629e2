//! # Bot Module
//!
//! Implementación del bot de Discord.
//!
//! El struct [`MusicBot`] implementa el [`EventHandler`] de Serenity y
//! conecta la superficie de comandos con el [`PlaybackController`]: los
//! comandos encolan y consultan, songbird devuelve los eventos de fin de
//! track, y el controlador decide cada avance de cola.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

pub mod commands;
pub mod events;
pub mod handlers;
pub mod notify;

use crate::{
    audio::PlaybackController, config::Config, error::MusicError, sources::TrackResolver,
};

pub use notify::ChannelNotifier;

/// Handler principal del bot.
pub struct MusicBot {
    /// Configuración cargada de variables de entorno
    config: Arc<Config>,
    /// Máquina de estados de reproducción, una por guild
    pub controller: Arc<PlaybackController>,
    /// Resolver de referencias (URL o búsqueda) usado en el camino del comando
    pub resolver: Arc<dyn TrackResolver>,
    /// Avisos hacia el canal de texto de cada guild
    pub notifier: Arc<ChannelNotifier>,
    /// Manager de voz compartido con el cliente de Serenity
    songbird: Arc<Songbird>,
    /// Guilds cuyo `Call` ya tiene registrados los event handlers de voz
    registered_events: DashMap<GuildId, ()>,
}

impl MusicBot {
    pub fn new(
        config: Config,
        controller: Arc<PlaybackController>,
        resolver: Arc<dyn TrackResolver>,
        notifier: Arc<ChannelNotifier>,
        songbird: Arc<Songbird>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            controller,
            resolver,
            notifier,
            songbird,
            registered_events: DashMap::new(),
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.config.resolve_timeout_secs)
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.songbird.get(guild_id).is_some()
    }

    /// Conecta el bot al canal de voz y deja los event handlers de fin de
    /// track registrados sobre el `Call`.
    pub async fn join_voice_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), MusicError> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::Join(e.to_string()))?;

        // Un solo juego de handlers por Call: reconectarse a otro canal de
        // la misma guild reutiliza el Call existente.
        if self.registered_events.insert(guild_id, ()).is_none() {
            let mut handler = call.lock().await;
            events::register_voice_events(
                &mut handler,
                guild_id,
                self.controller.clone(),
                self.notifier.clone(),
            );
        }

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(())
    }

    /// Desconecta y deja la guild lista para un futuro rejoin.
    pub async fn leave_voice(&self, guild_id: GuildId) {
        self.controller.disconnect(guild_id).await;
        self.registered_events.remove(&guild_id);
    }

    /// Registra los comandos slash, globales o por guild según configuración.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("🏠 Comandos registrados para guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("🌐 Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        info!("🔧 Application ID: {}", self.config.application_id);

        // Recién acá hay un Http con el que mandar avisos.
        self.notifier.attach_http(ctx.http.clone());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Limpieza cuando el bot es desconectado del canal de voz por fuera de
    /// sus propios comandos (kick manual, cierre del canal).
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;

        if new.user_id == current_user_id && old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado en guild {}", guild_id);

                self.registered_events.remove(&guild_id);
                self.controller.disconnect(guild_id).await;
            }
        }
    }
}
