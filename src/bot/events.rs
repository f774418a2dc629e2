use serenity::{async_trait, model::id::GuildId};
use songbird::{Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    audio::{PlaybackController, PlaybackNotifier},
    error::MusicError,
};

/// Callback de fin de stream: el único disparador de avance de cola.
///
/// Songbird lo invoca una vez por track (fin normal, error o stop) desde el
/// contexto del driver de voz, nunca desde la pila del comando.
pub struct TrackEndHandler {
    pub guild_id: GuildId,
    pub controller: Arc<PlaybackController>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        debug!("🎵 Track terminó en guild {}", self.guild_id);
        self.controller.on_track_end(self.guild_id).await;
        None
    }
}

/// Errores de decodificación/transporte durante la reproducción.
///
/// Solo avisa: el track con error también termina, así que el avance lo
/// hace [`TrackEndHandler`] por el camino normal.
pub struct TrackErrorHandler {
    pub guild_id: GuildId,
    pub controller: Arc<PlaybackController>,
    pub notifier: Arc<dyn PlaybackNotifier>,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error!(
                    "❌ Error en track para guild {}: {:?}",
                    self.guild_id, state.playing
                );

                let title = self
                    .controller
                    .current_title(self.guild_id)
                    .await
                    .unwrap_or_else(|| "pista actual".to_string());

                self.notifier
                    .track_failed(
                        self.guild_id,
                        &title,
                        &MusicError::Stream(format!("{:?}", state.playing)),
                    )
                    .await;
            }
        }

        None
    }
}

/// Registra los event handlers de voz de una guild sobre su `Call`.
pub fn register_voice_events(
    handler: &mut songbird::Call,
    guild_id: GuildId,
    controller: Arc<PlaybackController>,
    notifier: Arc<dyn PlaybackNotifier>,
) {
    handler.add_global_event(
        VoiceEvent::Track(TrackEvent::End),
        TrackEndHandler {
            guild_id,
            controller: controller.clone(),
        },
    );

    handler.add_global_event(
        VoiceEvent::Track(TrackEvent::Error),
        TrackErrorHandler {
            guild_id,
            controller,
            notifier,
        },
    );
}
