use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input},
    tracks::TrackHandle,
    Songbird,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::MusicError;

/// Opciones de decodificación aplicadas a cada stream.
///
/// Equivalen a las banderas ffmpeg clásicas de este tipo de bot:
/// reconexión ante cortes transitorios, solo audio, y un filtro de volumen
/// estático.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub volume: f32,
    pub audio_only: bool,
    pub auto_reconnect: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            volume: 0.25,
            audio_only: true,
            auto_reconnect: true,
        }
    }
}

impl DecodeOptions {
    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume,
            ..Self::default()
        }
    }
}

/// Transporte de audio hacia el canal de voz.
///
/// La implementación real es songbird; el trait existe para que la máquina
/// de estados del controlador sea testeable sin conexión de voz.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Comienza a transmitir el stream en la guild. El fin del stream se
    /// notifica por el evento de fin de track registrado al unirse al canal,
    /// nunca por esta función.
    async fn begin_stream(
        &self,
        guild_id: GuildId,
        locator: &str,
        options: &DecodeOptions,
    ) -> Result<(), MusicError>;

    /// Detiene el stream en curso, si lo hay. Dispara el evento de fin de
    /// track exactamente una vez.
    async fn stop(&self, guild_id: GuildId);

    /// Abandona el canal de voz de la guild.
    async fn disconnect(&self, guild_id: GuildId);

    fn is_connected(&self, guild_id: GuildId) -> bool;
}

/// Salida de audio real sobre songbird.
pub struct SongbirdOutput {
    manager: Arc<Songbird>,
    current_tracks: DashMap<GuildId, TrackHandle>,
    http_client: reqwest::Client,
}

impl SongbirdOutput {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager,
            current_tracks: DashMap::new(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AudioOutput for SongbirdOutput {
    async fn begin_stream(
        &self,
        guild_id: GuildId,
        locator: &str,
        options: &DecodeOptions,
    ) -> Result<(), MusicError> {
        let call = self
            .manager
            .get(guild_id)
            .ok_or_else(|| MusicError::Stream("sin sesión de voz activa".to_string()))?;

        debug!(
            "🔧 Stream para guild {}: volumen {}, reconexión automática {}",
            guild_id, options.volume, options.auto_reconnect
        );

        // Las interrupciones transitorias se reanudan con range requests
        // sobre la misma URL.
        let input = Input::from(HttpRequest::new(
            self.http_client.clone(),
            locator.to_string(),
        ));

        let mut handler = call.lock().await;
        let track_handle = handler.play_input(input);

        if let Err(e) = track_handle.set_volume(options.volume) {
            warn!("No se pudo aplicar el volumen: {:?}", e);
        }

        self.current_tracks.insert(guild_id, track_handle);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) {
        if let Some((_, track)) = self.current_tracks.remove(&guild_id) {
            let _ = track.stop();
        }
    }

    async fn disconnect(&self, guild_id: GuildId) {
        self.current_tracks.remove(&guild_id);

        if self.manager.get(guild_id).is_some() {
            if let Err(e) = self.manager.remove(guild_id).await {
                warn!("Error al abandonar el canal de voz: {:?}", e);
            } else {
                info!("👋 Desconectado del canal de voz en guild {}", guild_id);
            }
        }
    }

    fn is_connected(&self, guild_id: GuildId) -> bool {
        self.manager.get(guild_id).is_some()
    }
}
