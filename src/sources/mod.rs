pub mod ytdlp;

use async_trait::async_trait;
use std::time::Duration;

use crate::{audio::output::DecodeOptions, error::MusicError};

pub use ytdlp::YtDlpResolver;

/// Metadata de una pista ya resuelta, lista para encolar.
#[derive(Debug, Clone)]
pub struct ResolvedTrack {
    pub title: String,
    /// URL de la página del video (no el stream de audio).
    pub url: String,
    pub uploader: Option<String>,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
}

/// Resuelve referencias (URL o búsqueda libre) a pistas reproducibles.
///
/// `resolve` se usa en el camino del comando para obtener el título que se
/// muestra al encolar; `resolve_stream` se usa recién al avanzar la cola,
/// porque las URLs de stream expiran.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Para búsquedas libres devuelve el primer resultado rankeado.
    async fn resolve(&self, reference: &str) -> Result<ResolvedTrack, MusicError>;

    /// Devuelve la URL directa del stream de audio.
    async fn resolve_stream(
        &self,
        reference: &str,
        options: &DecodeOptions,
    ) -> Result<String, MusicError>;
}
