use thiserror::Error;

/// Errores de reproducción y de comandos.
///
/// Los mensajes se muestran tal cual al usuario, por eso están redactados
/// como respuestas y no como trazas internas.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("Debes estar en un canal de voz para usar este comando")]
    NoVoiceChannel,

    #[error("No se pudo conectar al canal de voz: {0}")]
    Join(String),

    #[error("No se pudo resolver la pista: {0}")]
    Resolution(String),

    #[error("Tiempo de espera agotado al resolver la pista")]
    ResolveTimeout,

    #[allow(dead_code)]
    #[error("La cola está vacía")]
    EmptyQueue,

    #[error("No hay ninguna canción reproduciéndose")]
    NothingPlaying,

    #[error("Error de reproducción: {0}")]
    Stream(String),
}
