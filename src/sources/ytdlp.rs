use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{ResolvedTrack, TrackResolver};
use crate::{audio::output::DecodeOptions, error::MusicError};

/// Cliente para resolver pistas vía yt-dlp.
pub struct YtDlpResolver {
    /// Limitar procesos concurrentes para evitar rate limiting.
    limiter: tokio::sync::Semaphore,
}

/// Información extraída de yt-dlp (--dump-json).
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self {
            limiter: tokio::sync::Semaphore::new(3),
        }
    }

    /// Una referencia es URL si parsea con esquema http(s); cualquier otra
    /// cosa se trata como búsqueda libre.
    pub fn is_http_url(reference: &str) -> bool {
        Url::parse(reference)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    /// Arma el objetivo de yt-dlp: la URL tal cual, o `ytsearch1:` para
    /// quedarnos con el primer resultado.
    pub fn resolve_target(reference: &str) -> String {
        if Self::is_http_url(reference) {
            reference.to_string()
        } else {
            format!("ytsearch1:{reference}")
        }
    }

    async fn run_ytdlp(&self, args: &[&str]) -> Result<String, MusicError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| MusicError::Resolution(e.to_string()))?;

        let output = async_process::Command::new("yt-dlp")
            .args(args)
            .output()
            .await
            .map_err(|e| MusicError::Resolution(format!("error al ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MusicError::Resolution(format!(
                "yt-dlp: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn info_to_track(info: YtDlpInfo, fallback_url: &str) -> ResolvedTrack {
        ResolvedTrack {
            title: info.title,
            url: info
                .webpage_url
                .unwrap_or_else(|| fallback_url.to_string()),
            uploader: info.uploader,
            duration: info.duration.map(Duration::from_secs_f64),
            thumbnail: info.thumbnail,
        }
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, reference: &str) -> Result<ResolvedTrack, MusicError> {
        let target = Self::resolve_target(reference);
        info!("🔍 Resolviendo: {}", target);

        let stdout = self
            .run_ytdlp(&["--no-playlist", "--dump-json", "--no-warnings", &target])
            .await?;

        // Con ytsearch1 yt-dlp emite una línea JSON por resultado; nos
        // interesa la primera.
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| MusicError::Resolution("sin resultados".to_string()))?;

        let info: YtDlpInfo = serde_json::from_str(line)
            .map_err(|e| MusicError::Resolution(format!("respuesta inválida de yt-dlp: {e}")))?;

        debug!("📊 Resuelto: {}", info.title);
        Ok(Self::info_to_track(info, reference))
    }

    async fn resolve_stream(
        &self,
        reference: &str,
        options: &DecodeOptions,
    ) -> Result<String, MusicError> {
        debug!("🎵 Obteniendo URL de stream para: {}", reference);

        let format = if options.audio_only {
            "bestaudio/best"
        } else {
            "best"
        };

        let stdout = self
            .run_ytdlp(&[
                "--no-playlist",
                "-f",
                format,
                "--get-url",
                "--no-warnings",
                reference,
            ])
            .await?;

        let stream_url = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| MusicError::Resolution("no se pudo obtener URL de stream".to_string()))?;

        Ok(stream_url.to_string())
    }
}
