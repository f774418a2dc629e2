use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::Track;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Cola Bot";

/// Cuántas pistas pendientes se listan como máximo en /queue.
const QUEUE_PAGE_SIZE: usize = 25;

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.display_title))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", artist_field(track), true)
        .field("⏱️ Duración", duration_field(track.duration), true)
        .field(
            "👤 Solicitado por",
            format!("<@{}>", track.requested_by),
            true,
        );

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(&track.source_reference)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción a la cola
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!(
            "**{}** se ha agregado a la cola de reproducción",
            track.display_title
        ))
        .color(colors::MUSIC_PURPLE)
        .field("📊 Posición", position.to_string(), true)
        .field("🎤 Artista", artist_field(track), true)
        .field("⏱️ Duración", duration_field(track.duration), true)
        .field(
            "👤 Solicitado por",
            format!("<@{}>", track.requested_by),
            true,
        );

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(&track.source_reference)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá automáticamente si no hay música sonando",
        ))
}

/// Crea un embed con la cola de reproducción en orden
pub fn create_queue_embed(current: Option<&Track>, pending: &[Track]) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    match current {
        Some(track) => {
            embed = embed.field(
                "🎵 Sonando ahora",
                format!("**{}**", track.display_title),
                false,
            );
        }
        None => {
            embed = embed.description("No hay nada reproduciéndose");
        }
    }

    if pending.is_empty() {
        embed = embed.field("📭 Pendientes", "La cola está vacía", false);
    } else {
        let listed: Vec<String> = pending
            .iter()
            .take(QUEUE_PAGE_SIZE)
            .enumerate()
            .map(|(index, track)| format!("{}. {}", index + 1, track.display_title))
            .collect();

        let mut body = listed.join("\n");
        if pending.len() > QUEUE_PAGE_SIZE {
            body.push_str(&format!("\n… y {} más", pending.len() - QUEUE_PAGE_SIZE));
        }

        embed = embed.field(
            format!("📜 Pendientes ({})", pending.len()),
            body,
            false,
        );
    }

    embed
}

/// Crea un embed de aviso cuando una pista falló y la cola continúa
pub fn create_track_failed_embed(title: &str, reason: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("⚠️ Pista Omitida")
        .description(format!("**{title}**: {reason}"))
        .color(colors::WARNING_ORANGE)
        .footer(CreateEmbedFooter::new(
            "Continuando con la siguiente canción de la cola",
        ))
}

fn artist_field(track: &Track) -> String {
    track
        .uploader
        .clone()
        .unwrap_or_else(|| "Desconocido".to_string())
}

fn duration_field(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo".to_string(),
    }
}

/// Formatea una duración como m:ss o h:mm:ss
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn format_duration_handles_minutes_and_hours() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(428)), "7:08");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }
}
