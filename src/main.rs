use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{DecodeOptions, PlaybackController, SongbirdOutput};
use crate::bot::{ChannelNotifier, MusicBot};
use crate::config::Config;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cola_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Cola Bot v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Config::load()?;

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // El manager de voz se construye antes que el cliente para poder
    // compartirlo con la salida de audio.
    let songbird = Songbird::serenity();

    let resolver = Arc::new(YtDlpResolver::new());
    let notifier = Arc::new(ChannelNotifier::new());
    let output = Arc::new(SongbirdOutput::new(songbird.clone()));

    let controller = Arc::new(PlaybackController::new(
        resolver.clone(),
        output,
        notifier.clone(),
        DecodeOptions::with_volume(config.default_volume),
        Duration::from_secs(config.resolve_timeout_secs),
    ));

    // Crear handler del bot
    let handler = MusicBot::new(
        config.clone(),
        controller,
        resolver,
        notifier,
        songbird.clone(),
    );

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    // Verificar que yt-dlp esté disponible
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp no está disponible")
    }
}
