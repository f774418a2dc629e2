use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tokio::time::timeout;
use tracing::info;

use crate::{audio::Track, bot::MusicBot, error::MusicError, ui::embeds};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    // Los avisos del controlador (pista fallida, cola vacía) van al canal
    // del último comando de la guild.
    bot.notifier.set_channel(guild_id, command.channel_id);

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "playlink" => handle_playlink(ctx, command, bot, guild_id).await?,
        "play" => handle_play(ctx, command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, command, bot, guild_id).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Comando no reconocido")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_playlink(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let url = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "url")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("URL no proporcionada"))?
        .to_string();

    enqueue_request(ctx, &command, bot, guild_id, &url).await
}

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    enqueue_request(ctx, &command, bot, guild_id, &query).await
}

/// Camino común de `/playlink` y `/play`: asegura la sesión de voz,
/// resuelve la referencia y encola.
async fn enqueue_request(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
    reference: &str,
) -> Result<()> {
    // Defer: la resolución puede tardar más que la ventana de respuesta.
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let voice_channel = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel) => channel,
        Err(e) => return edit_with_error(ctx, command, &e).await,
    };

    if !bot.is_connected(guild_id) {
        if let Err(e) = bot.join_voice_channel(guild_id, voice_channel).await {
            return edit_with_error(ctx, command, &e).await;
        }

        let _ = command
            .channel_id
            .say(&ctx.http, format!("🔊 Conectado a <#{voice_channel}>"))
            .await;
    }

    let resolved = match timeout(bot.resolve_timeout(), bot.resolver.resolve(reference)).await {
        Ok(Ok(resolved)) => resolved,
        Ok(Err(e)) => return edit_with_error(ctx, command, &e).await,
        Err(_) => return edit_with_error(ctx, command, &MusicError::ResolveTimeout).await,
    };

    let track = Track::from_resolved(resolved, command.user.id);
    let position = bot.controller.enqueue(guild_id, track.clone()).await;

    let embed = embeds::create_track_added_embed(&track, position);
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let (current, pending) = bot.controller.queue_snapshot(guild_id).await;
    let embed = embeds::create_queue_embed(current.as_ref(), &pending);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    // Solo detiene el stream: el avance llega por el callback de fin de
    // track, nunca desde acá.
    let content = match bot.controller.skip(guild_id).await {
        Ok(title) => format!("⏭️ Saltando: **{title}**"),
        Err(e) => format!("❌ {e}"),
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_leave(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let content = if bot.is_connected(guild_id) {
        bot.leave_voice(guild_id).await;
        "👋 Desconectado del canal de voz".to_string()
    } else {
        "❌ No estoy conectado a ningún canal de voz".to_string()
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

async fn edit_with_error(
    ctx: &Context,
    command: &CommandInteraction,
    error: &MusicError,
) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().content(format!("❌ {error}")),
        )
        .await?;

    Ok(())
}

fn get_user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId, MusicError> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| MusicError::Join("guild no encontrada en caché".to_string()))?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(MusicError::NoVoiceChannel)
}
