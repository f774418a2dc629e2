use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        playlink_command(),
        play_command(),
        queue_command(),
        skip_command(),
        leave_command(),
    ]
}

// Comandos de reproducción

fn playlink_command() -> CreateCommand {
    CreateCommand::new("playlink")
        .description("Agrega una canción a la cola a partir de su URL")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "url", "URL del video")
                .required(true),
        )
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Busca una canción y agrega el primer resultado a la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Término de búsqueda")
                .required(true),
        )
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción")
}

// Comandos de conexión

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot del canal de voz")
}
