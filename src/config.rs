use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,

    // Límites
    pub resolve_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.25".to_string())
                .parse()?,

            // Límites
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Chequeos de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 2.0, recibido: {}",
                self.default_volume
            );
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("El timeout de resolución debe ser mayor a 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults, deben proveerse)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Audio
            default_volume: 0.25,

            // Límites
            resolve_timeout_secs: 30,
        }
    }
}
