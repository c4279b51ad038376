//! Bot configuration loaded from the environment.
//!
//! The only setting is the Discord bot token:
//!
//! ```bash
//! export DISCORD_BOT_TOKEN="..."
//! ```
//!
//! A `.env` file in the working directory is loaded first if present.

use anyhow::{Result, bail};

pub const BOT_TOKEN_VAR: &str = "DISCORD_BOT_TOKEN";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup(BOT_TOKEN_VAR).unwrap_or_default();
        let bot_token = bot_token.trim();
        if bot_token.is_empty() {
            bail!("No token provided. Set {BOT_TOKEN_VAR} in your .env file.");
        }

        Ok(Self {
            bot_token: bot_token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_token() {
        let config = Config::from_lookup(|key| {
            (key == BOT_TOKEN_VAR).then(|| " abc.def.ghi\n".to_string())
        })
        .unwrap();
        assert_eq!(config.bot_token, "abc.def.ghi");
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains(BOT_TOKEN_VAR));
    }

    #[test]
    fn blank_token_is_an_error() {
        assert!(Config::from_lookup(|_| Some("   ".to_string())).is_err());
    }
}
