use crate::attachments::AttachmentPolicy;
use crate::error::{ArchiveError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Deserializer};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for a single archive run, read once and never mutated.
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "server")]
    pub guild_id: String,
    #[serde(rename = "channel", default)]
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_token: String,
    #[serde(default)]
    pub user_cookie: String,
    #[serde(default)]
    pub save_attachments: bool,
    #[serde(default)]
    pub delete_messages: bool,
    #[serde(default)]
    pub only_channel: bool,

    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_web_base")]
    pub web_base: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    // Rate limiting & robustness
    #[serde(default = "default_search_delay", deserialize_with = "human_duration")]
    pub search_delay: Duration,
    #[serde(default = "default_delete_delay", deserialize_with = "human_duration")]
    pub delete_delay: Duration,
    #[serde(default = "default_request_timeout", deserialize_with = "human_duration")]
    pub request_timeout: Duration,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
    #[serde(default)]
    pub attachment_failures: AttachmentPolicy,
}

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn default_api_base() -> String {
    "https://discord.com/api/v9".to_string()
}

fn default_web_base() -> String {
    "https://discord.com".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_search_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_delete_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_pages() -> usize {
    4000
}

fn default_rate_limit_retries() -> u32 {
    3
}

fn human_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

impl Config {
    /// Loads the TOML settings file, then lets `DISCORD_USER_TOKEN` and
    /// `DISCORD_USER_COOKIE` (environment or `.env`) override the secrets.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenv().ok();
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ArchiveError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config = toml::from_str(&content)?;
        if let Ok(token) = env::var("DISCORD_USER_TOKEN") {
            config.user_token = token;
        }
        if let Ok(cookie) = env::var("DISCORD_USER_COOKIE") {
            config.user_cookie = cookie;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses settings without consulting the environment.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.guild_id.trim().is_empty() {
            return Err(ArchiveError::Config("server must be set".to_string()));
        }
        if self.user_id.trim().is_empty() {
            return Err(ArchiveError::Config("user_id must be set".to_string()));
        }
        if self.user_token.trim().is_empty() {
            return Err(ArchiveError::Config(
                "user_token must be set (or DISCORD_USER_TOKEN)".to_string(),
            ));
        }
        if self.only_channel && self.channel_id.trim().is_empty() {
            return Err(ArchiveError::Config(
                "only_channel requires channel to be set".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ArchiveError::Config(
                "max_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Channel filter for the search query, present only in channel-restricted mode.
    pub fn search_channel(&self) -> Option<&str> {
        self.only_channel.then_some(self.channel_id.as_str())
    }

    pub fn referer(&self) -> String {
        format!(
            "{}/channels/{}/{}",
            self.web_base.trim_end_matches('/'),
            self.guild_id,
            self.channel_id
        )
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .field("user_id", &self.user_id)
            .field("user_token", &"[REDACTED]")
            .field("user_cookie", &"[REDACTED]")
            .field("save_attachments", &self.save_attachments)
            .field("delete_messages", &self.delete_messages)
            .field("only_channel", &self.only_channel)
            .field("api_base", &self.api_base)
            .field("web_base", &self.web_base)
            .field("output_dir", &self.output_dir)
            .field("search_delay", &self.search_delay)
            .field("delete_delay", &self.delete_delay)
            .field("request_timeout", &self.request_timeout)
            .field("max_pages", &self.max_pages)
            .field("rate_limit_retries", &self.rate_limit_retries)
            .field("attachment_failures", &self.attachment_failures)
            .finish()
    }
}
