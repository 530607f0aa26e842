use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auth::{parse_user_ids, parse_usernames, AllowList};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub allowed_user_ids: Vec<u64>,
    #[serde(default)]
    pub allowed_usernames: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    /// Loopback port for the agent-facing HTTP server.
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_dir")]
    pub directory: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            directory: default_workspace_dir(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("workspace")
}

fn default_queue_capacity() -> usize {
    100
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load the optional TOML file, then let the environment override it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            ),
            None => None,
        };
        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    pub fn from_sources(
        toml_content: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config: Config = match toml_content {
            Some(content) => toml::from_str(content).context("Failed to parse config file")?,
            None => Config::default(),
        };

        if let Some(token) = env("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty()) {
            config.telegram.bot_token = token;
        }
        if let Some(ids) = env("TELEGRAM_BOT_ALLOWED_USERIDS") {
            config.telegram.allowed_user_ids = parse_user_ids(&ids)?;
        }
        if let Some(names) = env("TELEGRAM_BOT_ALLOWED_USERNAMES") {
            config.telegram.allowed_usernames = parse_usernames(&names);
        }
        if let Some(port) = env("PORT").filter(|p| !p.is_empty()) {
            let port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT: {}", port))?;
            config.server.port = Some(port);
        }
        if let Some(dir) = env("WORKSPACE_DIR").filter(|d| !d.is_empty()) {
            config.workspace.directory = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            anyhow::bail!("TELEGRAM_BOT_TOKEN is not set");
        }
        if self.server.port.is_none() {
            anyhow::bail!("PORT is not set");
        }
        if self.relay.queue_capacity == 0 {
            anyhow::bail!("relay.queue_capacity must be greater than zero");
        }
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or_default()
    }

    /// Address the agent uses to reach the relay.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port())
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(
            self.telegram.allowed_user_ids.iter().copied(),
            self.telegram.allowed_usernames.iter().cloned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_only() {
        let config = Config::from_sources(
            None,
            env_of(&[
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("TELEGRAM_BOT_ALLOWED_USERIDS", "1, 2,,3"),
                ("TELEGRAM_BOT_ALLOWED_USERNAMES", "ada, grace"),
                ("PORT", "9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.allowed_user_ids, vec![1, 2, 3]);
        assert_eq!(config.telegram.allowed_usernames, vec!["ada", "grace"]);
        assert_eq!(config.port(), 9000);
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.relay.queue_capacity, 100);
        assert_eq!(config.workspace.directory, PathBuf::from("workspace"));
        assert_eq!(config.allow_list().len(), 5);
    }

    #[test]
    fn test_env_overrides_file() {
        let toml = r#"
[telegram]
bot_token = "from-file"
allowed_user_ids = [10]

[server]
port = 8000

[relay]
queue_capacity = 5
"#;
        let config = Config::from_sources(Some(toml), env_of(&[("PORT", "8001")])).unwrap();

        assert_eq!(config.telegram.bot_token, "from-file");
        assert_eq!(config.telegram.allowed_user_ids, vec![10]);
        assert_eq!(config.port(), 8001);
        assert_eq!(config.relay.queue_capacity, 5);
    }

    #[test]
    fn test_malformed_user_id_is_fatal() {
        let err = Config::from_sources(
            None,
            env_of(&[
                ("TELEGRAM_BOT_TOKEN", "t"),
                ("TELEGRAM_BOT_ALLOWED_USERIDS", "1,x2"),
                ("PORT", "9000"),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("x2"));
    }

    #[test]
    fn test_missing_token_or_port() {
        assert!(Config::from_sources(None, env_of(&[("PORT", "1")])).is_err());
        assert!(Config::from_sources(None, env_of(&[("TELEGRAM_BOT_TOKEN", "t")])).is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let toml = "[relay]\nqueue_capacity = 0\n";
        let err = Config::from_sources(
            Some(toml),
            env_of(&[("TELEGRAM_BOT_TOKEN", "t"), ("PORT", "1")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }
}
