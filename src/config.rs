use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// On-disk settings: the build server to register jobs with and the git
/// servers (with their users) repositories can be created on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jenkins: Option<JenkinsSettings>,
    #[serde(default)]
    pub servers: Vec<GitServer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JenkinsSettings {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Github,
    Gitlab,
}

impl ProviderKind {
    /// Where a user creates the API token we need.
    pub fn token_url(&self, server_url: &str) -> String {
        let base = server_url.trim_end_matches('/');
        match self {
            ProviderKind::Github => format!(
                "{}/settings/tokens/new?scopes=repo,read:user,user:email,write:repo_hook",
                base
            ),
            ProviderKind::Gitlab => format!(
                "{}/-/user_settings/personal_access_tokens?scopes=api,write_repository",
                base
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitServer {
    pub name: String,
    pub kind: ProviderKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<String>,
    #[serde(default)]
    pub users: Vec<UserAuth>,
}

impl GitServer {
    pub fn github() -> Self {
        Self {
            name: String::from("GitHub"),
            kind: ProviderKind::Github,
            url: String::from("https://github.com"),
            current_user: None,
            users: Vec::new(),
        }
    }

    pub fn description(&self) -> String {
        format!("{} at {}", self.name, self.url)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuth {
    pub username: String,
    pub api_token: String,
}

impl UserAuth {
    pub fn is_invalid(&self) -> bool {
        self.username.trim().is_empty() || self.api_token.trim().is_empty()
    }
}

/// `<config dir>/onboard/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("onboard").join("config.toml"))
}

pub async fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config: not found, using defaults");
        return Ok(Config::with_defaults(Config::default()));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Config::with_defaults(cfg))
}

pub async fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(cfg).context("failed to serialize config")?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

impl Config {
    /// Fill in a GitHub server when none is configured.
    pub fn with_defaults(mut cfg: Config) -> Config {
        if cfg.servers.is_empty() {
            cfg.servers.push(GitServer::github());
        }
        cfg
    }
}
