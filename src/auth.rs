use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::config::{Config, GitServer, UserAuth, save_config};
use crate::prompt::Prompter;

pub const USERNAME_ENV: &str = "ONBOARD_GIT_USERNAME";
pub const TOKEN_ENV: &str = "ONBOARD_GIT_TOKEN";

/// Credentials from the environment, when both variables are set.
pub fn env_user_auth() -> Option<UserAuth> {
    let username = std::env::var(USERNAME_ENV).ok().filter(|v| !v.is_empty())?;
    let api_token = std::env::var(TOKEN_ENV).ok().filter(|v| !v.is_empty())?;
    Some(UserAuth {
        username,
        api_token,
    })
}

/// Git servers and their users, backed by the config file.
#[derive(Debug)]
pub struct AuthService {
    config: Config,
    path: Option<PathBuf>,
}

impl AuthService {
    /// `path` is where new credentials get persisted; `None` keeps them in memory.
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self { config, path }
    }

    pub fn pick_server(&self, prompter: &dyn Prompter) -> Result<GitServer> {
        let servers = &self.config.servers;
        match servers.len() {
            0 => bail!("no git servers configured"),
            1 => Ok(servers[0].clone()),
            _ => {
                let options: Vec<String> = servers.iter().map(|s| s.description()).collect();
                let answer = prompter.select("Which git provider?", &options)?;
                let idx = options
                    .iter()
                    .position(|o| *o == answer)
                    .context("selected git provider is not configured")?;
                Ok(servers[idx].clone())
            }
        }
    }

    /// The user to act as on `server`. An empty (invalid) auth is returned
    /// when nothing is known yet.
    pub fn pick_user_auth(&self, server: &GitServer, prompter: &dyn Prompter) -> Result<UserAuth> {
        if let Some(auth) = env_user_auth() {
            tracing::debug!(user = %auth.username, "auth: using credentials from environment");
            return Ok(auth);
        }
        match server.users.len() {
            0 => Ok(UserAuth::default()),
            1 => Ok(server.users[0].clone()),
            _ => {
                let mut options: Vec<String> =
                    server.users.iter().map(|u| u.username.clone()).collect();
                if let Some(current) = &server.current_user
                    && let Some(pos) = options.iter().position(|u| u == current)
                {
                    let current = options.remove(pos);
                    options.insert(0, current);
                }
                let answer = prompter.select("Which user name?", &options)?;
                server
                    .users
                    .iter()
                    .find(|u| u.username == answer)
                    .cloned()
                    .context("selected user is not configured")
            }
        }
    }

    pub fn edit_user_auth(
        &self,
        prompter: &dyn Prompter,
        auth: &mut UserAuth,
        default_username: &str,
    ) -> Result<()> {
        let default_username = if auth.username.is_empty() {
            default_username
        } else {
            auth.username.as_str()
        };
        let username = prompter.input("Git user name", default_username, None)?;
        // Never echo a stored token; an empty answer keeps it.
        let token = prompter.input("API Token", "", None)?;
        auth.username = username.trim().to_string();
        if !token.trim().is_empty() {
            auth.api_token = token.trim().to_string();
        }
        Ok(())
    }

    pub async fn save_user_auth(&mut self, server_url: &str, auth: &UserAuth) -> Result<()> {
        let server = self
            .config
            .servers
            .iter_mut()
            .find(|s| s.url == server_url)
            .with_context(|| format!("no git server configured for {}", server_url))?;
        match server.users.iter_mut().find(|u| u.username == auth.username) {
            Some(existing) => *existing = auth.clone(),
            None => server.users.push(auth.clone()),
        }
        server.current_user = Some(auth.username.clone());

        if let Some(path) = &self.path {
            save_config(path, &self.config)
                .await
                .context("Failed to store git auth configuration")?;
            tracing::info!("auth: saved credentials for {} to {}", server_url, path.display());
        }
        Ok(())
    }
}
