//! Hosted repository providers.
//!
//! Each backend implements [`GitProvider`]; [`DefaultProviderFactory`] picks
//! one from the configured server kind.

mod github;
mod gitlab;

use anyhow::{Result, bail};
use async_trait::async_trait;
use regex::Regex;

use crate::config::{GitServer, ProviderKind, UserAuth};
use crate::prompt::Prompter;

pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;

/// URLs of a freshly created repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRepository {
    pub clone_url: String,
    pub html_url: String,
}

#[async_trait(?Send)]
pub trait GitProvider {
    /// Organisations the authenticated user may create repositories in.
    async fn list_organisations(&self) -> Result<Vec<String>>;

    /// Fails when `name` breaks the provider's naming rules or is taken.
    async fn validate_repository_name(&self, owner: &str, name: &str) -> Result<()>;

    /// `org` of `None` creates the repository in the user's own namespace.
    async fn create_repository(
        &self,
        org: Option<&str>,
        name: &str,
        private: bool,
    ) -> Result<CreatedRepository>;
}

pub trait ProviderFactory {
    fn create_provider(&self, server: &GitServer, auth: &UserAuth) -> Result<Box<dyn GitProvider>>;
}

#[derive(Debug, Default)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn create_provider(&self, server: &GitServer, auth: &UserAuth) -> Result<Box<dyn GitProvider>> {
        tracing::debug!(server = %server.url, kind = ?server.kind, "provider: creating client");
        Ok(match server.kind {
            ProviderKind::Github => Box::new(GitHubProvider::new(server, auth)?),
            ProviderKind::Gitlab => Box::new(GitLabProvider::new(server, auth)?),
        })
    }
}

/// Ask which namespace to create the repository in. `None` means the user's
/// own namespace; no question is asked when the user has no organisations.
pub async fn pick_organisation(
    provider: &dyn GitProvider,
    username: &str,
    prompter: &dyn Prompter,
) -> Result<Option<String>> {
    let orgs: Vec<String> = provider
        .list_organisations()
        .await?
        .into_iter()
        .filter(|o| o != username)
        .collect();
    if orgs.is_empty() {
        return Ok(None);
    }
    let mut options = vec![username.to_string()];
    options.extend(orgs);
    let answer = prompter.select("Which organisation do you want to use?", &options)?;
    Ok(if answer == username { None } else { Some(answer) })
}

/// Naming rules shared by the supported providers.
pub(crate) fn check_repository_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Repository name is required");
    }
    let allowed = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
    if !allowed.is_match(name) {
        bail!(
            "repository name {} may only contain letters, digits, '.', '-' and '_'",
            name
        );
    }
    if name == "." || name == ".." {
        bail!("repository name {} is reserved", name);
    }
    if name.len() > 100 {
        bail!("repository name is longer than 100 characters");
    }
    Ok(())
}
