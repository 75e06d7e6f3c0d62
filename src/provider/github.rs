use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{CreatedRepository, GitProvider, check_repository_name};
use crate::config::{GitServer, UserAuth};

const PAGE_SIZE: u8 = 100;

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u8,
}

#[derive(Debug, Deserialize)]
struct OrgEntry {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoEntry {
    full_name: String,
    clone_url: String,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRepoPayload<'a> {
    name: &'a str,
    private: bool,
}

/// github.com or a GitHub Enterprise server.
pub struct GitHubProvider {
    client: Octocrab,
    server: String,
}

impl GitHubProvider {
    pub fn new(server: &GitServer, auth: &UserAuth) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(auth.api_token.clone());
        if let Some(api) = enterprise_api(&server.url) {
            builder = builder
                .base_uri(api.as_str())
                .with_context(|| format!("invalid GitHub API URL {}", api))?;
        }
        let client = builder.build().context("failed to build GitHub client")?;
        Ok(Self {
            client,
            server: server.url.clone(),
        })
    }
}

/// API root for GitHub Enterprise; github.com uses the client default.
fn enterprise_api(server_url: &str) -> Option<String> {
    let base = server_url.trim_end_matches('/');
    let host = base
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base);
    if host == "github.com" || host == "www.github.com" {
        None
    } else {
        Some(format!("{}/api/v3/", base))
    }
}

fn is_not_found(err: &octocrab::Error) -> bool {
    if let octocrab::Error::GitHub { source, .. } = err {
        return source.status_code == StatusCode::NOT_FOUND;
    }
    false
}

#[async_trait(?Send)]
impl GitProvider for GitHubProvider {
    async fn list_organisations(&self) -> Result<Vec<String>> {
        let first: octocrab::Page<OrgEntry> = self
            .client
            .get("user/orgs", Some(&PageParams { per_page: PAGE_SIZE }))
            .await
            .with_context(|| format!("failed to list organisations on {}", self.server))?;
        let orgs = self
            .client
            .all_pages(first)
            .await
            .with_context(|| format!("failed to list organisations on {}", self.server))?;
        Ok(orgs.into_iter().map(|o| o.login).collect())
    }

    async fn validate_repository_name(&self, owner: &str, name: &str) -> Result<()> {
        check_repository_name(name)?;
        let found: octocrab::Result<RepoEntry> = self
            .client
            .get(format!("repos/{}/{}", owner, name), None::<&()>)
            .await;
        match found {
            Ok(repo) => bail!("repository {} already exists", repo.full_name),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to look up {}/{} on {}", owner, name, self.server)),
        }
    }

    async fn create_repository(
        &self,
        org: Option<&str>,
        name: &str,
        private: bool,
    ) -> Result<CreatedRepository> {
        let route = match org {
            Some(org) => format!("orgs/{}/repos", org),
            None => String::from("user/repos"),
        };
        let payload = CreateRepoPayload { name, private };
        let repo: RepoEntry = self
            .client
            .post(route, Some(&payload))
            .await
            .with_context(|| format!("failed to create repository {} on {}", name, self.server))?;
        tracing::info!(repo = %repo.full_name, "github: created repository");
        Ok(CreatedRepository {
            clone_url: repo.clone_url,
            html_url: repo.html_url,
        })
    }
}
