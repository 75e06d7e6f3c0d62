use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use urlencoding::encode as url_encode;

use super::{CreatedRepository, GitProvider, check_repository_name};
use crate::config::{GitServer, UserAuth};

const GITLAB_API_VERSION: &str = "v4";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Group {
    full_path: String,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Project {
    path_with_namespace: String,
    http_url_to_repo: String,
    web_url: String,
}

#[derive(Debug, Serialize)]
struct CreateProjectPayload<'a> {
    name: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_id: Option<u64>,
    visibility: &'a str,
}

/// gitlab.com or a self-managed GitLab instance.
pub struct GitLabProvider {
    http: Client,
    api: String,
    token: String,
}

impl GitLabProvider {
    pub fn new(server: &GitServer, auth: &UserAuth) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("onboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build GitLab client")?;
        Ok(Self {
            http,
            api: format!(
                "{}/api/{}",
                server.url.trim_end_matches('/'),
                GITLAB_API_VERSION
            ),
            token: auth.api_token.clone(),
        })
    }

    /// GET returning `None` on 404.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.api, path);
        let resp = self
            .http
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("GitLab request {} failed", url))?;
        Ok(Some(resp.json().await?))
    }
}

/// GitLab paths must start with a letter, digit or underscore and must not
/// end in `.git` or `.atom`.
fn check_gitlab_path(name: &str) -> Result<()> {
    check_repository_name(name)?;
    if name.starts_with(['.', '-']) {
        bail!("repository name {} must start with a letter, digit or '_'", name);
    }
    if name.ends_with(".git") || name.ends_with(".atom") {
        bail!("repository name {} must not end in .git or .atom", name);
    }
    Ok(())
}

#[async_trait(?Send)]
impl GitProvider for GitLabProvider {
    async fn list_organisations(&self) -> Result<Vec<String>> {
        let mut groups = Vec::new();
        for page in 1.. {
            let batch: Vec<Group> = self
                .get_json(&format!(
                    "/groups?min_access_level=30&per_page={}&page={}",
                    PAGE_SIZE, page
                ))
                .await?
                .unwrap_or_default();
            let last = batch.len() < PAGE_SIZE;
            groups.extend(batch.into_iter().map(|g| g.full_path));
            if last {
                break;
            }
        }
        Ok(groups)
    }

    async fn validate_repository_name(&self, owner: &str, name: &str) -> Result<()> {
        check_gitlab_path(name)?;
        let full = format!("{}/{}", owner, name);
        let existing: Option<Project> = self
            .get_json(&format!("/projects/{}", url_encode(&full)))
            .await?;
        if let Some(project) = existing {
            bail!("repository {} already exists", project.path_with_namespace);
        }
        Ok(())
    }

    async fn create_repository(
        &self,
        org: Option<&str>,
        name: &str,
        private: bool,
    ) -> Result<CreatedRepository> {
        let namespace_id = match org {
            Some(org) => {
                let ns: Namespace = self
                    .get_json(&format!("/namespaces/{}", url_encode(org)))
                    .await?
                    .with_context(|| format!("no GitLab namespace named {}", org))?;
                Some(ns.id)
            }
            None => None,
        };
        let payload = CreateProjectPayload {
            name,
            path: name,
            namespace_id,
            visibility: if private { "private" } else { "public" },
        };
        let url = format!("{}/projects", self.api);
        let project: Project = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("failed to create repository {}", name))?
            .json()
            .await?;
        tracing::info!(repo = %project.path_with_namespace, "gitlab: created repository");
        Ok(CreatedRepository {
            clone_url: project.http_url_to_repo,
            html_url: project.web_url,
        })
    }
}
