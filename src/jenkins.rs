use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tera::{Context as TeraContext, Tera};
use urlencoding::encode as url_encode;

use crate::config::JenkinsSettings;
use crate::git::GitInfo;

const FOLDER_TEMPLATE: &str = include_str!("../templates/folder.xml");
const MULTIBRANCH_TEMPLATE: &str = include_str!("../templates/multibranch.xml");

pub const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";

/// A job (or folder) as reported by the build server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    #[serde(rename = "_class", default)]
    pub class: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
}

/// Everything needed to submit one multi-branch job.
#[derive(Debug, Clone)]
pub struct BuildJobDescriptor {
    pub folder: String,
    pub job_name: String,
    pub xml: String,
}

impl BuildJobDescriptor {
    pub fn multibranch(info: &GitInfo, credentials_id: &str) -> Result<Self> {
        Ok(Self {
            folder: info.organisation.clone(),
            job_name: info.name.clone(),
            xml: render_multibranch_xml(info, credentials_id)?,
        })
    }
}

#[async_trait(?Send)]
pub trait BuildServer {
    /// `None` when no job of that name exists.
    async fn get_job(&self, name: &str) -> Result<Option<Job>>;
    async fn create_job_with_xml(&self, xml: &str, name: &str) -> Result<()>;
    async fn get_job_by_path(&self, folder: &str, job: &str) -> Result<Option<Job>>;
    async fn create_folder_job_with_xml(&self, xml: &str, folder: &str, job: &str) -> Result<()>;
    async fn build(&self, job: &Job, params: &[(String, String)]) -> Result<()>;
    fn base_url(&self) -> &str;

    fn job_url_path(&self, name: &str) -> String {
        format!("job/{}/", url_encode(name))
    }
}

pub fn url_join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Render with tera's autoescape on, so every inserted value is escaped. The
/// numeric references it emits for `/` and `'` are valid XML.
fn render_xml(template: &str, ctx: &TeraContext, what: &str) -> Result<String> {
    Tera::one_off(template, ctx, true)
        .map_err(|err| anyhow!("failed to render {} template: {}", what, err))
}

pub fn render_folder_xml(job_url: &str, name: &str) -> Result<String> {
    let mut ctx = TeraContext::new();
    ctx.insert("name", name);
    ctx.insert("url", job_url);
    render_xml(FOLDER_TEMPLATE, &ctx, "folder")
}

pub fn render_multibranch_xml(info: &GitInfo, credentials_id: &str) -> Result<String> {
    let mut ctx = TeraContext::new();
    ctx.insert("organisation", &info.organisation);
    ctx.insert("name", &info.name);
    ctx.insert(
        "source_id",
        &format!("onboard-{}-{}", info.organisation, info.name),
    );
    ctx.insert("remote_url", &info.url);
    ctx.insert("credentials_id", credentials_id);
    render_xml(MULTIBRANCH_TEMPLATE, &ctx, "multibranch")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Crumb {
    crumb: String,
    crumb_request_field: String,
}

/// Talks to the Jenkins REST API.
pub struct JenkinsClient {
    http: Client,
    base_url: String,
    username: Option<String>,
    api_token: Option<String>,
}

impl JenkinsClient {
    pub fn new(settings: &JenkinsSettings) -> Result<Self> {
        if settings.url.trim().is_empty() {
            bail!("no Jenkins URL configured; pass --jenkins-url or set ONBOARD_JENKINS_URL");
        }
        let http = Client::builder()
            .user_agent(concat!("onboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build Jenkins client")?;
        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
            username: settings.username.clone().filter(|u| !u.is_empty()),
            api_token: settings.api_token.clone(),
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.username {
            Some(user) => req.basic_auth(user, self.api_token.as_deref()),
            None => req,
        }
    }

    async fn crumb(&self) -> Result<Option<Crumb>> {
        let url = url_join(&self.base_url, "crumbIssuer/api/json");
        let resp = self.request(Method::GET, &url).send().await?;
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "jenkins: no crumb issued");
            return Ok(None);
        }
        Ok(Some(resp.json().await?))
    }

    async fn post(&self, url: &str) -> Result<RequestBuilder> {
        let mut req = self.request(Method::POST, url);
        if let Some(crumb) = self.crumb().await? {
            req = req.header(crumb.crumb_request_field, crumb.crumb);
        }
        Ok(req)
    }

    async fn fetch_job(&self, path: &str) -> Result<Option<Job>> {
        let url = url_join(&self.base_url, &format!("{}api/json", path));
        let resp = self
            .request(Method::GET, &url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("failed to query {}", url))?;
        Ok(Some(resp.json().await?))
    }

    async fn post_xml(&self, create_url: &str, name: &str, xml: &str) -> Result<()> {
        self.post(create_url)
            .await?
            .query(&[("name", name)])
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(xml.to_string())
            .send()
            .await
            .with_context(|| format!("request to {} failed", create_url))?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl BuildServer for JenkinsClient {
    async fn get_job(&self, name: &str) -> Result<Option<Job>> {
        self.fetch_job(&self.job_url_path(name)).await
    }

    async fn create_job_with_xml(&self, xml: &str, name: &str) -> Result<()> {
        let url = url_join(&self.base_url, "createItem");
        self.post_xml(&url, name, xml).await
    }

    async fn get_job_by_path(&self, folder: &str, job: &str) -> Result<Option<Job>> {
        let path = format!("{}{}", self.job_url_path(folder), self.job_url_path(job));
        self.fetch_job(&path).await
    }

    async fn create_folder_job_with_xml(&self, xml: &str, folder: &str, job: &str) -> Result<()> {
        let url = url_join(
            &self.base_url,
            &format!("{}createItem", self.job_url_path(folder)),
        );
        self.post_xml(&url, job, xml).await
    }

    async fn build(&self, job: &Job, params: &[(String, String)]) -> Result<()> {
        let req = if params.is_empty() {
            self.post(&url_join(&job.url, "build"))
                .await?
                .query(&[("delay", "0sec")])
        } else {
            self.post(&url_join(&job.url, "buildWithParameters"))
                .await?
                .form(params)
        };
        req.send().await?.error_for_status()?;
        Ok(())
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
