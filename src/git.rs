use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use git2::{ErrorCode, IndexAddOption, Repository};
use regex::Regex;
use reqwest::Url;
use tokio::process::Command;

use crate::config::UserAuth;

/// A remote URL broken into the parts the import cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitInfo {
    pub host: String,
    pub organisation: String,
    pub name: String,
    pub url: String,
}

impl GitInfo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organisation, self.name)
    }
}

/// Parse https, ssh and scp-style git URLs.
pub fn parse_url(url: &str) -> Result<GitInfo> {
    let url = url.trim();
    let full =
        Regex::new(r"^(?:https?|ssh|git)://(?:[^@/]+@)?(?P<host>[^/:]+)(?::\d+)?/(?P<path>.+)$")
            .unwrap();
    let scp = Regex::new(r"^(?:[^@/]+@)?(?P<host>[^/:]+):(?P<path>[^/].*)$").unwrap();

    let caps = full
        .captures(url)
        .or_else(|| scp.captures(url))
        .ok_or_else(|| anyhow!("unsupported git URL: {}", url))?;
    let host = caps["host"].to_string();
    let path = caps["path"].trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        bail!("git URL {} has no organisation and repository name", url);
    }
    Ok(GitInfo {
        host,
        organisation: segments[0].to_string(),
        name: segments[segments.len() - 1].to_string(),
        url: url.to_string(),
    })
}

/// The URL to push to, with credentials embedded for http(s) remotes.
pub fn create_push_url(clone_url: &str, auth: &UserAuth) -> Result<String> {
    if auth.is_invalid() {
        return Ok(clone_url.to_string());
    }
    let mut url = match Url::parse(clone_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => return Ok(clone_url.to_string()),
    };
    url.set_username(&auth.username)
        .map_err(|_| anyhow!("cannot set user name on {}", clone_url))?;
    url.set_password(Some(&auth.api_token))
        .map_err(|_| anyhow!("cannot set token on {}", clone_url))?;
    Ok(url.to_string())
}

/// Drop any user name or token from an http(s) URL. Other URLs are returned
/// unchanged.
pub fn strip_credentials(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed)
            if matches!(parsed.scheme(), "http" | "https")
                && (!parsed.username().is_empty() || parsed.password().is_some()) =>
        {
            if parsed.set_password(None).is_err() || parsed.set_username("").is_err() {
                return url.to_string();
            }
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

/// A named remote with the URLs declared for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCandidate {
    pub name: String,
    pub urls: Vec<String>,
}

/// Read the remotes declared in a git config file, in declaration order.
pub fn read_remotes(config_path: &Path) -> Result<Vec<RemoteCandidate>> {
    let cfg = git2::Config::open(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let mut entries = cfg
        .entries(Some(r"remote\..*\.url"))
        .with_context(|| format!("Failed to read remotes from {}", config_path.display()))?;

    let mut remotes: Vec<RemoteCandidate> = Vec::new();
    while let Some(entry) = entries.next() {
        let entry = entry?;
        let (Some(key), Some(value)) = (entry.name(), entry.value()) else {
            continue;
        };
        let Some(name) = key
            .strip_prefix("remote.")
            .and_then(|k| k.strip_suffix(".url"))
        else {
            continue;
        };
        match remotes.iter_mut().find(|r| r.name == name) {
            Some(remote) => remote.urls.push(value.to_string()),
            None => remotes.push(RemoteCandidate {
                name: name.to_string(),
                urls: vec![value.to_string()],
            }),
        }
    }
    Ok(remotes)
}

/// Root of a working tree plus its config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRoot {
    pub root: PathBuf,
    pub config: PathBuf,
}

/// Version-control operations the import workflow relies on.
#[async_trait(?Send)]
pub trait Vcs {
    /// Look for a repository in `dir` or any of its parents.
    async fn find_root(&self, dir: &Path) -> Result<Option<GitRoot>>;
    async fn init(&self, dir: &Path) -> Result<()>;
    async fn clone(&self, url: &str, dir: &Path) -> Result<()>;
    async fn add(&self, dir: &Path, pattern: &str) -> Result<()>;
    /// Commit the index; returns false when nothing changed since HEAD.
    async fn commit_if_changed(&self, dir: &Path, message: &str) -> Result<bool>;
    /// Push the current branch to `remote`.
    async fn push(&self, dir: &Path, remote: &str) -> Result<()>;
    async fn remote_add(&self, dir: &Path, name: &str, url: &str) -> Result<()>;
    async fn remotes(&self, config_path: &Path) -> Result<Vec<RemoteCandidate>>;
}

/// git2 for local repository work, the `git` binary for anything that talks
/// to a remote so the user's credential helpers apply.
#[derive(Debug, Default)]
pub struct Git;

async fn blocking<T, F>(what: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("{} task join error: {}", what, e))?
}

async fn run_git<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
    let status = Command::new("git").args(&args).status().await?;
    if !status.success() {
        bail!(
            "git {} failed with status: {}",
            args.first().map(|a| a.to_string_lossy()).unwrap_or_default(),
            status
        );
    }
    Ok(())
}

fn current_branch(repo: &Repository) -> Result<String> {
    match repo.head() {
        Ok(head) => head
            .shorthand()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("HEAD has no shorthand name")),
        Err(err) if err.code() == ErrorCode::UnbornBranch => {
            let head = repo.find_reference("HEAD")?;
            Ok(head
                .symbolic_target()
                .and_then(|t| t.strip_prefix("refs/heads/"))
                .unwrap_or("master")
                .to_string())
        }
        Err(err) => Err(err.into()),
    }
}

#[async_trait(?Send)]
impl Vcs for Git {
    async fn find_root(&self, dir: &Path) -> Result<Option<GitRoot>> {
        let dir = dir.to_path_buf();
        blocking("find_root", move || match Repository::discover(&dir) {
            Ok(repo) => Ok(Some(GitRoot {
                root: repo.workdir().unwrap_or(repo.path()).to_path_buf(),
                config: repo.path().join("config"),
            })),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to look for git in {}", dir.display()))
            }
        })
        .await
    }

    async fn init(&self, dir: &Path) -> Result<()> {
        let dir = dir.to_path_buf();
        blocking("init", move || {
            Repository::init(&dir)
                .with_context(|| format!("failed to initialise git in {}", dir.display()))?;
            Ok(())
        })
        .await
    }

    async fn clone(&self, url: &str, dir: &Path) -> Result<()> {
        tracing::info!("git: cloning {} into {}", url, dir.display());
        run_git([
            std::ffi::OsStr::new("clone"),
            std::ffi::OsStr::new(url),
            dir.as_os_str(),
        ])
        .await
        .with_context(|| format!("failed to clone {} into {}", url, dir.display()))
    }

    async fn add(&self, dir: &Path, pattern: &str) -> Result<()> {
        let dir = dir.to_path_buf();
        let pattern = pattern.to_string();
        blocking("add", move || {
            let repo = Repository::open(&dir)?;
            let mut index = repo.index()?;
            index
                .add_all([pattern.as_str()].iter(), IndexAddOption::DEFAULT, None)
                .with_context(|| format!("failed to git add {} in {}", pattern, dir.display()))?;
            index.write()?;
            Ok(())
        })
        .await
    }

    async fn commit_if_changed(&self, dir: &Path, message: &str) -> Result<bool> {
        let dir = dir.to_path_buf();
        let message = message.to_string();
        blocking("commit", move || {
            let repo = Repository::open(&dir)?;
            let mut index = repo.index()?;
            let tree_id = index.write_tree()?;
            let parent = match repo.head() {
                Ok(head) => Some(head.peel_to_commit()?),
                Err(err) if err.code() == ErrorCode::UnbornBranch => None,
                Err(err) => return Err(err.into()),
            };
            let unchanged = match &parent {
                Some(p) => p.tree_id() == tree_id,
                None => index.is_empty(),
            };
            if unchanged {
                tracing::debug!(dir = %dir.display(), "git: nothing to commit");
                return Ok(false);
            }
            let tree = repo.find_tree(tree_id)?;
            let sig = repo
                .signature()
                .or_else(|_| git2::Signature::now("onboard", "onboard@users.noreply.github.com"))?;
            let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
            repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &parents)
                .with_context(|| format!("failed to commit in {}", dir.display()))?;
            tracing::info!("git: committed '{}' in {}", message, dir.display());
            Ok(true)
        })
        .await
    }

    async fn push(&self, dir: &Path, remote: &str) -> Result<()> {
        let root = dir.to_path_buf();
        let branch = blocking("branch detect", move || {
            let repo = Repository::open(root)?;
            current_branch(&repo)
        })
        .await?;
        tracing::info!("git: pushing branch={} to {}", branch, remote);
        run_git([
            std::ffi::OsStr::new("-C"),
            dir.as_os_str(),
            std::ffi::OsStr::new("push"),
            std::ffi::OsStr::new("-u"),
            std::ffi::OsStr::new(remote),
            std::ffi::OsStr::new(&branch),
        ])
        .await
        .with_context(|| format!("failed to push {} to {} from {}", branch, remote, dir.display()))
    }

    async fn remote_add(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        let dir = dir.to_path_buf();
        let name = name.to_string();
        let url = url.to_string();
        blocking("remote add", move || {
            let repo = Repository::open(&dir)?;
            repo.remote(&name, &url)
                .with_context(|| format!("failed to add remote {} in {}", name, dir.display()))?;
            Ok(())
        })
        .await
    }

    async fn remotes(&self, config_path: &Path) -> Result<Vec<RemoteCandidate>> {
        let path = config_path.to_path_buf();
        blocking("remotes", move || read_remotes(&path)).await
    }
}
