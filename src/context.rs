use std::path::PathBuf;

pub const DEFAULT_CREDENTIALS_ID: &str = "git-credentials";
pub const DEFAULT_REMOTE: &str = "origin";

/// State accumulated while an import runs. Each phase reads what earlier
/// phases resolved and fills in what it discovers.
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub dir: PathBuf,
    pub remote_url: Option<String>,
    pub remote_name: String,
    /// Path of the `.git/config` file once a repository is known.
    pub git_config: Option<PathBuf>,
    pub credentials_id: String,
    pub organisation: Option<String>,
    pub repository: Option<String>,
}

impl ImportContext {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            remote_url: None,
            remote_name: DEFAULT_REMOTE.to_string(),
            git_config: None,
            credentials_id: DEFAULT_CREDENTIALS_ID.to_string(),
            organisation: None,
            repository: None,
        }
    }

    pub fn with_remote_url(mut self, url: Option<String>) -> Self {
        self.remote_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn has_remote_url(&self) -> bool {
        self.remote_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}
