use std::path::Path;

use anyhow::{Result, anyhow, bail};

use super::Importer;
use crate::context::DEFAULT_REMOTE;
use crate::files::{self, DEFAULT_GITIGNORE, GITIGNORE};
use crate::git::{GitRoot, RemoteCandidate, strip_credentials};
use crate::prompt::Prompter;

const DEFAULT_COMMIT_MESSAGE: &str = "Initial import";

impl Importer<'_> {
    /// Find the git repository holding `dir`, offering to create one when
    /// there is none.
    pub async fn discover_git(&self, dir: &Path) -> Result<GitRoot> {
        if let Some(found) = self.vcs.find_root(dir).await? {
            tracing::debug!(root = %found.root.display(), "discover: using existing repository");
            return Ok(found);
        }
        if dir.as_os_str().is_empty() {
            bail!("No directory specified!");
        }

        println!("The directory {} is not yet using git", dir.display());
        if !self
            .prompter
            .confirm("Would you like to initialise git now?", true)?
        {
            bail!("Please initialise git yourself then try again");
        }

        self.vcs.init(dir).await?;
        files::write_if_absent(&dir.join(GITIGNORE), DEFAULT_GITIGNORE).await?;
        self.vcs.add(dir, GITIGNORE).await?;
        self.vcs.add(dir, "*").await?;

        let message = self
            .prompter
            .input("Commit message:", DEFAULT_COMMIT_MESSAGE, None)?;
        self.vcs.commit_if_changed(dir, &message).await?;
        println!("\nGit repository created");

        Ok(GitRoot {
            root: dir.to_path_buf(),
            config: dir.join(".git").join("config"),
        })
    }

    /// The remote to push to and the URL to import, as `(remote, url)`.
    /// Pushes go to `origin` whenever it exists, whichever URL was chosen. The
    /// URL comes back without credentials. `None` when the repository has no
    /// remotes yet.
    pub async fn discover_remote_url(
        &self,
        git_config: Option<&Path>,
    ) -> Result<Option<(String, String)>> {
        let config = git_config.ok_or_else(|| anyhow!("No git config file defined!"))?;
        let remotes = self.vcs.remotes(config).await?;
        tracing::debug!(count = remotes.len(), "discover: read remotes");

        let Some((chosen, url)) = select_remote_url(&remotes, self.prompter)? else {
            return Ok(None);
        };
        let push_remote = if remotes.iter().any(|r| r.name == DEFAULT_REMOTE) {
            DEFAULT_REMOTE.to_string()
        } else {
            chosen
        };
        Ok(Some((push_remote, strip_credentials(&url))))
    }
}

/// Prefer `upstream`, then `origin`, then the only URL there is; ask when
/// several remain.
pub fn select_remote_url(
    remotes: &[RemoteCandidate],
    prompter: &dyn Prompter,
) -> Result<Option<(String, String)>> {
    for preferred in ["upstream", "origin"] {
        if let Some(remote) = remotes.iter().find(|r| r.name == preferred)
            && let Some(url) = remote.urls.first()
        {
            return Ok(Some((remote.name.clone(), url.clone())));
        }
    }

    let all: Vec<(&str, &str)> = remotes
        .iter()
        .flat_map(|r| r.urls.iter().map(move |u| (r.name.as_str(), u.as_str())))
        .collect();
    match all.len() {
        0 => Ok(None),
        1 => Ok(Some((all[0].0.to_string(), all[0].1.to_string()))),
        _ => {
            let options: Vec<String> = all.iter().map(|(_, u)| u.to_string()).collect();
            let answer = prompter.select("Choose a remote git URL:", &options)?;
            let (name, url) = all
                .iter()
                .find(|(_, u)| *u == answer)
                .ok_or_else(|| anyhow!("{} is not a remote URL", answer))?;
            Ok(Some((name.to_string(), url.to_string())))
        }
    }
}
