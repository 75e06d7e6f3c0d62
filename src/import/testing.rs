//! In-memory collaborators for exercising the import phases.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use git2::{IndexAddOption, Repository, Signature};

use super::Importer;
use crate::auth::AuthService;
use crate::config::{Config, GitServer, ProviderKind, UserAuth};
use crate::git::{Git, GitRoot, RemoteCandidate, Vcs};
use crate::jenkins::{BuildServer, Job};
use crate::prompt::{Answer, ScriptedPrompter};
use crate::provider::{CreatedRepository, GitProvider, ProviderFactory};
use crate::scaffold::{ScaffoldProfile, Scaffolder};

pub(crate) const JENKINS_URL: &str = "http://jenkins.example.com";

/// Create a repository with one commit and, optionally, an `origin` remote.
pub(crate) fn init_repo(root: &Path, origin: Option<&str>) -> Result<Repository> {
    std::fs::write(root.join("README.md"), "# project\n")?;
    let repo = Repository::init(root)?;
    {
        let mut idx = repo.index()?;
        idx.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        idx.write()?;
        let oid = idx.write_tree()?;
        let tree = repo.find_tree(oid)?;
        let sig = Signature::now("onboard", "onboard@example.com")?;
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])?;
    }
    if let Some(url) = origin {
        repo.remote("origin", url)?;
    }
    Ok(repo)
}

/// Commit messages from HEAD backwards; empty for an unborn HEAD.
pub(crate) fn commit_messages(root: &Path) -> Result<Vec<String>> {
    let repo = Repository::open(root)?;
    if repo.head().is_err() {
        return Ok(Vec::new());
    }
    let mut walk = repo.revwalk()?;
    walk.push_head()?;
    let mut messages = Vec::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        messages.push(commit.message().unwrap_or_default().to_string());
    }
    Ok(messages)
}

/// Real git for local work; clone and push are simulated.
#[derive(Default)]
pub(crate) struct RecordingVcs {
    git: Git,
    pushes: RefCell<Vec<(PathBuf, String)>>,
    clones: RefCell<Vec<(String, PathBuf)>>,
}

impl RecordingVcs {
    pub(crate) fn pushes(&self) -> Vec<(PathBuf, String)> {
        self.pushes.borrow().clone()
    }

    pub(crate) fn clones(&self) -> Vec<(String, PathBuf)> {
        self.clones.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Vcs for RecordingVcs {
    async fn find_root(&self, dir: &Path) -> Result<Option<GitRoot>> {
        self.git.find_root(dir).await
    }

    async fn init(&self, dir: &Path) -> Result<()> {
        self.git.init(dir).await
    }

    async fn clone(&self, url: &str, dir: &Path) -> Result<()> {
        init_repo(dir, Some(url))?;
        self.clones
            .borrow_mut()
            .push((url.to_string(), dir.to_path_buf()));
        Ok(())
    }

    async fn add(&self, dir: &Path, pattern: &str) -> Result<()> {
        self.git.add(dir, pattern).await
    }

    async fn commit_if_changed(&self, dir: &Path, message: &str) -> Result<bool> {
        self.git.commit_if_changed(dir, message).await
    }

    async fn push(&self, dir: &Path, remote: &str) -> Result<()> {
        let dir = dir.canonicalize()?;
        self.pushes.borrow_mut().push((dir, remote.to_string()));
        Ok(())
    }

    async fn remote_add(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        self.git.remote_add(dir, name, url).await
    }

    async fn remotes(&self, config_path: &Path) -> Result<Vec<RemoteCandidate>> {
        self.git.remotes(config_path).await
    }
}

/// Writes a fixed Dockerfile, like a generator that is already up to date
/// on the second run.
#[derive(Default)]
pub(crate) struct FakeScaffolder {
    pub(crate) fail: bool,
    calls: RefCell<Vec<(PathBuf, ScaffoldProfile)>>,
}

impl FakeScaffolder {
    pub(crate) fn calls(&self) -> Vec<PathBuf> {
        self.calls.borrow().iter().map(|(d, _)| d.clone()).collect()
    }

    pub(crate) fn profiles(&self) -> Vec<ScaffoldProfile> {
        self.calls.borrow().iter().map(|(_, p)| *p).collect()
    }
}

#[async_trait(?Send)]
impl Scaffolder for FakeScaffolder {
    async fn generate(&self, dir: &Path, profile: ScaffoldProfile) -> Result<()> {
        self.calls.borrow_mut().push((dir.to_path_buf(), profile));
        if self.fail {
            bail!("draft exited with status: exit status: 1");
        }
        std::fs::write(dir.join("Dockerfile"), "FROM scratch\n")?;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct ProviderState {
    pub(crate) orgs: Vec<String>,
    pub(crate) existing: Vec<String>,
    pub(crate) created: RefCell<Vec<(Option<String>, String, bool)>>,
    pub(crate) users: RefCell<Vec<String>>,
}

struct FakeProvider {
    state: Rc<ProviderState>,
    username: String,
}

#[async_trait(?Send)]
impl GitProvider for FakeProvider {
    async fn list_organisations(&self) -> Result<Vec<String>> {
        Ok(self.state.orgs.clone())
    }

    async fn validate_repository_name(&self, owner: &str, name: &str) -> Result<()> {
        crate::provider::check_repository_name(name)?;
        let full = format!("{}/{}", owner, name);
        if self.state.existing.contains(&full) {
            bail!("repository {} already exists", full);
        }
        Ok(())
    }

    async fn create_repository(
        &self,
        org: Option<&str>,
        name: &str,
        private: bool,
    ) -> Result<CreatedRepository> {
        self.state
            .created
            .borrow_mut()
            .push((org.map(|o| o.to_string()), name.to_string(), private));
        let owner = org.unwrap_or(&self.username);
        Ok(CreatedRepository {
            clone_url: format!("https://git.example.com/{}/{}.git", owner, name),
            html_url: format!("https://git.example.com/{}/{}", owner, name),
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeProviderFactory {
    pub(crate) state: Rc<ProviderState>,
}

impl FakeProviderFactory {
    pub(crate) fn created(&self) -> Vec<(Option<String>, String, bool)> {
        self.state.created.borrow().clone()
    }

    pub(crate) fn users(&self) -> Vec<String> {
        self.state.users.borrow().clone()
    }
}

impl ProviderFactory for FakeProviderFactory {
    fn create_provider(
        &self,
        _server: &GitServer,
        auth: &UserAuth,
    ) -> Result<Box<dyn GitProvider>> {
        self.state.users.borrow_mut().push(auth.username.clone());
        Ok(Box::new(FakeProvider {
            state: Rc::clone(&self.state),
            username: auth.username.clone(),
        }))
    }
}

/// Jobs keyed by their folder path (`acme`, `acme/widget`).
#[derive(Default)]
pub(crate) struct FakeBuildServer {
    jobs: RefCell<BTreeMap<String, Job>>,
    created_xml: RefCell<Vec<(String, String)>>,
    builds: RefCell<Vec<String>>,
    /// Accept creations without making the job visible afterwards.
    pub(crate) lose_created_jobs: bool,
    pub(crate) fail_builds: bool,
}

impl FakeBuildServer {
    pub(crate) fn insert(&self, path: &str, class: &str) {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let url = format!("{}/job/{}/", JENKINS_URL, path.replace('/', "/job/"));
        self.jobs.borrow_mut().insert(
            path.to_string(),
            Job {
                class: class.to_string(),
                name,
                url,
            },
        );
    }

    pub(crate) fn has_job(&self, path: &str) -> bool {
        self.jobs.borrow().contains_key(path)
    }

    pub(crate) fn job(&self, path: &str) -> Option<Job> {
        self.jobs.borrow().get(path).cloned()
    }

    pub(crate) fn created_xml(&self) -> Vec<(String, String)> {
        self.created_xml.borrow().clone()
    }

    pub(crate) fn builds(&self) -> Vec<String> {
        self.builds.borrow().clone()
    }
}

#[async_trait(?Send)]
impl BuildServer for FakeBuildServer {
    async fn get_job(&self, name: &str) -> Result<Option<Job>> {
        Ok(self.job(name))
    }

    async fn create_job_with_xml(&self, xml: &str, name: &str) -> Result<()> {
        self.created_xml
            .borrow_mut()
            .push((name.to_string(), xml.to_string()));
        self.insert(name, crate::jenkins::FOLDER_CLASS);
        Ok(())
    }

    async fn get_job_by_path(&self, folder: &str, job: &str) -> Result<Option<Job>> {
        Ok(self.job(&format!("{}/{}", folder, job)))
    }

    async fn create_folder_job_with_xml(&self, xml: &str, folder: &str, job: &str) -> Result<()> {
        let path = format!("{}/{}", folder, job);
        if self.has_job(&path) {
            bail!("A job already exists with the name {}", path);
        }
        self.created_xml
            .borrow_mut()
            .push((path.clone(), xml.to_string()));
        if !self.lose_created_jobs {
            self.insert(
                &path,
                "org.jenkinsci.plugins.workflow.multibranch.WorkflowMultiBranchProject",
            );
        }
        Ok(())
    }

    async fn build(&self, job: &Job, _params: &[(String, String)]) -> Result<()> {
        if self.fail_builds {
            bail!("HTTP status server error (500 Internal Server Error) for url ({}build)", job.url);
        }
        self.builds.borrow_mut().push(job.url.clone());
        Ok(())
    }

    fn base_url(&self) -> &str {
        JENKINS_URL
    }
}

/// Owns one of each fake so an [`Importer`] can borrow them.
pub(crate) struct Harness {
    pub(crate) vcs: RecordingVcs,
    pub(crate) scaffolder: FakeScaffolder,
    pub(crate) prompter: ScriptedPrompter,
    pub(crate) providers: FakeProviderFactory,
    pub(crate) auth: AuthService,
    pub(crate) jenkins: FakeBuildServer,
}

impl Harness {
    /// A single git server with a valid user `alice`.
    pub(crate) fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        let server = GitServer {
            name: "Example".into(),
            kind: ProviderKind::Github,
            url: "https://git.example.com".into(),
            current_user: Some("alice".into()),
            users: vec![UserAuth {
                username: "alice".into(),
                api_token: "t0ken".into(),
            }],
        };
        Self::with_servers(answers, vec![server])
    }

    pub(crate) fn with_servers(
        answers: impl IntoIterator<Item = Answer>,
        servers: Vec<GitServer>,
    ) -> Self {
        Self {
            vcs: RecordingVcs::default(),
            scaffolder: FakeScaffolder::default(),
            prompter: ScriptedPrompter::new(answers),
            providers: FakeProviderFactory::default(),
            auth: AuthService::new(
                Config {
                    jenkins: None,
                    servers,
                },
                None,
            ),
            jenkins: FakeBuildServer::default(),
        }
    }

    pub(crate) fn importer(&mut self) -> Importer<'_> {
        Importer {
            vcs: &self.vcs,
            scaffolder: &self.scaffolder,
            prompter: &self.prompter,
            providers: &self.providers,
            auth: &mut self.auth,
            build_server: &self.jenkins,
        }
    }
}
