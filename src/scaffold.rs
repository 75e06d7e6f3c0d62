use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;

const JAVA_PACK: &str = "github.com/jenkins-x/draft-repo/packs/java";

/// Which generator pack a project gets, picked from its build files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaffoldProfile {
    Default,
    Java,
}

impl ScaffoldProfile {
    pub fn detect(dir: &Path) -> Self {
        let java = ["pom.xml", "build.gradle", "build.gradle.kts"]
            .iter()
            .any(|f| dir.join(f).is_file());
        if java {
            ScaffoldProfile::Java
        } else {
            ScaffoldProfile::Default
        }
    }

    pub fn pack(&self) -> Option<&'static str> {
        match self {
            ScaffoldProfile::Default => None,
            ScaffoldProfile::Java => Some(JAVA_PACK),
        }
    }
}

#[async_trait(?Send)]
pub trait Scaffolder {
    async fn generate(&self, dir: &Path, profile: ScaffoldProfile) -> Result<()>;
}

/// Runs `draft create` in the project directory.
#[derive(Debug, Clone)]
pub struct DraftScaffolder {
    program: PathBuf,
}

impl DraftScaffolder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DraftScaffolder {
    fn default() -> Self {
        Self::new("draft")
    }
}

#[async_trait(?Send)]
impl Scaffolder for DraftScaffolder {
    async fn generate(&self, dir: &Path, profile: ScaffoldProfile) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir).arg("create");
        if let Some(pack) = profile.pack() {
            cmd.arg(format!("--pack={}", pack));
        }
        tracing::debug!(?profile, dir = %dir.display(), "scaffold: running {}", self.program.display());
        let status = cmd
            .status()
            .await
            .with_context(|| format!("failed to run {}", self.program.display()))?;
        if !status.success() {
            bail!("{} exited with status: {}", self.program.display(), status);
        }
        Ok(())
    }
}
