use std::path::Path;

use anyhow::{Context, Result};

use super::Importer;
use crate::files::{self, DEFAULT_JENKINSFILE, JENKINSFILE};
use crate::scaffold::ScaffoldProfile;

impl Importer<'_> {
    /// Generate build files and make sure a pipeline definition is committed.
    pub async fn provision(&self, dir: &Path) -> Result<()> {
        self.scaffold(dir).await?;
        self.default_pipeline(dir).await
    }

    async fn scaffold(&self, dir: &Path) -> Result<()> {
        let profile = ScaffoldProfile::detect(dir);
        tracing::debug!(dir = %dir.display(), ?profile, "provision: scaffolding");
        self.scaffolder
            .generate(dir, profile)
            .await
            .with_context(|| format!("failed to run draft create in {}", dir.display()))?;

        self.vcs.add(dir, "*").await?;
        if self.vcs.commit_if_changed(dir, "Draft create").await? {
            tracing::info!(dir = %dir.display(), "provision: committed generated files");
        }
        Ok(())
    }

    async fn default_pipeline(&self, dir: &Path) -> Result<()> {
        let path = dir.join(JENKINSFILE);
        if !files::write_if_absent(&path, DEFAULT_JENKINSFILE).await? {
            tracing::debug!(path = %path.display(), "provision: keeping existing pipeline");
            return Ok(());
        }
        self.vcs.add(dir, JENKINSFILE).await?;
        self.vcs
            .commit_if_changed(dir, "Added default Jenkinsfile pipeline")
            .await?;
        Ok(())
    }
}
