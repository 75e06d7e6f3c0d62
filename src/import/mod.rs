//! The import workflow.
//!
//! Phases run strictly in order and never roll back: whatever an earlier
//! phase created stays in place when a later one fails, and every creation
//! step first checks whether its target already exists so the import can
//! simply be run again.

mod discover;
mod provision;
mod register;
mod remote;

#[cfg(test)]
mod testing;

use anyhow::{Result, anyhow};

use crate::auth::AuthService;
use crate::context::ImportContext;
use crate::git::Vcs;
use crate::jenkins::BuildServer;
use crate::prompt::Prompter;
use crate::provider::ProviderFactory;
use crate::scaffold::Scaffolder;

/// The collaborators an import talks to.
pub struct Importer<'a> {
    pub vcs: &'a dyn Vcs,
    pub scaffolder: &'a dyn Scaffolder,
    pub prompter: &'a dyn Prompter,
    pub providers: &'a dyn ProviderFactory,
    pub auth: &'a mut AuthService,
    pub build_server: &'a dyn BuildServer,
}

impl Importer<'_> {
    pub async fn run(&mut self, ctx: &mut ImportContext) -> Result<()> {
        tracing::debug!(dir = %ctx.dir.display(), url = ?ctx.remote_url, "import: start");

        if ctx.has_remote_url() {
            self.clone_repository(ctx).await?;
        } else {
            let found = self.discover_git(&ctx.dir).await?;
            ctx.dir = found.root;
            ctx.git_config = Some(found.config);

            if !ctx.has_remote_url()
                && let Some((name, url)) = self.discover_remote_url(ctx.git_config.as_deref()).await?
            {
                ctx.remote_name = name;
                ctx.remote_url = Some(url);
            }
        }

        self.provision(&ctx.dir).await?;

        if ctx.has_remote_url() {
            self.vcs.push(&ctx.dir, &ctx.remote_name).await?;
        } else {
            self.create_remote_repository(ctx).await?;
        }

        let url = ctx
            .remote_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("No git repository URL found!"))?;
        self.register(url, &ctx.credentials_id).await?;
        tracing::debug!(dir = %ctx.dir.display(), "import: done");
        Ok(())
    }
}
