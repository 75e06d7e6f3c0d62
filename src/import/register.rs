use anyhow::{Context, Result, anyhow, bail};

use super::Importer;
use crate::git::{parse_url, strip_credentials};
use crate::jenkins::{BuildJobDescriptor, FOLDER_CLASS, Job, render_folder_xml, url_join};

impl Importer<'_> {
    /// Create the multi-branch job for `url` inside its organisation folder
    /// and trigger its first build.
    pub async fn register(&self, url: &str, credentials_id: &str) -> Result<Job> {
        let url = strip_credentials(url);
        let info = parse_url(&url).with_context(|| format!("Failed to parse git URL {}", url))?;
        let folder = info.organisation.as_str();
        let job_name = info.name.as_str();
        tracing::debug!(repo = %info.full_name(), "register: start");

        self.ensure_folder(folder).await?;

        if let Some(existing) = self.build_server.get_job_by_path(folder, job_name).await? {
            bail!("Job already exists in Jenkins at {}", existing.url);
        }

        let descriptor = BuildJobDescriptor::multibranch(&info, credentials_id)?;
        self.build_server
            .create_folder_job_with_xml(&descriptor.xml, &descriptor.folder, &descriptor.job_name)
            .await
            .with_context(|| {
                format!(
                    "Failed to create MultiBranchProject job {} in folder {}",
                    job_name, folder
                )
            })?;

        let job = self
            .build_server
            .get_job_by_path(folder, job_name)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "Failed to find the MultiBranchProject job {} in folder {}",
                    job_name,
                    folder
                )
            })?;
        println!("Created Project: {}", job.url);

        self.build_server
            .build(&job, &[])
            .await
            .with_context(|| format!("Failed to trigger job {}", job.url))?;
        Ok(job)
    }

    async fn ensure_folder(&self, folder: &str) -> Result<()> {
        match self.build_server.get_job(folder).await? {
            Some(job) if job.class != FOLDER_CLASS => {
                tracing::warn!(
                    "Job {} is of type {}, expected {}",
                    folder,
                    job.class,
                    FOLDER_CLASS
                );
            }
            Some(_) => {}
            None => {
                let folder_url = url_join(
                    self.build_server.base_url(),
                    &self.build_server.job_url_path(folder),
                );
                let xml = render_folder_xml(&folder_url, folder)?;
                self.build_server
                    .create_job_with_xml(&xml, folder)
                    .await
                    .with_context(|| format!("Failed to create the {} folder in jenkins", folder))?;
                tracing::info!(folder, "register: created folder");
            }
        }
        Ok(())
    }
}
