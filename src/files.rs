use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::fs as async_fs;

pub const DEFAULT_GITIGNORE: &str = include_str!("../templates/gitignore");
pub const DEFAULT_JENKINSFILE: &str = include_str!("../templates/Jenkinsfile");

pub const GITIGNORE: &str = ".gitignore";
pub const JENKINSFILE: &str = "Jenkinsfile";

/// Write `content` to `path` unless something already lives there.
///
/// Returns true when the file was written.
pub async fn write_if_absent(path: &Path, content: &str) -> Result<bool> {
    if async_fs::try_exists(path)
        .await
        .with_context(|| format!("failed to check {}", path.display()))?
    {
        tracing::debug!(path = %path.display(), "files: keeping existing file");
        return Ok(false);
    }
    async_fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Create a fresh directory under `base` named `name`, `name2`, `name3`...
/// giving up after `max_attempts` candidates.
pub fn create_unique_directory(base: &Path, name: &str, max_attempts: usize) -> Result<PathBuf> {
    if name.is_empty() {
        bail!("cannot create a directory with an empty name in {}", base.display());
    }
    std::fs::create_dir_all(base)
        .with_context(|| format!("failed to create {}", base.display()))?;
    for attempt in 1..=max_attempts {
        let candidate = if attempt == 1 {
            base.join(name)
        } else {
            base.join(format!("{}{}", name, attempt))
        };
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to create {}", candidate.display()));
            }
        }
    }
    bail!(
        "Could not create a unique directory in {} starting with {} after {} attempts",
        base.display(),
        name,
        max_attempts
    )
}
