use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Shared file store the agent reads materialized attachments from.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Write `content` under `path`, relative to the workspace root.
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()>;
}

/// Workspace backed by a local directory.
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    /// Use `root` as the workspace, creating it if it does not exist.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create workspace directory: {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path inside the workspace, rejecting anything that
    /// could land outside of it.
    fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let relative = Path::new(requested);
        if requested.is_empty() || relative.is_absolute() {
            anyhow::bail!("Invalid workspace path: '{}'", requested);
        }
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            anyhow::bail!(
                "Access denied: path '{}' is outside the workspace '{}'",
                requested,
                self.root.display()
            );
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.resolve(path)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directories: {}", parent.display()))?;
        }

        info!("Writing workspace file: {}", full_path.display());
        tokio::fs::write(&full_path, content)
            .await
            .with_context(|| format!("Failed to write file: {}", full_path.display()))
    }
}
