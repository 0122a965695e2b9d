//! Git context via the git CLI

use std::path::Path;

use async_trait::async_trait;
use eyre::{Result, eyre};
use tracing::debug;

use super::traits::GitService;

/// Git service shelling out to the `git` binary
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GitService for GitCli {
    async fn current_branch(&self, root: &Path) -> Result<String> {
        let output = tokio::process::Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(root)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!("git rev-parse failed: {}", stderr.trim()));
        }

        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(root = %root.display(), %branch, "Resolved git branch");
        Ok(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_current_branch_outside_repo_errors() {
        let temp = tempdir().unwrap();
        let git = GitCli::new();
        assert!(git.current_branch(temp.path()).await.is_err());
    }
}
