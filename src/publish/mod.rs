pub mod feed;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use crate::config::PublishSettings;

/// Pushes a freshly written feed file somewhere public.
#[async_trait::async_trait]
pub trait FeedPublisher: Send + Sync {
    async fn publish(&self, file: &Path) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// `git add` + `git commit` + `git push` inside the repository holding the feed.
pub struct GitPublisher {
    repo_dir: Option<PathBuf>,
    commit_message: String,
}

impl GitPublisher {
    pub fn from_settings(settings: &PublishSettings) -> Self {
        Self {
            repo_dir: settings.repo_dir.clone(),
            commit_message: settings.commit_message.clone(),
        }
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<()> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .with_context(|| format!("spawning git {}", args.join(" ")))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        bail!("git {} failed ({}): {}", args.join(" "), out.status, stderr.trim());
    }
    Ok(())
}

#[async_trait::async_trait]
impl FeedPublisher for GitPublisher {
    async fn publish(&self, file: &Path) -> Result<()> {
        let file = std::fs::canonicalize(file)
            .with_context(|| format!("resolving {}", file.display()))?;
        let dir = match &self.repo_dir {
            Some(d) => d.clone(),
            None => file
                .parent()
                .map(Path::to_path_buf)
                .context("feed file has no parent directory")?,
        };
        let file_arg = file.to_string_lossy();

        run_git(&dir, &["add", &*file_arg]).await?;
        run_git(&dir, &["commit", "-m", self.commit_message.as_str()]).await?;
        run_git(&dir, &["push"]).await?;
        tracing::info!(repo = %dir.display(), "feed pushed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "git"
    }
}

/// Used when publishing is switched off; the local file is the end product.
pub struct LocalOnly;

#[async_trait::async_trait]
impl FeedPublisher for LocalOnly {
    async fn publish(&self, file: &Path) -> Result<()> {
        tracing::debug!(path = %file.display(), "git publishing disabled");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

pub fn publisher_from_settings(settings: &PublishSettings) -> Box<dyn FeedPublisher> {
    if settings.git_push {
        Box::new(GitPublisher::from_settings(settings))
    } else {
        Box::new(LocalOnly)
    }
}
