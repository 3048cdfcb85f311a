use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    Skipped,
}

impl FetchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Skipped => "skipped",
        }
    }
}

/// Something that can materialize the source content tree at a local path.
pub trait ContentSource {
    fn fetch(&self, destination: &Path) -> Result<FetchOutcome, FetchError>;
}

/// Shallow, sparse checkout of selected subdirectories of a git repository.
#[derive(Debug, Clone)]
pub struct GitSparseCheckout {
    pub git_binary: PathBuf,
    pub repo_url: String,
    pub subpaths: Vec<String>,
}

impl ContentSource for GitSparseCheckout {
    fn fetch(&self, destination: &Path) -> Result<FetchOutcome, FetchError> {
        if let Some(first) = self.subpaths.first()
            && destination.join(first).exists()
        {
            info!(
                destination = %destination.display(),
                "source checkout already present, skipping clone"
            );
            return Ok(FetchOutcome::Skipped);
        }

        info!(repo = %self.repo_url, destination = %destination.display(), "cloning source repository");
        let destination_arg = destination.to_string_lossy().to_string();
        run_git(
            &self.git_binary,
            &[
                "clone",
                "--depth=1",
                "--filter=blob:none",
                "--sparse",
                &self.repo_url,
                &destination_arg,
            ],
        )?;

        let mut sparse_args = vec![
            "-C".to_string(),
            destination_arg,
            "sparse-checkout".to_string(),
            "set".to_string(),
        ];
        sparse_args.extend(self.subpaths.iter().cloned());
        let sparse_args: Vec<&str> = sparse_args.iter().map(String::as_str).collect();
        run_git(&self.git_binary, &sparse_args)?;

        info!(subpaths = ?self.subpaths, "sparse checkout complete");
        Ok(FetchOutcome::Fetched)
    }
}

/// A content tree that is already on disk.
#[derive(Debug, Clone, Default)]
pub struct LocalTree;

impl ContentSource for LocalTree {
    fn fetch(&self, destination: &Path) -> Result<FetchOutcome, FetchError> {
        if destination.is_dir() {
            Ok(FetchOutcome::Skipped)
        } else {
            Err(FetchError::MissingTree {
                path: destination.to_path_buf(),
            })
        }
    }
}

/// Delete a checkout created by [`GitSparseCheckout`]. Returns `false` when
/// there was nothing to remove.
pub fn remove_checkout(destination: &Path) -> Result<bool, FetchError> {
    if !destination.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(destination).map_err(|source| FetchError::Cleanup {
        path: destination.to_path_buf(),
        source,
    })?;
    info!(destination = %destination.display(), "removed source checkout");
    Ok(true)
}

fn run_git(binary: &Path, args: &[&str]) -> Result<(), FetchError> {
    let command = format!("{} {}", binary.display(), args.join(" "));
    let output = Command::new(binary)
        .args(args)
        .output()
        .map_err(|source| FetchError::Spawn {
            command: command.clone(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }
    Err(FetchError::CommandFailed {
        command,
        code: output.status.code().unwrap_or(1),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
