//! Initial bulk import of the upstream tree.
//!
//! Runs once, right after the merge workspace is set up: every file in the
//! `latest` clone is copied into the local tree under its annotated name
//! (leading dots become the hidden-file marker), staged, and committed as a
//! single import commit. The run terminates here — there is nothing to
//! classify on a first run.

use std::path::Path;

use tracing::{debug, info};

use crate::config::ReconcileConfig;
use crate::errors::WorkflowError;
use crate::git::{GitBackend, Revision, VcsBackend};
use crate::paths::{denormalize, list_files};

/// Handles the one-time import of the upstream tree into the local tree.
pub struct InitialImport<'a> {
    pub backend: &'a GitBackend,
    pub config: &'a ReconcileConfig,
}

impl InitialImport<'_> {
    /// Copy every upstream file into the local tree, stage and commit.
    ///
    /// Returns the number of files imported.
    pub async fn run(&self) -> Result<usize, WorkflowError> {
        let latest_dir = self.backend.latest_dir();
        let source_root = match self.config.upstream.subdir.as_deref() {
            Some(subdir) if !subdir.is_empty() => latest_dir.join(subdir),
            _ => latest_dir,
        };

        if !source_root.exists() {
            return Err(WorkflowError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("upstream path {} does not exist", source_root.display()),
            )));
        }

        info!(source = %source_root.display(), "importing upstream tree");

        let imported = copy_annotated(
            &source_root,
            self.backend.repo_root(),
            &self.config.options.ignore_patterns,
        )?;

        for dest_rel in &imported {
            self.backend.stage(dest_rel).await?;
        }

        if !imported.is_empty() {
            let latest = self.backend.head_revision(Revision::Latest).await?;
            let message = format!(
                "Import upstream snapshot {}",
                &latest[..8.min(latest.len())]
            );
            self.backend.commit(&message).await?;
        }

        info!(count = imported.len(), "initial import completed");
        Ok(imported.len())
    }
}

/// Copy every file under `source_root` into `repo_root` under its annotated
/// name. Returns the annotated destination paths in traversal order.
fn copy_annotated(
    source_root: &Path,
    repo_root: &Path,
    ignore_patterns: &[String],
) -> Result<Vec<String>, WorkflowError> {
    let mut imported = Vec::new();

    for rel in list_files(source_root, &[".git"], ignore_patterns) {
        let dest_rel = denormalize(&rel);
        let dest = repo_root.join(&dest_rel);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source_root.join(&rel), &dest)?;

        debug!(source = %rel, dest = %dest_rel, "imported");
        imported.push(dest_rel);
    }

    Ok(imported)
}
