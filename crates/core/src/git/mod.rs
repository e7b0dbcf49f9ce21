//! Version-control backend: the capability set the workflow consumes.

pub mod backend;

pub use backend::GitBackend;

use crate::errors::GitError;

/// The two tracked upstream revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Revision {
    /// The last upstream revision fully reconciled into the local tree.
    Base,
    /// The newly fetched upstream head.
    Latest,
}

impl Revision {
    /// Directory name of the corresponding workspace clone.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Latest => "latest",
        }
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Result of a three-way merge attempt.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Whether the merge completed without conflicts.
    pub clean: bool,
    /// Merged text; contains conflict markers when `clean` is false.
    pub content: String,
}

/// The version-control capability set consumed by the reconciliation
/// workflow.
///
/// [`GitBackend`] is the production implementation; tests substitute an
/// in-memory one.
pub trait VcsBackend {
    /// Update the view of upstream to its newest head.
    fn fetch_latest(&self) -> impl std::future::Future<Output = Result<(), GitError>> + Send;

    /// Resolve the commit id of a tracked revision.
    fn head_revision(
        &self,
        rev: Revision,
    ) -> impl std::future::Future<Output = Result<String, GitError>> + Send;

    /// File content at a tracked revision, or `None` when absent there.
    fn content_at(
        &self,
        rev: Revision,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, GitError>> + Send;

    /// Ordered list of paths changed between base and latest, optionally
    /// restricted to a path prefix.
    fn changed_paths(
        &self,
        path_filter: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<String>, GitError>> + Send;

    /// Attempt a line-based three-way merge of the given texts.
    fn three_way_merge(
        &self,
        base: &str,
        ours: &str,
        theirs: &str,
    ) -> impl std::future::Future<Output = Result<MergeOutcome, GitError>> + Send;

    /// Stage one path in the local tree.
    fn stage(&self, path: &str) -> impl std::future::Future<Output = Result<(), GitError>> + Send;

    /// Create one commit covering everything staged.
    fn commit(
        &self,
        message: &str,
    ) -> impl std::future::Future<Output = Result<(), GitError>> + Send;

    /// Advance the tracked base revision to the current latest head.
    fn advance_base(&self) -> impl std::future::Future<Output = Result<(), GitError>> + Send;
}
