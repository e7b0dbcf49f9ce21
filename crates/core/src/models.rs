//! Shared data model for the reconciliation pipeline.
//!
//! A [`MergeItem`] captures the complete four-way state of one file for one
//! run: the common ancestor (`base`), the new upstream version (`theirs`),
//! the locally effective content (`ours`) and the raw, editable local source
//! (`template`). Items live only for the duration of a run; only their
//! resolution is persisted, as a file write plus a git commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// File state
// ---------------------------------------------------------------------------

/// A snapshot of one file's text at one provenance point.
///
/// Empty `content` means the file is absent at that provenance. Two
/// `FileState`s with equal content are interchangeable; there is no identity
/// beyond the fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    /// File text; empty means "absent at this provenance".
    pub content: String,
    /// Provenance-relative path.
    pub path: String,
    /// Whether this file is a template source.
    pub is_template: bool,
}

impl FileState {
    /// Create a plain (non-template) file state.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            path: path.into(),
            is_template: false,
        }
    }

    /// Create a template file state.
    pub fn template(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            path: path.into(),
            is_template: true,
        }
    }

    /// Create an "absent" state for the given provenance path.
    pub fn absent(path: impl Into<String>) -> Self {
        Self::new(path, "")
    }

    /// `true` when the file does not exist at this provenance.
    pub fn is_absent(&self) -> bool {
        self.content.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Merge scenario
// ---------------------------------------------------------------------------

/// Classification of one file's four-way state.
///
/// Exactly one tag per [`MergeItem`] at any time. The only permitted
/// transition is the upgrade `Conflict` → `AutoMergeable`, applied by the
/// workflow after a successful three-way merge attempt; a scenario is never
/// downgraded within a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeScenario {
    /// Local effective content already equals upstream.
    AlreadySynced,
    /// Only upstream changed; take theirs.
    AutoUpdate,
    /// Only local changed; nothing to do against upstream.
    AutoKeep,
    /// Both sides diverged from base.
    Conflict,
    /// A conflict that a clean three-way merge resolved.
    AutoMergeable,
    /// Template source diverged; always reviewed by hand.
    TemplateDivergence,
}

impl MergeScenario {
    /// `true` for scenarios that end up in the manual review queue.
    pub fn needs_review(&self) -> bool {
        matches!(self, Self::Conflict | Self::TemplateDivergence)
    }
}

impl std::fmt::Display for MergeScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadySynced => write!(f, "already_synced"),
            Self::AutoUpdate => write!(f, "auto_update"),
            Self::AutoKeep => write!(f, "auto_keep"),
            Self::Conflict => write!(f, "conflict"),
            Self::AutoMergeable => write!(f, "auto_mergeable"),
            Self::TemplateDivergence => write!(f, "template_divergence"),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge item
// ---------------------------------------------------------------------------

/// The complete merge state for a single local file across one run.
///
/// `path` is the local, annotated path and always equals `template.path`;
/// `base.path` and `theirs.path` are upstream-relative and may differ
/// textually after translation.
#[derive(Debug, Clone)]
pub struct MergeItem {
    /// Local annotated path, relative to the repository root.
    pub path: String,
    /// Common ancestor content (last synced upstream revision).
    pub base: FileState,
    /// Upstream content at the new revision.
    pub theirs: FileState,
    /// Locally effective content (rendered for templates, else raw).
    pub ours: FileState,
    /// Raw, editable local source; resolution target.
    pub template: FileState,
    /// Current classification.
    pub scenario: MergeScenario,
}

impl MergeItem {
    /// Build an item from its four states; `path` is taken from the
    /// template state.
    pub fn new(
        base: FileState,
        theirs: FileState,
        ours: FileState,
        template: FileState,
        scenario: MergeScenario,
    ) -> Self {
        Self {
            path: template.path.clone(),
            base,
            theirs,
            ours,
            template,
            scenario,
        }
    }
}

// ---------------------------------------------------------------------------
// Run statistics
// ---------------------------------------------------------------------------

/// Statistics from a single reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Upstream paths reported as changed.
    pub changed: usize,
    /// Items dropped because local and upstream already agree.
    pub already_synced: usize,
    /// Items where only upstream changed, applied automatically.
    pub auto_updated: usize,
    /// Conflicts resolved by a clean three-way merge.
    pub auto_merged: usize,
    /// Items where only local changed; left untouched.
    pub auto_kept: usize,
    /// Unresolved conflicts routed to review.
    pub conflicts: usize,
    /// Template divergences routed to review.
    pub template_divergence: usize,
    /// Items confirmed through the interactive review.
    pub reviewed: usize,
    /// Changed upstream paths with no local counterpart.
    pub skipped: Vec<String>,
    /// Whether the operator ended the run before the queue was drained.
    pub aborted: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunStats {
    /// Number of items awaiting manual review.
    pub fn pending_review(&self) -> usize {
        self.conflicts + self.template_divergence
    }

    /// Number of items resolved without human involvement.
    pub fn auto_resolved(&self) -> usize {
        self.auto_updated + self.auto_merged
    }
}

// ---------------------------------------------------------------------------
// Run record
// ---------------------------------------------------------------------------

/// Persisted record of the last completed run, stored as JSON alongside the
/// merge workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Upstream revision the local tree was reconciled from.
    pub base_revision: String,
    /// Upstream revision the local tree is reconciled to.
    pub latest_revision: String,
    /// Number of files written during the run.
    pub files_reconciled: usize,
    /// Whether the run drained its full review queue.
    pub completed: bool,
    pub finished_at: DateTime<Utc>,
}
