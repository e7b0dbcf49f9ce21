//! Scenario classification for a four-way file state.
//!
//! Given the `base`, `theirs`, `ours` and `template` states of one file, the
//! engine decides whether the file can be resolved automatically or needs
//! manual review. Classification is a pure function of the contents: no I/O,
//! no side effects. The effectful merge attempt lives in the workflow, which
//! is the only place a `Conflict` can be upgraded to `AutoMergeable`.

use tracing::trace;

use crate::models::{FileState, MergeScenario};

/// Stateless four-way classifier.
pub struct DecisionEngine;

impl DecisionEngine {
    /// Classify one file's four-way state into a [`MergeScenario`].
    ///
    /// Priority order:
    ///
    /// 1. Template sources are never auto-resolved: unless the effective
    ///    content already equals upstream, they go to review as
    ///    `TemplateDivergence`, even when a textual merge would succeed.
    /// 2. Raw files follow the three-way ladder: equal to upstream →
    ///    `AlreadySynced`; only upstream moved → `AutoUpdate`; only local
    ///    moved → `AutoKeep`; both moved → `Conflict`.
    ///
    /// Empty content is a valid value meaning "absent at this provenance";
    /// absence compares like any other content.
    pub fn classify(
        base: &FileState,
        theirs: &FileState,
        ours: &FileState,
        template: &FileState,
    ) -> MergeScenario {
        let scenario = if template.is_template {
            if ours.content == theirs.content {
                MergeScenario::AlreadySynced
            } else {
                MergeScenario::TemplateDivergence
            }
        } else if ours.content == theirs.content {
            MergeScenario::AlreadySynced
        } else if ours.content == base.content && theirs.content != base.content {
            MergeScenario::AutoUpdate
        } else if ours.content != base.content && theirs.content == base.content {
            MergeScenario::AutoKeep
        } else {
            MergeScenario::Conflict
        };

        trace!(path = %template.path, %scenario, "classified");
        scenario
    }
}
