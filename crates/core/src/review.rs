//! Interactive review protocol.
//!
//! The workflow presents review units one at a time and blocks on a
//! decision; it never depends on how a session renders them. A session
//! receives the four file states — base, theirs and ours read-only, plus the
//! editable template source — and answers with a [`ReviewDecision`].
//!
//! The external-editor escape hatch is owned by the workflow: the four texts
//! are written out as four files plus one result file, and a clean editor
//! exit is treated as an implicit save-and-continue.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::WorkflowError;
use crate::models::{MergeItem, RunStats};

/// One unit of manual-review work, presented in queue order.
#[derive(Debug)]
pub struct ReviewUnit<'a> {
    /// 1-based position within the queue.
    pub position: usize,
    /// Queue length.
    pub total: usize,
    /// The item under review; `item.template.content` seeds the editable
    /// pane.
    pub item: &'a MergeItem,
}

/// The operator's decision for one review unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Commit this unit's edited text and advance.
    Submit(String),
    /// Hand the four texts to the external editor.
    ExternalEditor,
    /// Abort the remaining run; only units confirmed so far persist.
    Abort,
}

/// A presentation layer for the review queue.
pub trait ReviewSession {
    /// Called once with the pre-review summary, before the first unit.
    fn begin(&mut self, _stats: &RunStats) {}

    /// Present one unit and block until the operator decides.
    fn review(&mut self, unit: &ReviewUnit<'_>) -> Result<ReviewDecision, WorkflowError>;
}

// ---------------------------------------------------------------------------
// External editor hand-off
// ---------------------------------------------------------------------------

/// Hand the four texts of `item` to an external editor process.
///
/// Writes `base`, `theirs` and `ours` as context files plus a result file
/// (named after the target file, seeded with the template source), then
/// spawns `editor` with all four paths as trailing arguments. On clean exit
/// the result file is read back and returned; a non-zero exit returns
/// `None` so the caller can re-present the unit.
pub fn run_external_editor(
    editor: &str,
    item: &MergeItem,
) -> Result<Option<String>, WorkflowError> {
    let mut words = editor.split_whitespace();
    let program = words.next().ok_or_else(|| WorkflowError::EditorFailed {
        editor: editor.to_string(),
        detail: "empty editor command".into(),
    })?;
    let base_args: Vec<&str> = words.collect();

    let scratch = tempfile::tempdir()?;
    let base_file = scratch.path().join("base");
    let theirs_file = scratch.path().join("theirs");
    let ours_file = scratch.path().join("ours");
    let result_file = scratch.path().join(result_file_name(&item.path));

    std::fs::write(&base_file, &item.base.content)?;
    std::fs::write(&theirs_file, &item.theirs.content)?;
    std::fs::write(&ours_file, &item.ours.content)?;
    std::fs::write(&result_file, &item.template.content)?;

    info!(path = %item.path, editor = program, "handing off to external editor");
    let status = std::process::Command::new(program)
        .args(&base_args)
        .arg(&base_file)
        .arg(&theirs_file)
        .arg(&ours_file)
        .arg(&result_file)
        .status()
        .map_err(|e| WorkflowError::EditorFailed {
            editor: editor.to_string(),
            detail: e.to_string(),
        })?;

    if !status.success() {
        warn!(path = %item.path, code = ?status.code(), "editor exited uncleanly");
        return Ok(None);
    }

    let edited = std::fs::read_to_string(&result_file)?;
    debug!(path = %item.path, "read back edited result");
    Ok(Some(edited))
}

/// Name the result file after the target file so the editor picks up
/// sensible syntax highlighting.
fn result_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string())
}
