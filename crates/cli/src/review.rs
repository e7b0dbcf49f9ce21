//! Console review session.
//!
//! Presents each review unit with a unified-diff preview of the upstream and
//! local changes, then asks the operator how to resolve it. The editable
//! pane is the raw template source; the upstream/base/local panes are
//! context only.

use dialoguer::{Editor, Select};

use dotmerge_core::errors::WorkflowError;
use dotmerge_core::models::RunStats;
use dotmerge_core::review::{ReviewDecision, ReviewSession, ReviewUnit};

use crate::style;

/// Interactive terminal implementation of the review protocol.
#[derive(Default)]
pub struct ConsoleReviewSession;

impl ConsoleReviewSession {
    pub fn new() -> Self {
        Self
    }
}

impl ReviewSession for ConsoleReviewSession {
    fn begin(&mut self, stats: &RunStats) {
        println!();
        println!("{}", style::header("Reconciliation summary"));
        println!("  already in sync:  {}", stats.already_synced);
        println!("  auto-updated:     {}", stats.auto_updated);
        println!("  auto-merged:      {}", stats.auto_merged);
        println!("  kept local:       {}", stats.auto_kept);
        println!("  needs review:     {}", stats.pending_review());

        if !stats.skipped.is_empty() {
            println!(
                "  {}",
                style::dim(&format!("skipped (no local source): {}", stats.skipped.len()))
            );
            for path in &stats.skipped {
                println!("    {}", style::dim(path));
            }
        }
        println!();
    }

    fn review(&mut self, unit: &ReviewUnit<'_>) -> Result<ReviewDecision, WorkflowError> {
        let item = unit.item;

        println!(
            "{} {}",
            style::header(&format!("[{}/{}] {}", unit.position, unit.total, item.path)),
            style::scenario(&item.scenario)
        );

        print_patch("upstream change", &item.base.content, &item.theirs.content);
        print_patch("local change", &item.base.content, &item.ours.content);

        loop {
            let choice = Select::new()
                .with_prompt("Resolve")
                .items(&[
                    "Keep local source",
                    "Take upstream version",
                    "Edit inline",
                    "Open in external editor",
                    "Quit (abort remaining)",
                ])
                .default(0)
                .interact()
                .map_err(|e| WorkflowError::ReviewFailed(e.to_string()))?;

            return Ok(match choice {
                0 => ReviewDecision::Submit(item.template.content.clone()),
                1 => ReviewDecision::Submit(item.theirs.content.clone()),
                2 => {
                    match Editor::new()
                        .edit(&item.template.content)
                        .map_err(|e| WorkflowError::ReviewFailed(e.to_string()))?
                    {
                        Some(edited) => ReviewDecision::Submit(edited),
                        // Editor closed without saving: ask again.
                        None => continue,
                    }
                }
                3 => ReviewDecision::ExternalEditor,
                _ => ReviewDecision::Abort,
            });
        }
    }
}

/// Print a colorized unified diff between two texts.
fn print_patch(label: &str, original: &str, modified: &str) {
    if original == modified {
        println!("  {}", style::dim(&format!("{}: none", label)));
        return;
    }

    println!("  {}", style::dim(label));
    let patch = diffy::create_patch(original, modified);
    for line in patch.to_string().lines() {
        let styled = if line.starts_with("+++") || line.starts_with("---") {
            style::dim(line)
        } else if line.starts_with('+') {
            console::Style::new().green().apply_to(line).to_string()
        } else if line.starts_with('-') {
            console::Style::new().red().apply_to(line).to_string()
        } else if line.starts_with("@@") {
            console::Style::new().cyan().apply_to(line).to_string()
        } else {
            line.to_string()
        };
        println!("  {}", styled);
    }
    println!();
}
