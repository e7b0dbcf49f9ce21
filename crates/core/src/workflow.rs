//! Reconciliation workflow state machine.
//!
//! Drives one run end-to-end:
//!
//! 1. Fetch the new upstream head and list changed paths.
//! 2. Translate each changed path to its local source and classify the
//!    four-way state.
//! 3. Apply automatic resolutions; attempt a three-way merge on conflicts.
//! 4. Hand the remaining items, one at a time, to the review session.
//! 5. Write and stage every saved resolution, advance the base pointer and
//!    create one commit.
//!
//! The run state is an explicit value threaded through the pipeline so retry
//! logic and tests can assert on it directly. A backend failure while
//! fetching or classifying aborts the run with nothing mutated; rerunning
//! repeats the same work from the same base revision.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::ReconcileConfig;
use crate::decision::DecisionEngine;
use crate::errors::WorkflowError;
use crate::git::{Revision, VcsBackend};
use crate::models::{FileState, MergeItem, MergeScenario, RunRecord, RunStats};
use crate::paths;
use crate::render::TemplateRender;
use crate::review::{run_external_editor, ReviewDecision, ReviewSession, ReviewUnit};

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// States of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Initializing,
    Fetching,
    Classifying,
    AutoResolving,
    /// Reviewing queue item `i` (0-based).
    AwaitingReview(usize),
    Committing,
    Done,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Fetching => write!(f, "fetching"),
            Self::Classifying => write!(f, "classifying"),
            Self::AutoResolving => write!(f, "auto_resolving"),
            Self::AwaitingReview(i) => write!(f, "awaiting_review({})", i),
            Self::Committing => write!(f, "committing"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// The reconciliation workflow for one local tree.
///
/// Single operator, single run at a time: the workflow is the sole writer of
/// the local tree and must not be invoked twice against the same tree
/// concurrently (documented precondition, not an enforced lock).
pub struct ReconcileWorkflow<B, T> {
    config: ReconcileConfig,
    backend: B,
    renderer: T,
    state: RunState,
}

impl<B: VcsBackend, T: TemplateRender> ReconcileWorkflow<B, T> {
    pub fn new(config: ReconcileConfig, backend: B, renderer: T) -> Self {
        Self {
            config,
            backend,
            renderer,
            state: RunState::Uninitialized,
        }
    }

    /// The current run state.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    fn set_state(&mut self, new_state: RunState) {
        info!(from = %self.state, to = %new_state, "state transition");
        self.state = new_state;
    }

    /// Execute one full reconciliation run.
    ///
    /// Returns run statistics on success (including a no-op run and an
    /// operator abort); backend failures during fetch or classification
    /// leave the tree untouched and move the state to `Failed`.
    pub async fn run<R: ReviewSession>(
        &mut self,
        session: &mut R,
    ) -> Result<RunStats, WorkflowError> {
        let mut stats = RunStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        match self.run_inner(session, &mut stats).await {
            Ok(()) => {
                stats.completed_at = Some(Utc::now());
                Ok(stats)
            }
            Err(e) => {
                self.set_state(RunState::Failed);
                Err(e)
            }
        }
    }

    async fn run_inner<R: ReviewSession>(
        &mut self,
        session: &mut R,
        stats: &mut RunStats,
    ) -> Result<(), WorkflowError> {
        // -------------------------------------------------------------------
        // Fetching
        // -------------------------------------------------------------------
        self.set_state(RunState::Fetching);
        self.backend.fetch_latest().await?;

        let base_rev = self.backend.head_revision(Revision::Base).await?;
        let latest_rev = self.backend.head_revision(Revision::Latest).await?;
        let prefix = self.config.subdir_prefix();

        let changed = self.backend.changed_paths(prefix.as_deref()).await?;
        stats.changed = changed.len();

        if changed.is_empty() {
            info!("upstream unchanged, nothing to reconcile");
            self.set_state(RunState::Done);
            return Ok(());
        }

        info!(
            count = changed.len(),
            from = short(&base_rev),
            to = short(&latest_rev),
            "upstream changes found"
        );

        // -------------------------------------------------------------------
        // Classifying
        // -------------------------------------------------------------------
        self.set_state(RunState::Classifying);
        let mut items = Vec::with_capacity(changed.len());

        for upstream_path in &changed {
            let target = match prefix.as_deref() {
                Some(p) => upstream_path.strip_prefix(p).unwrap_or(upstream_path),
                None => upstream_path.as_str(),
            };

            let local_rel = match paths::find_local_match(
                &self.config.repo.root,
                target,
                &self.config.repo.workspace_dir,
                &self.config.options.ignore_patterns,
            ) {
                Some(rel) => rel.to_string_lossy().into_owned(),
                None => {
                    warn!(path = %upstream_path, "no local source for upstream path, skipping");
                    stats.skipped.push(upstream_path.clone());
                    continue;
                }
            };

            let item = self.gather(upstream_path, &local_rel).await?;
            debug!(path = %item.path, scenario = %item.scenario, "classified");
            items.push(item);
        }

        // -------------------------------------------------------------------
        // AutoResolving
        // -------------------------------------------------------------------
        self.set_state(RunState::AutoResolving);
        let mut queue: Vec<MergeItem> = Vec::new();
        let mut staged = 0usize;

        for mut item in items {
            match item.scenario {
                MergeScenario::AlreadySynced => {
                    stats.already_synced += 1;
                }
                MergeScenario::AutoKeep => {
                    // Local-only change; nothing to do against upstream.
                    stats.auto_kept += 1;
                }
                MergeScenario::AutoUpdate => {
                    item.template.content = item.theirs.content.clone();
                    self.write_and_stage(&item).await?;
                    staged += 1;
                    stats.auto_updated += 1;
                }
                MergeScenario::AutoMergeable => {
                    self.write_and_stage(&item).await?;
                    staged += 1;
                    stats.auto_merged += 1;
                }
                MergeScenario::Conflict => {
                    if self.try_auto_merge(&mut item).await {
                        self.write_and_stage(&item).await?;
                        staged += 1;
                        stats.auto_merged += 1;
                    } else {
                        stats.conflicts += 1;
                        queue.push(item);
                    }
                }
                MergeScenario::TemplateDivergence => {
                    stats.template_divergence += 1;
                    queue.push(item);
                }
            }
        }

        info!(
            auto_resolved = stats.auto_resolved(),
            pending_review = queue.len(),
            skipped = stats.skipped.len(),
            "auto-resolution complete"
        );

        // -------------------------------------------------------------------
        // AwaitingReview
        // -------------------------------------------------------------------
        session.begin(stats);

        let editor = self.config.review.resolve_editor();
        let total = queue.len();
        let mut confirmed = 0usize;
        let mut aborted = false;

        while confirmed < total {
            self.set_state(RunState::AwaitingReview(confirmed));

            let decision = session.review(&ReviewUnit {
                position: confirmed + 1,
                total,
                item: &queue[confirmed],
            })?;

            match decision {
                ReviewDecision::Submit(text) => {
                    queue[confirmed].template.content = text;
                    stats.reviewed += 1;
                    confirmed += 1;
                }
                ReviewDecision::ExternalEditor => {
                    match run_external_editor(&editor, &queue[confirmed])? {
                        Some(text) => {
                            queue[confirmed].template.content = text;
                            stats.reviewed += 1;
                            confirmed += 1;
                        }
                        // Unclean editor exit: re-present the same unit.
                        None => continue,
                    }
                }
                ReviewDecision::Abort => {
                    info!(confirmed, total, "review aborted by operator");
                    aborted = true;
                    break;
                }
            }
        }
        stats.aborted = aborted;

        // -------------------------------------------------------------------
        // Committing
        // -------------------------------------------------------------------
        self.set_state(RunState::Committing);

        for item in &queue[..confirmed] {
            self.write_and_stage(item).await?;
            staged += 1;
        }

        // The base pointer only advances for a run that processed its full
        // queue; an aborted run keeps it so the next run reprocesses the
        // same change set.
        if !aborted {
            self.backend.advance_base().await?;
        }

        if staged > 0 {
            let message = self
                .config
                .options
                .format_commit_message(staged, &latest_rev);
            self.backend.commit(&message).await?;
        }

        self.write_run_record(&RunRecord {
            base_revision: base_rev,
            latest_revision: latest_rev,
            files_reconciled: staged,
            completed: !aborted,
            finished_at: Utc::now(),
        })?;

        self.set_state(RunState::Done);
        info!(
            written = staged,
            reviewed = stats.reviewed,
            aborted,
            "reconciliation run finished"
        );
        Ok(())
    }

    /// Gather the four file states for one matched path and classify them.
    async fn gather(
        &self,
        upstream_path: &str,
        local_rel: &str,
    ) -> Result<MergeItem, WorkflowError> {
        let base_content = self
            .backend
            .content_at(Revision::Base, upstream_path)
            .await?
            .unwrap_or_default();
        let theirs_content = self
            .backend
            .content_at(Revision::Latest, upstream_path)
            .await?
            .unwrap_or_default();

        let raw = std::fs::read_to_string(self.config.repo.root.join(local_rel))?;
        let is_template = local_rel.ends_with(".tmpl");

        let ours_content = if is_template {
            self.renderer.render(&raw).await
        } else {
            raw.clone()
        };

        let base = FileState::new(upstream_path, base_content);
        let theirs = FileState::new(upstream_path, theirs_content);
        let ours = FileState::new(local_rel, ours_content);
        let template = if is_template {
            FileState::template(local_rel, raw)
        } else {
            FileState::new(local_rel, raw)
        };

        let scenario = DecisionEngine::classify(&base, &theirs, &ours, &template);
        Ok(MergeItem::new(base, theirs, ours, template, scenario))
    }

    /// Attempt the backend three-way merge for a conflicted item.
    ///
    /// A clean merge upgrades the scenario to `AutoMergeable` and attaches
    /// the merged text; a conflicted or failed merge leaves the item as-is
    /// for review. A failure here is isolated to this item.
    async fn try_auto_merge(&self, item: &mut MergeItem) -> bool {
        if item.template.is_template {
            return false;
        }

        match self
            .backend
            .three_way_merge(
                &item.base.content,
                &item.ours.content,
                &item.theirs.content,
            )
            .await
        {
            Ok(outcome) if outcome.clean => {
                item.scenario = MergeScenario::AutoMergeable;
                item.template.content = outcome.content;
                info!(path = %item.path, "conflict auto-merged");
                true
            }
            Ok(_) => {
                debug!(path = %item.path, "three-way merge left conflicts");
                false
            }
            Err(e) => {
                warn!(path = %item.path, error = %e, "merge attempt failed, routing to review");
                false
            }
        }
    }

    /// Write an item's resolved content to the local tree and stage it.
    async fn write_and_stage(&self, item: &MergeItem) -> Result<(), WorkflowError> {
        let dest = self.config.repo.root.join(&item.path);
        write_atomic(&dest, &item.template.content)?;
        self.backend.stage(&item.path).await?;
        debug!(path = %item.path, scenario = %item.scenario, "wrote resolved content");
        Ok(())
    }

    fn write_run_record(&self, record: &RunRecord) -> Result<(), WorkflowError> {
        let path = record_path(&self.config);
        let json = serde_json::to_string_pretty(record)
            .expect("run record serialization cannot fail");
        write_atomic(&path, &json)?;
        debug!(path = %path.display(), "wrote run record");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// First-run initialization (production backend only)
// ---------------------------------------------------------------------------

impl<T: TemplateRender> ReconcileWorkflow<crate::git::GitBackend, T> {
    /// First run only: set up the base/latest workspace clones and bulk-import
    /// the upstream tree into the local tree.
    ///
    /// Terminates the run — there is nothing to classify yet. Returns the
    /// number of files imported.
    pub async fn initialize(&mut self, remote_url: &str) -> Result<usize, WorkflowError> {
        if self.backend.is_initialized() {
            return Err(WorkflowError::AlreadyInitialized(
                self.backend.workspace().display().to_string(),
            ));
        }

        self.set_state(RunState::Initializing);
        self.backend.init_workspace(remote_url).await?;

        let import = crate::import::InitialImport {
            backend: &self.backend,
            config: &self.config,
        };
        let count = import.run().await?;

        self.set_state(RunState::Done);
        Ok(count)
    }

    /// Refuse to run against a tree whose workspace was never set up.
    pub fn ensure_initialized(&self) -> Result<(), WorkflowError> {
        if self.backend.is_initialized() {
            Ok(())
        } else {
            Err(WorkflowError::NotInitialized(
                self.config.repo.root.display().to_string(),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Location of the persisted run record.
pub fn record_path(config: &ReconcileConfig) -> std::path::PathBuf {
    config
        .repo
        .root
        .join(&config.repo.workspace_dir)
        .join("last-run.json")
}

/// Read back the last run record, if any.
pub fn read_last_run(config: &ReconcileConfig) -> Option<RunRecord> {
    let contents = std::fs::read_to_string(record_path(config)).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Write `content` to `dest` through a temp file in the same directory, so an
/// interrupt never leaves a half-written file.
fn write_atomic(dest: &Path, content: &str) -> std::io::Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::fs::write(tmp.path(), content)?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

fn short(rev: &str) -> &str {
    &rev[..8.min(rev.len())]
}
