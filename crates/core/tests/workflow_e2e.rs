//! End-to-end tests for the reconciliation workflow.
//!
//! The git backend, template renderer and review session are substituted
//! with scripted in-memory implementations, so every pipeline path — the
//! auto-resolutions, the merge attempt, the review queue and the commit
//! phase — runs against a real local tree in a temp directory without
//! touching a git binary.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use dotmerge_core::config::ReconcileConfig;
use dotmerge_core::errors::{GitError, WorkflowError};
use dotmerge_core::git::{MergeOutcome, Revision, VcsBackend};
use dotmerge_core::models::RunStats;
use dotmerge_core::render::TemplateRender;
use dotmerge_core::review::{ReviewDecision, ReviewSession, ReviewUnit};
use dotmerge_core::workflow::ReconcileWorkflow;

// ===========================================================================
// Scripted collaborators
// ===========================================================================

/// In-memory backend: upstream content keyed by revision and path, a changed
/// list, a scripted merge outcome, and an event log for staging/committing.
#[derive(Clone, Default)]
struct MockBackend {
    base: HashMap<String, String>,
    latest: HashMap<String, String>,
    changed: Vec<String>,
    /// Outcome of a non-trivial three-way merge; `None` produces a
    /// conflicted outcome.
    merge_outcome: Option<MergeOutcome>,
    /// When set, `three_way_merge` fails outright with a command error.
    merge_errors: bool,
    events: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn advanced(&self) -> bool {
        self.events().iter().any(|e| e == "advance")
    }

    fn commits(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix("commit:").map(str::to_string))
            .collect()
    }

    fn staged(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix("stage:").map(str::to_string))
            .collect()
    }
}

impl VcsBackend for MockBackend {
    async fn fetch_latest(&self) -> Result<(), GitError> {
        self.log("fetch");
        Ok(())
    }

    async fn head_revision(&self, rev: Revision) -> Result<String, GitError> {
        Ok(match rev {
            Revision::Base => "basebasebasebase".into(),
            Revision::Latest => "feedfeedfeedfeed".into(),
        })
    }

    async fn content_at(&self, rev: Revision, path: &str) -> Result<Option<String>, GitError> {
        let map = match rev {
            Revision::Base => &self.base,
            Revision::Latest => &self.latest,
        };
        Ok(map.get(path).cloned())
    }

    async fn changed_paths(&self, path_filter: Option<&str>) -> Result<Vec<String>, GitError> {
        Ok(self
            .changed
            .iter()
            .filter(|p| path_filter.map(|f| p.starts_with(f)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn three_way_merge(
        &self,
        base: &str,
        ours: &str,
        theirs: &str,
    ) -> Result<MergeOutcome, GitError> {
        if self.merge_errors {
            return Err(GitError::CommandFailed {
                exit_code: 255,
                stderr: "merge-file blew up".into(),
            });
        }
        // Trivial cases resolve cleanly, like the real primitive.
        if ours == base || ours == theirs {
            return Ok(MergeOutcome {
                clean: true,
                content: theirs.to_string(),
            });
        }
        if theirs == base {
            return Ok(MergeOutcome {
                clean: true,
                content: ours.to_string(),
            });
        }
        Ok(self.merge_outcome.clone().unwrap_or(MergeOutcome {
            clean: false,
            content: format!("<<<<<<< ours\n{}\n=======\n{}\n>>>>>>> theirs\n", ours, theirs),
        }))
    }

    async fn stage(&self, path: &str) -> Result<(), GitError> {
        self.log(format!("stage:{}", path));
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<(), GitError> {
        self.log(format!("commit:{}", message));
        Ok(())
    }

    async fn advance_base(&self) -> Result<(), GitError> {
        self.log("advance");
        Ok(())
    }
}

/// Renderer substituting `{{ v }}` with a fixed value.
struct MockRenderer {
    value: &'static str,
}

impl TemplateRender for MockRenderer {
    async fn render(&self, raw: &str) -> String {
        raw.replace("{{ v }}", self.value)
    }
}

/// Review session that replays scripted decisions and records what it saw.
#[derive(Default)]
struct ScriptedSession {
    decisions: VecDeque<ReviewDecision>,
    begin_stats: Option<RunStats>,
    /// (path, base, theirs, ours, editable seed) per presented unit.
    seen: Vec<(String, String, String, String, String)>,
}

impl ScriptedSession {
    fn new(decisions: Vec<ReviewDecision>) -> Self {
        Self {
            decisions: decisions.into(),
            ..Default::default()
        }
    }
}

impl ReviewSession for ScriptedSession {
    fn begin(&mut self, stats: &RunStats) {
        self.begin_stats = Some(stats.clone());
    }

    fn review(&mut self, unit: &ReviewUnit<'_>) -> Result<ReviewDecision, WorkflowError> {
        self.seen.push((
            unit.item.path.clone(),
            unit.item.base.content.clone(),
            unit.item.theirs.content.clone(),
            unit.item.ours.content.clone(),
            unit.item.template.content.clone(),
        ));
        self.decisions
            .pop_front()
            .ok_or_else(|| WorkflowError::ReviewFailed("script exhausted".into()))
    }
}

// ===========================================================================
// Fixtures
// ===========================================================================

struct Fixture {
    #[allow(dead_code)]
    tree: TempDir,
    config: ReconcileConfig,
}

/// A local tree with the given annotated files, plus a matching config.
fn fixture(files: &[(&str, &str)]) -> Fixture {
    let tree = TempDir::new().unwrap();
    for (path, content) in files {
        let dest = tree.path().join(path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(dest, content).unwrap();
    }

    let toml = format!(
        r#"
[repo]
root = "{}"
[upstream]
url = "https://example.com/dots.git"
"#,
        tree.path().display()
    );
    let config: ReconcileConfig = toml::from_str(&toml).unwrap();
    Fixture { tree, config }
}

fn read_local(fx: &Fixture, path: &str) -> String {
    std::fs::read_to_string(fx.config.repo.root.join(path)).unwrap()
}

// ===========================================================================
// End-to-end scenarios
// ===========================================================================

#[tokio::test]
async fn scenario_a_auto_update_takes_upstream() {
    let fx = fixture(&[("dot_conf", "x=1")]);
    let backend = MockBackend {
        base: HashMap::from([(".conf".into(), "x=1".into())]),
        latest: HashMap::from([(".conf".into(), "x=2".into())]),
        changed: vec![".conf".into()],
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let mut session = ScriptedSession::new(vec![]);
    let stats = workflow.run(&mut session).await.unwrap();

    assert_eq!(stats.auto_updated, 1);
    assert_eq!(stats.pending_review(), 0);
    assert_eq!(read_local(&fx, "dot_conf"), "x=2");
    assert_eq!(backend.staged(), vec!["dot_conf"]);
    assert!(backend.advanced());
    assert_eq!(backend.commits().len(), 1);
    // Queue was empty: no unit ever reached the session.
    assert!(session.seen.is_empty());
}

#[tokio::test]
async fn scenario_b_auto_keep_writes_nothing() {
    let fx = fixture(&[("dot_conf", "x=9")]);
    let backend = MockBackend {
        base: HashMap::from([(".conf".into(), "x=1".into())]),
        latest: HashMap::from([(".conf".into(), "x=1".into())]),
        changed: vec![".conf".into()],
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let stats = workflow.run(&mut ScriptedSession::new(vec![])).await.unwrap();

    assert_eq!(stats.auto_kept, 1);
    assert_eq!(read_local(&fx, "dot_conf"), "x=9");
    assert!(backend.staged().is_empty());
    assert!(backend.commits().is_empty());
    // The full (empty) queue was processed, so the pointer still advances.
    assert!(backend.advanced());
}

#[tokio::test]
async fn scenario_c_clean_merge_upgrades_to_auto_mergeable() {
    let fx = fixture(&[("dot_conf", "a\nb2")]);
    let backend = MockBackend {
        base: HashMap::from([(".conf".into(), "a\nb".into())]),
        latest: HashMap::from([(".conf".into(), "a2\nb".into())]),
        changed: vec![".conf".into()],
        merge_outcome: Some(MergeOutcome {
            clean: true,
            content: "a2\nb2".into(),
        }),
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let mut session = ScriptedSession::new(vec![]);
    let stats = workflow.run(&mut session).await.unwrap();

    assert_eq!(stats.auto_merged, 1);
    assert_eq!(stats.conflicts, 0);
    assert_eq!(read_local(&fx, "dot_conf"), "a2\nb2");
    assert_eq!(backend.staged(), vec!["dot_conf"]);
    assert_eq!(backend.commits().len(), 1);
    // Once upgraded, the item never reaches review.
    assert!(session.seen.is_empty());
}

#[tokio::test]
async fn scenario_d_failed_merge_stays_conflict_with_all_panes() {
    let fx = fixture(&[("dot_conf", "a\nb2")]);
    let backend = MockBackend {
        base: HashMap::from([(".conf".into(), "a\nb".into())]),
        latest: HashMap::from([(".conf".into(), "a2\nb".into())]),
        changed: vec![".conf".into()],
        merge_outcome: None, // conflicted merge
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let mut session = ScriptedSession::new(vec![ReviewDecision::Submit("resolved".into())]);
    let stats = workflow.run(&mut session).await.unwrap();

    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.reviewed, 1);

    // All four panes were populated from the original inputs.
    let (path, base, theirs, ours, seed) = &session.seen[0];
    assert_eq!(path, "dot_conf");
    assert_eq!(base, "a\nb");
    assert_eq!(theirs, "a2\nb");
    assert_eq!(ours, "a\nb2");
    assert_eq!(seed, "a\nb2");

    assert_eq!(read_local(&fx, "dot_conf"), "resolved");
    assert!(backend.advanced());
    assert_eq!(backend.commits().len(), 1);
}

// ===========================================================================
// Pipeline behavior
// ===========================================================================

#[tokio::test]
async fn no_upstream_changes_is_a_successful_no_op() {
    let fx = fixture(&[("dot_conf", "x=1")]);
    let backend = MockBackend::default();

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let stats = workflow.run(&mut ScriptedSession::new(vec![])).await.unwrap();

    assert_eq!(stats.changed, 0);
    assert!(!backend.advanced());
    assert!(backend.commits().is_empty());
    assert_eq!(
        workflow.state(),
        &dotmerge_core::workflow::RunState::Done
    );
}

#[tokio::test]
async fn already_synced_items_are_dropped() {
    let fx = fixture(&[("dot_conf", "same")]);
    let backend = MockBackend {
        base: HashMap::from([(".conf".into(), "old".into())]),
        latest: HashMap::from([(".conf".into(), "same".into())]),
        changed: vec![".conf".into()],
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let stats = workflow.run(&mut ScriptedSession::new(vec![])).await.unwrap();

    assert_eq!(stats.already_synced, 1);
    assert!(backend.staged().is_empty());
}

#[tokio::test]
async fn unmatched_upstream_paths_are_skipped_not_fatal() {
    let fx = fixture(&[("dot_conf", "x=1")]);
    let backend = MockBackend {
        latest: HashMap::from([(".zshrc".into(), "new file".into())]),
        changed: vec![".zshrc".into()],
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let stats = workflow.run(&mut ScriptedSession::new(vec![])).await.unwrap();

    assert_eq!(stats.skipped, vec![".zshrc".to_string()]);
    assert_eq!(stats.changed, 1);
    assert!(backend.advanced());
}

#[tokio::test]
async fn merge_attempt_failure_is_isolated_to_the_item() {
    // Two conflicts; the merge primitive errors outright. Both fall through
    // to review instead of aborting the run.
    let fx = fixture(&[("dot_a", "A-local"), ("dot_b", "B-local")]);
    let backend = MockBackend {
        base: HashMap::from([(".a".into(), "A".into()), (".b".into(), "B".into())]),
        latest: HashMap::from([
            (".a".into(), "A-up".into()),
            (".b".into(), "B-up".into()),
        ]),
        changed: vec![".a".into(), ".b".into()],
        merge_errors: true,
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let mut session = ScriptedSession::new(vec![
        ReviewDecision::Submit("a-resolved".into()),
        ReviewDecision::Submit("b-resolved".into()),
    ]);
    let stats = workflow.run(&mut session).await.unwrap();

    assert_eq!(stats.conflicts, 2);
    assert_eq!(stats.reviewed, 2);
    assert_eq!(read_local(&fx, "dot_a"), "a-resolved");
    assert_eq!(read_local(&fx, "dot_b"), "b-resolved");
}

#[tokio::test]
async fn abort_persists_confirmed_items_but_not_the_pointer() {
    let fx = fixture(&[("dot_a", "A-local"), ("dot_b", "B-local")]);
    let backend = MockBackend {
        base: HashMap::from([(".a".into(), "A".into()), (".b".into(), "B".into())]),
        latest: HashMap::from([
            (".a".into(), "A-up".into()),
            (".b".into(), "B-up".into()),
        ]),
        changed: vec![".a".into(), ".b".into()],
        merge_outcome: None,
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let mut session = ScriptedSession::new(vec![
        ReviewDecision::Submit("a-resolved".into()),
        ReviewDecision::Abort,
    ]);
    let stats = workflow.run(&mut session).await.unwrap();

    assert!(stats.aborted);
    assert_eq!(stats.reviewed, 1);
    // The confirmed item stands, committed.
    assert_eq!(read_local(&fx, "dot_a"), "a-resolved");
    assert_eq!(backend.commits().len(), 1);
    // The unconfirmed item is untouched and the pointer did not move, so a
    // rerun reprocesses the same change set.
    assert_eq!(read_local(&fx, "dot_b"), "B-local");
    assert!(!backend.advanced());
}

#[tokio::test]
async fn pre_review_summary_reports_auto_resolutions_and_skips() {
    let fx = fixture(&[("dot_auto", "x=1"), ("dot_conflict", "c-local")]);
    let backend = MockBackend {
        base: HashMap::from([
            (".auto".into(), "x=1".into()),
            (".conflict".into(), "c".into()),
        ]),
        latest: HashMap::from([
            (".auto".into(), "x=2".into()),
            (".conflict".into(), "c-up".into()),
            (".missing".into(), "m".into()),
        ]),
        changed: vec![".auto".into(), ".conflict".into(), ".missing".into()],
        merge_outcome: None,
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let mut session = ScriptedSession::new(vec![ReviewDecision::Submit("done".into())]);
    workflow.run(&mut session).await.unwrap();

    let begin = session.begin_stats.expect("summary shown before review");
    assert_eq!(begin.auto_updated, 1);
    assert_eq!(begin.conflicts, 1);
    assert_eq!(begin.skipped, vec![".missing".to_string()]);
}

// ===========================================================================
// Templates
// ===========================================================================

#[tokio::test]
async fn template_divergence_is_reviewed_against_raw_source() {
    let fx = fixture(&[("dot_gitconfig.tmpl", "x={{ v }}")]);
    let backend = MockBackend {
        base: HashMap::from([(".gitconfig".into(), "x=1".into())]),
        latest: HashMap::from([(".gitconfig".into(), "x=2".into())]),
        changed: vec![".gitconfig".into()],
        // A clean textual merge would be possible, but templates are never
        // auto-resolved.
        merge_outcome: Some(MergeOutcome {
            clean: true,
            content: "never used".into(),
        }),
        ..Default::default()
    };

    let mut workflow = ReconcileWorkflow::new(
        fx.config.clone(),
        backend.clone(),
        MockRenderer { value: "9" },
    );
    let mut session =
        ScriptedSession::new(vec![ReviewDecision::Submit("x={{ v }} # updated".into())]);
    let stats = workflow.run(&mut session).await.unwrap();

    assert_eq!(stats.template_divergence, 1);
    assert_eq!(stats.auto_merged, 0);

    // The editable pane was seeded with the raw template source, while the
    // "ours" pane showed the rendered comparison view.
    let (_, _, theirs, ours, seed) = &session.seen[0];
    assert_eq!(theirs, "x=2");
    assert_eq!(ours, "x=9");
    assert_eq!(seed, "x={{ v }}");

    // The resolution lands in the raw template file.
    assert_eq!(read_local(&fx, "dot_gitconfig.tmpl"), "x={{ v }} # updated");
}

#[tokio::test]
async fn template_rendering_to_upstream_content_counts_as_synced() {
    let fx = fixture(&[("dot_gitconfig.tmpl", "x={{ v }}")]);
    let backend = MockBackend {
        base: HashMap::from([(".gitconfig".into(), "x=1".into())]),
        latest: HashMap::from([(".gitconfig".into(), "x=2".into())]),
        changed: vec![".gitconfig".into()],
        ..Default::default()
    };

    let mut workflow = ReconcileWorkflow::new(
        fx.config.clone(),
        backend.clone(),
        MockRenderer { value: "2" },
    );
    let stats = workflow.run(&mut ScriptedSession::new(vec![])).await.unwrap();

    assert_eq!(stats.already_synced, 1);
    assert!(backend.staged().is_empty());
}

// ===========================================================================
// Subdirectory filter & editor escape hatch
// ===========================================================================

#[tokio::test]
async fn subdir_prefix_is_stripped_before_local_matching() {
    let fx = {
        let mut fx = fixture(&[("dot_bashrc", "x=1")]);
        fx.config.upstream.subdir = Some("home".into());
        fx
    };
    let backend = MockBackend {
        base: HashMap::from([("home/.bashrc".into(), "x=1".into())]),
        latest: HashMap::from([
            ("home/.bashrc".into(), "x=2".into()),
            ("docs/readme".into(), "outside filter".into()),
        ]),
        changed: vec!["home/.bashrc".into(), "docs/readme".into()],
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let stats = workflow.run(&mut ScriptedSession::new(vec![])).await.unwrap();

    // docs/readme never made it past the filter.
    assert_eq!(stats.changed, 1);
    assert_eq!(stats.auto_updated, 1);
    assert_eq!(read_local(&fx, "dot_bashrc"), "x=2");
}

#[cfg(unix)]
#[tokio::test]
async fn external_editor_clean_exit_is_an_implicit_submit() {
    let fx = {
        let mut fx = fixture(&[("dot_conf", "c-local")]);
        // `true` exits cleanly without touching the result file, leaving the
        // seeded template source as the edited result.
        fx.config.review.editor = Some("true".into());
        fx
    };
    let backend = MockBackend {
        base: HashMap::from([(".conf".into(), "c".into())]),
        latest: HashMap::from([(".conf".into(), "c-up".into())]),
        changed: vec![".conf".into()],
        merge_outcome: None,
        ..Default::default()
    };

    let mut workflow =
        ReconcileWorkflow::new(fx.config.clone(), backend.clone(), MockRenderer { value: "" });
    let mut session = ScriptedSession::new(vec![ReviewDecision::ExternalEditor]);
    let stats = workflow.run(&mut session).await.unwrap();

    assert_eq!(stats.reviewed, 1);
    assert!(!stats.aborted);
    assert_eq!(read_local(&fx, "dot_conf"), "c-local");
    assert!(backend.advanced());
}
