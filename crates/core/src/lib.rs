//! dotmerge core library.
//!
//! Reconciles a customized, annotated dotfiles source tree against an
//! upstream repository that has since changed: path translation between
//! annotated and plain paths, four-way scenario classification, the git
//! backend client, and the workflow that sequences fetch → classify →
//! auto-resolve → review → commit over a batch of files.

pub mod config;
pub mod decision;
pub mod errors;
pub mod git;
pub mod import;
pub mod models;
pub mod paths;
pub mod render;
pub mod review;
pub mod workflow;

// Re-exports for convenience.
pub use config::ReconcileConfig;
pub use decision::DecisionEngine;
pub use git::GitBackend;
pub use models::{FileState, MergeItem, MergeScenario, RunStats};
pub use workflow::{ReconcileWorkflow, RunState};
