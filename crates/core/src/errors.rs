//! Error types for the dotmerge core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

// ---------------------------------------------------------------------------
// Git backend errors
// ---------------------------------------------------------------------------

/// Errors from git CLI operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// The merge workspace (base/latest clones) has not been set up.
    #[error("merge workspace not initialized at '{0}' (run init first)")]
    WorkspaceMissing(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Template renderer errors
// ---------------------------------------------------------------------------

/// Errors from the template renderer subprocess.
///
/// Rendering is best-effort: these never escape
/// [`TemplateRenderer::render`](crate::render::TemplateRenderer), which logs
/// the failure and falls back to the raw text.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer binary was not found on `$PATH`.
    #[error("renderer binary not found: {0}")]
    BinaryNotFound(String),

    /// The renderer exited with a non-zero status.
    #[error("renderer failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// Generic I/O wrapper.
    #[error("renderer I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Workflow errors
// ---------------------------------------------------------------------------

/// Errors from the reconciliation workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A run was started against a tree whose workspace was never set up.
    #[error("repository not initialized for reconciliation: {0}")]
    NotInitialized(String),

    /// `init` was invoked on a tree that already has a workspace.
    #[error("merge workspace already exists at '{0}'")]
    AlreadyInitialized(String),

    /// The interactive review session failed to produce a decision.
    #[error("review session error: {0}")]
    ReviewFailed(String),

    /// The external editor hand-off could not be launched.
    #[error("external editor '{editor}' failed: {detail}")]
    EditorFailed { editor: String, detail: String },

    /// Underlying git backend error.
    #[error("workflow git error: {0}")]
    Git(#[from] GitError),

    /// Local-tree I/O error (reading or writing reconciled files).
    #[error("workflow I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
