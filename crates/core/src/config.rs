//! Configuration for a dotmerge-managed local tree.
//!
//! Loaded from a TOML file, one section per concern. All fields that have a
//! sensible default are optional in the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Configuration for one reconciliation setup (one local tree, one upstream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Local tree settings.
    pub repo: RepoConfig,

    /// Upstream repository settings.
    pub upstream: UpstreamConfig,

    /// Template renderer settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Interactive review settings.
    #[serde(default)]
    pub review: ReviewConfig,

    /// Miscellaneous behaviour options.
    #[serde(default)]
    pub options: OptionsConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The operator's local source tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Root of the local tree (the annotated dotfiles source repository).
    pub root: PathBuf,

    /// Directory inside the root holding the base/latest upstream clones.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,
}

fn default_workspace_dir() -> String {
    ".merge-workspace".into()
}

/// The upstream repository whose changes are being incorporated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Clone URL of the upstream repository.
    pub url: String,

    /// Optional subdirectory of upstream to reconcile against; changed paths
    /// outside it are ignored and the prefix is stripped before local
    /// matching.
    #[serde(default)]
    pub subdir: Option<String>,
}

/// External template renderer invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Renderer executable.
    #[serde(default = "default_render_command")]
    pub command: String,

    /// Arguments passed before the template text arrives on stdin.
    #[serde(default = "default_render_args")]
    pub args: Vec<String>,
}

fn default_render_command() -> String {
    "chezmoi".into()
}

fn default_render_args() -> Vec<String> {
    vec!["execute-template".into()]
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            command: default_render_command(),
            args: default_render_args(),
        }
    }
}

/// Interactive review settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// External editor for the four-pane escape hatch. Falls back to
    /// `$EDITOR`, then `vi`.
    #[serde(default)]
    pub editor: Option<String>,
}

impl ReviewConfig {
    /// Resolve the editor command to use for the escape hatch.
    pub fn resolve_editor(&self) -> String {
        if let Some(editor) = &self.editor {
            return editor.clone();
        }
        match std::env::var("EDITOR") {
            Ok(v) if !v.is_empty() => v,
            _ => "vi".into(),
        }
    }
}

/// Miscellaneous behaviour options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Glob patterns of local paths excluded from matching and import.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Commit message template. Placeholders: `{count}` (files written),
    /// `{latest}` (upstream revision reconciled to).
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_commit_message() -> String {
    "Reconcile {count} file(s) with upstream {latest}".into()
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            log_level: default_log_level(),
            commit_message: default_commit_message(),
        }
    }
}

impl OptionsConfig {
    /// Fill the commit message template.
    pub fn format_commit_message(&self, count: usize, latest: &str) -> String {
        let short = &latest[..8.min(latest.len())];
        self.commit_message
            .replace("{count}", &count.to_string())
            .replace("{latest}", short)
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl ReconcileConfig {
    /// Load a [`ReconcileConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: ReconcileConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repo.root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repo.root".into(),
                detail: "local tree root must not be empty".into(),
            });
        }
        if self.repo.workspace_dir.is_empty() || self.repo.workspace_dir.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "repo.workspace_dir".into(),
                detail: "workspace dir must be a single directory name".into(),
            });
        }
        if self.upstream.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.url".into(),
                detail: "upstream URL must not be empty".into(),
            });
        }
        if let Some(subdir) = &self.upstream.subdir {
            if subdir.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    field: "upstream.subdir".into(),
                    detail: "subdir must be relative to the upstream root".into(),
                });
            }
        }
        if self.render.command.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "render.command".into(),
                detail: "renderer command must not be empty".into(),
            });
        }
        match self.options.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "options.log_level".into(),
                    detail: format!("unknown log level '{}'", other),
                });
            }
        }
        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// The upstream subdir as a diff prefix (with a trailing slash), if set.
    pub fn subdir_prefix(&self) -> Option<String> {
        self.upstream
            .subdir
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("{}/", s.trim_end_matches('/')))
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# dotmerge configuration

[repo]
root = "~/.local/share/chezmoi"
# workspace_dir = ".merge-workspace"

[upstream]
url = "https://github.com/org/dotfiles"
# subdir = "home"

[render]
# command = "chezmoi"
# args = ["execute-template"]

[review]
# editor = "vim"   # defaults to $EDITOR, then vi

[options]
# ignore_patterns = ["*.swp"]
log_level = "info"
# commit_message = "Reconcile {count} file(s) with upstream {latest}"
"#
    }
}
