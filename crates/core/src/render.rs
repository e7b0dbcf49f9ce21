//! Template renderer client.
//!
//! Template sources are compared against upstream through their *rendered*
//! content, produced by an external tool (`chezmoi execute-template` by
//! default) fed the raw text on stdin. Rendering only ever produces a
//! comparison view: a renderer that is missing or fails must not abort the
//! run, so [`TemplateRenderer::render`] falls back to the raw text.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::RenderError;

/// Capability to render a template source into its effective content.
pub trait TemplateRender {
    /// Render `raw`; implementations must be infallible (fall back to the
    /// raw text on any failure).
    fn render(&self, raw: &str) -> impl std::future::Future<Output = String> + Send;
}

/// Renderer backed by an external command reading stdin and writing stdout.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    command: String,
    args: Vec<String>,
}

impl TemplateRenderer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    async fn try_render(&self, raw: &str) -> Result<String, RenderError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = %self.command, "rendering template");
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::BinaryNotFound(self.command.clone())
            } else {
                RenderError::IoError(e)
            }
        })?;

        if let Some(ref mut stdin) = child.stdin {
            stdin.write_all(raw.as_bytes()).await?;
        }
        drop(child.stdin.take());

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(RenderError::CommandFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl TemplateRender for TemplateRenderer {
    async fn render(&self, raw: &str) -> String {
        match self.try_render(raw).await {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "template rendering failed, using raw text");
                raw.to_string()
            }
        }
    }
}
