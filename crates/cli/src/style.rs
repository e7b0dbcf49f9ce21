//! Shared styling utilities for the CLI.

use console::Style;
use dotmerge_core::models::MergeScenario;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Color a merge scenario label for display.
pub fn scenario(s: &MergeScenario) -> String {
    let style = match s {
        MergeScenario::AlreadySynced => Style::new().dim(),
        MergeScenario::AutoUpdate | MergeScenario::AutoMergeable => Style::new().green(),
        MergeScenario::AutoKeep => Style::new().blue(),
        MergeScenario::Conflict => Style::new().red().bold(),
        MergeScenario::TemplateDivergence => Style::new().magenta().bold(),
    };
    style.apply_to(s.to_string()).to_string()
}
