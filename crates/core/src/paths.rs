//! Path translation between annotated local source paths and plain target
//! paths.
//!
//! Local source files carry attribute markers in their path segments
//! (`dot_config/private_foo`) and an optional `.tmpl` suffix; upstream
//! repositories hold the plain target paths (`.config/foo`). [`normalize`]
//! strips the annotations, [`denormalize`] applies the single import-time
//! rule, and [`find_local_match`] locates the local source that generates a
//! given target path.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

/// Attribute-marker prefixes stripped from path segments, in match order.
const ATTR_PREFIXES: &[&str] = &[
    "private_",
    "executable_",
    "exact_",
    "symlink_",
    "modify_",
    "create_",
    "empty_",
    "readonly_",
];

/// Marker prefix that maps to a literal leading dot.
const HIDDEN_PREFIX: &str = "dot_";

/// Template suffix stripped from the final segment.
const TEMPLATE_SUFFIX: &str = ".tmpl";

// ---------------------------------------------------------------------------
// normalize / denormalize
// ---------------------------------------------------------------------------

/// Convert an annotated source path to its plain target path.
///
/// Per segment: the final segment first loses a trailing `.tmpl`, then every
/// segment is stripped iteratively until no marker matches — `dot_` becomes a
/// leading `.` and the attribute markers are removed. A segment may carry
/// multiple stacked markers (`private_dot_netrc` → `.netrc`); the hidden-file
/// marker is checked on each pass alongside the others. Pure and total:
/// untouched segments pass through unchanged, and the function is idempotent
/// on already-normalized paths.
pub fn normalize(source_path: &str) -> String {
    let segments: Vec<&str> = source_path.split('/').collect();
    let last = segments.len().saturating_sub(1);

    let normalized: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(i, seg)| normalize_segment(seg, i == last))
        .collect();

    normalized.join("/")
}

fn normalize_segment(segment: &str, is_final: bool) -> String {
    let mut p = segment.to_string();

    if is_final {
        if let Some(stripped) = p.strip_suffix(TEMPLATE_SUFFIX) {
            p = stripped.to_string();
        }
    }

    loop {
        let mut changed = false;

        if let Some(rest) = p.strip_prefix(HIDDEN_PREFIX) {
            p = format!(".{}", rest);
            changed = true;
        }

        for prefix in ATTR_PREFIXES {
            if let Some(rest) = p.strip_prefix(prefix) {
                p = rest.to_string();
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    p
}

/// Convert a plain target path to a basic annotated source path.
///
/// Applies exactly one rule: a leading dot on a segment becomes the `dot_`
/// marker. This is deliberately NOT an inverse of [`normalize`] — attribute
/// markers and the template suffix are never re-added. The asymmetry is a
/// scope limit of the initial-import path, kept as-is.
pub fn denormalize(target_path: &str) -> String {
    target_path
        .split('/')
        .map(|seg| match seg.strip_prefix('.') {
            Some(rest) if !rest.is_empty() => format!("{}{}", HIDDEN_PREFIX, rest),
            _ => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Local tree scanning
// ---------------------------------------------------------------------------

/// List every file under `root`, as `/`-separated paths relative to `root`.
///
/// Directories named in `skip_dirs` (version-control internals, the merge
/// workspace) are not descended into, and paths matching an ignore pattern
/// are dropped. Traversal is sorted by file name so the result is
/// deterministic across platforms.
pub fn list_files(root: &Path, skip_dirs: &[&str], ignore_patterns: &[String]) -> Vec<String> {
    let walker = walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                !skip_dirs.iter().any(|d| *d == name)
            } else {
                true
            }
        });

    let mut files = Vec::new();
    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let rel_str = to_slash_path(rel);
        if ignore_patterns
            .iter()
            .any(|pat| glob_match::glob_match(pat, &rel_str))
        {
            trace!(path = %rel_str, "ignored by pattern");
            continue;
        }
        files.push(rel_str);
    }
    files
}

/// Find the local annotated source file that generates `target_rel_path`.
///
/// Scans every file under `repo_root` (excluding `.git` and the merge
/// workspace), normalizes each candidate's relative path and returns the
/// first one equal to the target. Returns `None` when no candidate matches —
/// the local tree may legitimately not contain every upstream file.
///
/// Multiple candidates can normalize to the same target path; the first in
/// sorted traversal order wins. Known ambiguity, kept as a documented policy.
pub fn find_local_match(
    repo_root: &Path,
    target_rel_path: &str,
    workspace_dir: &str,
    ignore_patterns: &[String],
) -> Option<PathBuf> {
    let candidates = list_files(repo_root, &[".git", workspace_dir], ignore_patterns);

    for candidate in candidates {
        let normalized = normalize(&candidate);
        if normalized == target_rel_path {
            debug!(target = target_rel_path, source = %candidate, "local match");
            return Some(PathBuf::from(candidate));
        }
    }

    debug!(target = target_rel_path, "no local match");
    None
}

/// Render a relative path with `/` separators regardless of platform.
fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
