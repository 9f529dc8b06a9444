//! Subversion project detection via the `svn` binary.
//!
//! Only consulted after git detection fails. Subversion has no branch
//! concept at this level, so detections never carry one.

use std::path::Path;
use std::process::Command;

use super::Detection;

pub(super) fn detect(entity: &Path) -> Option<Detection> {
    let dir = entity.parent()?;

    // Invoking svn on macOS without the command-line developer tools
    // installed triggers an interactive install prompt, so check first.
    if cfg!(target_os = "macos") && !has_developer_tools() {
        return None;
    }

    let output = Command::new("svn").arg("info").arg(dir).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let project = parse_repository_root(&stdout)?;
    Some(Detection {
        project: Some(project),
        branch: None,
    })
}

fn has_developer_tools() -> bool {
    Command::new("/usr/bin/xcode-select")
        .arg("-p")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Extracts the final path segment of the `Repository Root` field from
/// `svn info` output.
fn parse_repository_root(info: &str) -> Option<String> {
    let value = info.lines().find_map(|line| {
        line.strip_prefix("Repository Root:")
            .map(str::trim)
    })?;
    let name = value.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
