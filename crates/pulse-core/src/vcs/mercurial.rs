//! Mercurial project and branch detection.

use std::fs;
use std::path::Path;

use super::{Detection, dir_name};

pub(super) fn detect(entity: &Path) -> Option<Detection> {
    let start = entity.parent()?;
    let root = start.ancestors().find(|dir| dir.join(".hg").is_dir())?;
    Some(Detection {
        project: dir_name(root),
        branch: Some(read_branch(root)),
    })
}

/// Reads `.hg/branch`. Mercurial only writes the file after the first
/// explicit branch switch, so a missing, unreadable, or empty file means the
/// repository is on the implicit `default` branch.
fn read_branch(root: &Path) -> String {
    fs::read_to_string(root.join(".hg").join("branch"))
        .ok()
        .map(|contents| contents.trim().to_string())
        .filter(|branch| !branch.is_empty())
        .unwrap_or_else(|| "default".to_string())
}
