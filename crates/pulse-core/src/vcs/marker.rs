//! Explicit project marker files.
//!
//! A `.pulse-project` file anywhere in the entity's ancestry names the
//! project directly and takes priority over every VCS probe.

use std::fs;
use std::path::Path;

use super::Detection;

const MARKER_FILE: &str = ".pulse-project";

pub(super) fn detect(entity: &Path) -> Option<Detection> {
    let start = entity.parent()?;
    for dir in start.ancestors() {
        let Ok(contents) = fs::read_to_string(dir.join(MARKER_FILE)) else {
            continue;
        };
        let name = contents.lines().next().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        return Some(Detection {
            project: Some(name.to_string()),
            branch: None,
        });
    }
    None
}
