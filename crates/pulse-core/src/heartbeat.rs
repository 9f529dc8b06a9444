//! Heartbeat records sent to the collector.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One file-activity event, fully tagged and ready for delivery.
///
/// Heartbeats are immutable once built: the dispatcher owns them through the
/// send/queue pipeline and nothing mutates them after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Heartbeat {
    /// Absolute, symlink-resolved path of the touched file.
    pub entity: String,
    /// Event type. Currently always `file`.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Event timestamp as floating-point unix epoch seconds.
    pub time: f64,
    /// Whether the event was a file write rather than a plain edit.
    pub is_write: bool,
    /// Resolved project name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Resolved branch name, if the VCS has a branch concept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Language tag supplied by the editor plugin. Opaque to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Line count supplied by the editor plugin. Opaque to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<u64>,
    /// Dependencies supplied by the editor plugin, in the order given.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Agent identification string.
    pub user_agent: String,
}

/// Resolves an entity path to its absolute, symlink-resolved form.
///
/// Falls back to lexical absolutization when the file cannot be
/// canonicalized (for example when it was deleted between the edit and this
/// invocation). Never fails; the original path is the last resort.
pub fn normalize_entity(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Heartbeat {
        Heartbeat {
            entity: "/home/dev/repo/src/main.rs".to_string(),
            entity_type: "file".to_string(),
            time: 1_585_598_059.5,
            is_write: true,
            project: Some("repo".to_string()),
            branch: Some("master".to_string()),
            language: Some("Rust".to_string()),
            lines: Some(42),
            dependencies: vec!["serde".to_string()],
            user_agent: "pulse/0.1.0 (linux-x86_64)".to_string(),
        }
    }

    #[test]
    fn heartbeat_serialization_round_trips() {
        let heartbeat = sample();
        let json = serde_json::to_string(&heartbeat).unwrap();
        let parsed: Heartbeat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, heartbeat);
    }

    #[test]
    fn absent_fields_are_omitted_and_default_on_read() {
        let heartbeat = Heartbeat {
            project: None,
            branch: None,
            language: None,
            lines: None,
            dependencies: Vec::new(),
            ..sample()
        };
        let json = serde_json::to_string(&heartbeat).unwrap();
        assert!(!json.contains("project"));
        assert!(!json.contains("branch"));
        assert!(!json.contains("dependencies"));

        let parsed: Heartbeat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, heartbeat);
    }

    #[test]
    fn event_type_serializes_as_type() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains(r#""type":"file""#));
    }

    #[test]
    fn normalize_entity_resolves_symlinks() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("real.txt");
        std::fs::write(&target, "x").unwrap();

        #[cfg(unix)]
        {
            let link = temp.path().join("link.txt");
            std::os::unix::fs::symlink(&target, &link).unwrap();
            assert_eq!(normalize_entity(&link), target.canonicalize().unwrap());
        }
    }

    #[test]
    fn normalize_entity_handles_missing_files() {
        let normalized = normalize_entity(Path::new("does/not/exist.txt"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("does/not/exist.txt"));
    }
}
