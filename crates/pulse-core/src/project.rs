//! Project resolution: overrides, the probe chain, and projectmap
//! rewriting, in that order.

use std::path::Path;

use thiserror::Error;

use crate::project_map::{self, ProjectMapError, ProjectMapRule};
use crate::vcs::{self, SubmodulePolicy};

/// Caller-supplied overrides and configuration for one resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Forced project name. Wins over every probe and map rule.
    pub project_override: Option<String>,
    /// Fallback project name, used only when no probe finds anything.
    pub alternate_project: Option<String>,
    /// How git submodules are reported.
    pub submodule_policy: SubmodulePolicy,
    /// Ordered projectmap rewrite rules.
    pub project_map: Vec<ProjectMapRule>,
}

/// The final project and branch for a heartbeat.
///
/// `None` means "unknown" for the project and "no branch concept applies"
/// for the branch; neither is ever an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectResult {
    pub project: Option<String>,
    pub branch: Option<String>,
}

/// A projectmap template referenced a capture group that the match does not
/// have. The heartbeat keeps the unmapped name carried in `fallback`, but
/// the run must report the failure.
#[derive(Debug, Clone, Error)]
#[error("{source}")]
pub struct ResolveError {
    /// Best-effort result with the pre-mapping project name.
    pub fallback: ProjectResult,
    #[source]
    pub source: ProjectMapError,
}

/// Resolves the project and branch for an entity path.
///
/// Probe I/O failures degrade to "not found" inside the chain and invalid
/// map patterns are skipped with a warning, so the only error out of here is
/// an out-of-range replacement group.
pub fn resolve(entity: &Path, options: &ResolveOptions) -> Result<ProjectResult, ResolveError> {
    if let Some(forced) = &options.project_override {
        return Ok(ProjectResult {
            project: Some(forced.clone()),
            branch: None,
        });
    }

    let Some(found) = vcs::detect(entity, &options.submodule_policy) else {
        return Ok(ProjectResult {
            project: options.alternate_project.clone(),
            branch: None,
        });
    };

    let mut result = ProjectResult {
        project: found.project,
        branch: found.branch,
    };

    // Mapping rewrites a detected name; it never invents a project.
    if let Some(name) = result.project.clone() {
        match project_map::apply(&options.project_map, &name) {
            Ok(Some(mapped)) => result.project = Some(mapped),
            Ok(None) => {}
            Err(source) => {
                tracing::warn!("{source}");
                return Err(ResolveError {
                    fallback: result,
                    source,
                });
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    fn git_repo(temp: &Path, name: &str) -> PathBuf {
        let repo = temp.join(name);
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(repo.join(".git").join("HEAD"), "ref: refs/heads/master\n").unwrap();
        fs::write(repo.join("emptyfile.txt"), "").unwrap();
        repo
    }

    fn map_rule(pattern: &str, replacement: &str) -> ProjectMapRule {
        ProjectMapRule {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }

    #[test]
    fn detected_git_project_and_branch() {
        let temp = tempfile::tempdir().unwrap();
        let repo = git_repo(temp.path(), "repo");

        let result = resolve(&repo.join("emptyfile.txt"), &ResolveOptions::default()).unwrap();
        assert_eq!(result.project.as_deref(), Some("repo"));
        assert_eq!(result.branch.as_deref(), Some("master"));
    }

    #[test]
    fn forced_project_wins_over_detection() {
        let temp = tempfile::tempdir().unwrap();
        let repo = git_repo(temp.path(), "repo");

        let options = ResolveOptions {
            project_override: Some("forced-project".to_string()),
            alternate_project: Some("alt-project".to_string()),
            ..ResolveOptions::default()
        };
        let result = resolve(&repo.join("emptyfile.txt"), &options).unwrap();
        assert_eq!(result.project.as_deref(), Some("forced-project"));
        assert_eq!(result.branch, None);
    }

    #[test]
    fn alternate_project_does_not_override_detection() {
        let temp = tempfile::tempdir().unwrap();
        let repo = git_repo(temp.path(), "repo");

        let options = ResolveOptions {
            alternate_project: Some("alt-project".to_string()),
            ..ResolveOptions::default()
        };
        let result = resolve(&repo.join("emptyfile.txt"), &options).unwrap();
        assert_eq!(result.project.as_deref(), Some("repo"));
    }

    #[test]
    fn alternate_project_fills_in_when_nothing_detected() {
        let temp = tempfile::tempdir().unwrap();
        let entity = temp.path().join("emptyfile.txt");
        fs::write(&entity, "").unwrap();

        let options = ResolveOptions {
            alternate_project: Some("alt-project".to_string()),
            ..ResolveOptions::default()
        };
        let result = resolve(&entity, &options).unwrap();
        assert_eq!(result.project.as_deref(), Some("alt-project"));
        assert_eq!(result.branch, None);
    }

    #[test]
    fn nothing_detected_and_no_overrides() {
        let temp = tempfile::tempdir().unwrap();
        let entity = temp.path().join("emptyfile.txt");
        fs::write(&entity, "").unwrap();

        let result = resolve(&entity, &ResolveOptions::default()).unwrap();
        assert_eq!(result, ProjectResult::default());
    }

    #[test]
    fn map_rewrites_detected_project() {
        let temp = tempfile::tempdir().unwrap();
        let repo = git_repo(temp.path(), "project_map42");

        let options = ResolveOptions {
            project_map: vec![map_rule(r"^project_map(\d+)$", "proj-map{0}")],
            ..ResolveOptions::default()
        };
        let result = resolve(&repo.join("emptyfile.txt"), &options).unwrap();
        assert_eq!(result.project.as_deref(), Some("proj-map42"));
        // Branch is untouched by mapping.
        assert_eq!(result.branch.as_deref(), Some("master"));
    }

    #[test]
    fn map_never_applies_to_alternate_project() {
        let temp = tempfile::tempdir().unwrap();
        let entity = temp.path().join("emptyfile.txt");
        fs::write(&entity, "").unwrap();

        let options = ResolveOptions {
            alternate_project: Some("alt-project".to_string()),
            project_map: vec![map_rule("^alt-project$", "mapped")],
            ..ResolveOptions::default()
        };
        let result = resolve(&entity, &options).unwrap();
        assert_eq!(result.project.as_deref(), Some("alt-project"));
    }

    #[test]
    fn invalid_map_pattern_keeps_unmapped_name() {
        let temp = tempfile::tempdir().unwrap();
        let repo = git_repo(temp.path(), "project_map42");

        let options = ResolveOptions {
            project_map: vec![map_rule("invalid[({regex", "broken")],
            ..ResolveOptions::default()
        };
        let result = resolve(&repo.join("emptyfile.txt"), &options).unwrap();
        assert_eq!(result.project.as_deref(), Some("project_map42"));
    }

    #[test]
    fn out_of_range_group_errors_with_fallback() {
        let temp = tempfile::tempdir().unwrap();
        let repo = git_repo(temp.path(), "project_map42");

        let options = ResolveOptions {
            project_map: vec![map_rule(r"^project_map(\d+)$", "proj-map{3}")],
            ..ResolveOptions::default()
        };
        let err = resolve(&repo.join("emptyfile.txt"), &options).unwrap_err();
        assert_eq!(err.fallback.project.as_deref(), Some("project_map42"));
        assert_eq!(err.fallback.branch.as_deref(), Some("master"));
        assert!(matches!(
            err.source,
            ProjectMapError::GroupOutOfRange { .. }
        ));
    }

    #[test]
    fn resolution_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let repo = git_repo(temp.path(), "repo");
        let entity = repo.join("emptyfile.txt");

        let first = resolve(&entity, &ResolveOptions::default()).unwrap();
        let second = resolve(&entity, &ResolveOptions::default()).unwrap();
        assert_eq!(first, second);
    }
}
