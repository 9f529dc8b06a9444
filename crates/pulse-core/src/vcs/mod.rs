//! Version-control probes.
//!
//! Each probe answers "is this path inside a project I understand, and if so
//! what is its name and branch?". Probes never fail: unreadable metadata is
//! the same as no metadata, so a broken checkout cannot abort the chain.

mod git;
mod marker;
mod mercurial;
mod subversion;

pub use git::SubmodulePolicy;

use std::path::Path;

/// A successful probe hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Project name, absent when the probe has no name for it.
    pub project: Option<String>,
    /// Branch name, absent when the backend has no branch concept or the
    /// repository is in a detached state.
    pub branch: Option<String>,
}

/// The closed set of supported detectors.
///
/// The set is small and fixed, so this is a sum type rather than an open
/// plugin interface. Order in [`Probe::CHAIN`] is the priority order: the
/// explicit marker file beats every VCS, git beats mercurial, and
/// subversion is only reached when git found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Marker,
    Git,
    Mercurial,
    Subversion,
}

impl Probe {
    /// Priority order for the probe chain.
    pub const CHAIN: [Self; 4] = [Self::Marker, Self::Git, Self::Mercurial, Self::Subversion];

    /// Runs a single probe against an entity path.
    pub fn run(self, entity: &Path, policy: &SubmodulePolicy) -> Option<Detection> {
        match self {
            Self::Marker => marker::detect(entity),
            Self::Git => git::detect(entity, policy),
            Self::Mercurial => mercurial::detect(entity),
            Self::Subversion => subversion::detect(entity),
        }
    }
}

/// Runs the probe chain and returns the first hit.
pub fn detect(entity: &Path, policy: &SubmodulePolicy) -> Option<Detection> {
    Probe::CHAIN
        .into_iter()
        .find_map(|probe| probe.run(entity, policy))
}

/// Basename of a directory as a project name.
fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn nothing_detected_outside_any_project() {
        let temp = tempfile::tempdir().unwrap();
        let entity = temp.path().join("emptyfile.txt");
        fs::write(&entity, "").unwrap();

        // No marker, .git, or .hg anywhere in the tempdir ancestry; the svn
        // probe fails to parse or to spawn. Either way: no hit.
        let found = detect(&entity, &SubmodulePolicy::default());
        assert_eq!(found, None);
    }

    #[test]
    fn marker_beats_git() {
        let temp = tempfile::tempdir().unwrap();
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(repo.join(".git").join("HEAD"), "ref: refs/heads/master\n").unwrap();
        fs::write(repo.join(".pulse-project"), "marked-project\n").unwrap();
        let entity = repo.join("emptyfile.txt");
        fs::write(&entity, "").unwrap();

        let found = detect(&entity, &SubmodulePolicy::default()).unwrap();
        assert_eq!(found.project.as_deref(), Some("marked-project"));
        assert_eq!(found.branch, None);
    }

    #[test]
    fn git_beats_mercurial() {
        let temp = tempfile::tempdir().unwrap();
        let repo = temp.path().join("both");
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(repo.join(".git").join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::create_dir_all(repo.join(".hg")).unwrap();
        let entity = repo.join("emptyfile.txt");
        fs::write(&entity, "").unwrap();

        let found = detect(&entity, &SubmodulePolicy::default()).unwrap();
        assert_eq!(found.project.as_deref(), Some("both"));
        assert_eq!(found.branch.as_deref(), Some("main"));
    }
}
