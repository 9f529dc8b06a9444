//! Git project and branch detection.
//!
//! Handles plain repositories, worktrees, and submodules. Worktrees and
//! submodules both surface as a `.git` pointer file whose `gitdir:` line
//! names the real metadata directory; submodules additionally live under the
//! outer repository's `.git/modules/` tree, which is what the submodule
//! policy keys off.

use std::fs;
use std::path::{Component, Path, PathBuf};

use regex::Regex;

use super::{Detection, dir_name};

/// How submodules are reported.
///
/// When a submodule is excluded, the outer repository's name and branch are
/// used instead of the submodule's own.
#[derive(Debug, Clone, Default)]
pub enum SubmodulePolicy {
    /// Submodules are reported as their own projects.
    #[default]
    Enabled,
    /// Submodules are never reported; the outer repository wins.
    Disabled,
    /// Submodules whose path (relative to the outer repository root) matches
    /// any pattern are excluded.
    DisabledForPatterns(Vec<Regex>),
}

impl SubmodulePolicy {
    fn allows(&self, submodule_path: &Path) -> bool {
        match self {
            Self::Enabled => true,
            Self::Disabled => false,
            Self::DisabledForPatterns(patterns) => {
                let text = submodule_path.to_string_lossy();
                !patterns.iter().any(|pattern| pattern.is_match(&text))
            }
        }
    }
}

pub(super) fn detect(entity: &Path, policy: &SubmodulePolicy) -> Option<Detection> {
    let start = entity.parent()?;
    let (root, git_entry) = find_repo(start)?;

    if git_entry.is_dir() {
        return Some(Detection {
            project: dir_name(&root),
            branch: read_branch(&git_entry),
        });
    }

    // Pointer file: worktree or submodule. An unreadable pointer still
    // yields the project name from the directory.
    let Some(git_dir) = resolve_git_dir(&root, &git_entry) else {
        return Some(Detection {
            project: dir_name(&root),
            branch: None,
        });
    };

    if is_submodule_git_dir(&git_dir) {
        if let Some((outer_root, outer_entry)) = root.parent().and_then(find_repo) {
            let relative = root.strip_prefix(&outer_root).unwrap_or(&root);
            if !policy.allows(relative) {
                let outer_dir = resolve_git_dir(&outer_root, &outer_entry)?;
                return Some(Detection {
                    project: dir_name(&outer_root),
                    branch: read_branch(&outer_dir),
                });
            }
        }
    }

    Some(Detection {
        project: dir_name(&root),
        branch: read_branch(&git_dir),
    })
}

/// Walks upward looking for a `.git` entry (directory or pointer file).
fn find_repo(start: &Path) -> Option<(PathBuf, PathBuf)> {
    start.ancestors().find_map(|dir| {
        let candidate = dir.join(".git");
        candidate
            .exists()
            .then(|| (dir.to_path_buf(), candidate))
    })
}

/// Resolves a `.git` entry to the metadata directory holding `HEAD`.
///
/// For a `.git` directory this is the directory itself; for a pointer file
/// the `gitdir:` line is followed, relative paths resolved against the
/// repository root.
fn resolve_git_dir(root: &Path, git_entry: &Path) -> Option<PathBuf> {
    if git_entry.is_dir() {
        return Some(git_entry.to_path_buf());
    }
    let contents = fs::read_to_string(git_entry).ok()?;
    let target = contents
        .lines()
        .find_map(|line| line.strip_prefix("gitdir:"))?
        .trim();
    if target.is_empty() {
        return None;
    }
    let path = Path::new(target);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    Some(resolved.canonicalize().unwrap_or(resolved))
}

/// Whether a resolved metadata directory belongs to a submodule, i.e. lives
/// under the outer repository's `.git/modules/` tree.
fn is_submodule_git_dir(git_dir: &Path) -> bool {
    let mut previous_was_git = false;
    for component in git_dir.components() {
        if let Component::Normal(name) = component {
            if previous_was_git && name == "modules" {
                return true;
            }
            previous_was_git = name == ".git";
        } else {
            previous_was_git = false;
        }
    }
    false
}

/// Reads the current branch from `HEAD`.
///
/// A symbolic ref under `refs/heads/` yields the branch name; a raw commit
/// hash (detached HEAD), a ref in another namespace, or an unreadable file
/// yields no branch at all.
fn read_branch(git_dir: &Path) -> Option<String> {
    let head = fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let line = head.lines().next()?.trim();
    let target = line.strip_prefix("ref:")?.trim();
    let branch = target.strip_prefix("refs/heads/")?;
    if branch.is_empty() {
        None
    } else {
        Some(branch.to_string())
    }
}
