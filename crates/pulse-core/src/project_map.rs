//! Projectmap rewriting: user-configured regex rules applied to detected
//! project names.
//!
//! Rules are evaluated in configuration-file order and the first matching
//! pattern wins, so duplicate patterns are permitted and simply shadow the
//! later ones. Replacement templates reference capture groups by zero-based
//! index: `proj-map{0}` substitutes the first group.

use regex::Regex;
use thiserror::Error;

/// A single pattern/replacement pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMapRule {
    pub pattern: String,
    pub replacement: String,
}

/// Projectmap configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectMapError {
    /// The pattern does not compile. Recoverable: the rule is skipped.
    #[error("Regex error ({detail}) for projectmap pattern: {pattern}")]
    InvalidPattern { pattern: String, detail: String },
    /// The replacement template names a capture group the match does not
    /// have. Not recoverable: the event cannot be tagged as configured.
    #[error("Regex error (replacement group {group} out of range) for projectmap pattern: {pattern}")]
    GroupOutOfRange { pattern: String, group: String },
}

/// Applies the first matching rule to `project`.
///
/// Returns `Ok(None)` when no rule matches. Invalid patterns are logged as
/// warnings and skipped so one bad rule cannot disable the rest of the map.
pub fn apply(rules: &[ProjectMapRule], project: &str) -> Result<Option<String>, ProjectMapError> {
    for rule in rules {
        let regex = match Regex::new(&rule.pattern) {
            Ok(regex) => regex,
            Err(err) => {
                let error = ProjectMapError::InvalidPattern {
                    pattern: rule.pattern.clone(),
                    detail: err.to_string(),
                };
                tracing::warn!("{error}");
                continue;
            }
        };
        let Some(captures) = regex.captures(project) else {
            continue;
        };
        return expand(&captures, &rule.replacement, &rule.pattern).map(Some);
    }
    Ok(None)
}

/// Substitutes `{N}` references in a replacement template with the matched
/// capture groups.
///
/// Group indices are validated against the match up front rather than left
/// to panic, so an out-of-range reference surfaces as its own error class.
fn expand(
    captures: &regex::Captures<'_>,
    template: &str,
    pattern: &str,
) -> Result<String, ProjectMapError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if !after[..close].is_empty() && after[..close].bytes().all(|b| b.is_ascii_digit()) => {
                let index_text = &after[..close];
                let group = index_text
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| captures.get(index + 1));
                match group {
                    Some(found) => out.push_str(found.as_str()),
                    None => {
                        return Err(ProjectMapError::GroupOutOfRange {
                            pattern: pattern.to_string(),
                            group: index_text.to_string(),
                        });
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                // Not a group reference; keep the brace literally.
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}
