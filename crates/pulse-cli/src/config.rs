//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use regex::Regex;
use serde::{Deserialize, Serialize};

use pulse_core::{ProjectMapRule, SubmodulePolicy};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Collector endpoint heartbeats are POSTed to.
    pub api_url: String,
    /// API key sent with each request.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Path to the offline queue store.
    pub queue_path: PathBuf,
    /// Retention cap for the offline queue; 0 means unbounded.
    pub queue_max_entries: usize,
    /// Git submodule handling.
    pub submodules_disabled: SubmodulesDisabled,
    /// Ordered projectmap rewrite rules.
    pub projectmap: Vec<ProjectMapEntry>,
}

/// Submodule configuration: a global switch or a pattern list matched
/// against the submodule's path relative to the outer repository.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmodulesDisabled {
    All(bool),
    Patterns(Vec<String>),
}

/// One projectmap rule as written in the config file. Rules are kept in
/// file order and duplicate patterns are allowed.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProjectMapEntry {
    pub pattern: String,
    pub replacement: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("queue_path", &self.queue_path)
            .field("queue_max_entries", &self.queue_max_entries)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            api_url: "https://api.pulse.dev/v1/heartbeats".to_string(),
            api_key: None,
            timeout_secs: 30,
            queue_path: data_dir.join("queue.db"),
            queue_max_entries: 1000,
            submodules_disabled: SubmodulesDisabled::All(false),
            projectmap: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (PULSE_*)
        figment = figment.merge(Env::prefixed("PULSE_"));

        figment.extract()
    }

    /// Compiles the submodule configuration into a probe policy.
    ///
    /// Unparseable patterns are logged and skipped so one bad entry does
    /// not flip the policy for every submodule.
    pub fn submodule_policy(&self) -> SubmodulePolicy {
        match &self.submodules_disabled {
            SubmodulesDisabled::All(false) => SubmodulePolicy::Enabled,
            SubmodulesDisabled::All(true) => SubmodulePolicy::Disabled,
            SubmodulesDisabled::Patterns(patterns) => {
                let compiled = patterns
                    .iter()
                    .filter_map(|pattern| match Regex::new(pattern) {
                        Ok(regex) => Some(regex),
                        Err(err) => {
                            tracing::warn!(
                                "Regex error ({err}) for submodules pattern: {pattern}"
                            );
                            None
                        }
                    })
                    .collect();
                SubmodulePolicy::DisabledForPatterns(compiled)
            }
        }
    }

    /// Projectmap rules in file order.
    pub fn project_map(&self) -> Vec<ProjectMapRule> {
        self.projectmap
            .iter()
            .map(|entry| ProjectMapRule {
                pattern: entry.pattern.clone(),
                replacement: entry.replacement.clone(),
            })
            .collect()
    }
}

/// Returns the platform-specific config directory for pulse.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pulse"))
}

/// Returns the platform-specific data directory for pulse.
///
/// On Linux: `~/.local/share/pulse`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("pulse"))
}
