//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

/// Developer-activity heartbeat agent.
///
/// Resolves the project and branch for a file event, delivers a heartbeat
/// to the collector, and queues it locally when delivery fails. Runs once
/// per event and exits.
#[derive(Debug, Parser)]
#[command(name = "pulse", version, about, long_about = None)]
pub struct Cli {
    /// Path to the file that was touched.
    #[arg(long, visible_alias = "file")]
    pub entity: PathBuf,

    /// Event timestamp as floating-point unix epoch seconds. Defaults to now.
    #[arg(long)]
    pub time: Option<f64>,

    /// Mark this event as a file write.
    #[arg(long)]
    pub write: bool,

    /// Force this project name, overriding detection.
    #[arg(long)]
    pub project: Option<String>,

    /// Project name used only when detection finds nothing.
    #[arg(long)]
    pub alternate_project: Option<String>,

    /// Language tag reported by the editor plugin.
    #[arg(long)]
    pub language: Option<String>,

    /// Total lines in the file, reported by the editor plugin.
    #[arg(long)]
    pub lines: Option<u64>,

    /// Dependency reported by the editor plugin (repeatable).
    #[arg(long = "dependency")]
    pub dependencies: Vec<String>,

    /// Originating editor plugin, appended to the user agent.
    #[arg(long)]
    pub plugin: Option<String>,

    /// API key, overriding the configured one.
    #[arg(long)]
    pub key: Option<String>,

    /// Path to config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}
