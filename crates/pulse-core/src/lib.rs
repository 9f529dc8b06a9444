//! Core domain logic for the pulse agent.
//!
//! This crate contains the fundamental types and logic for:
//! - Heartbeat records: one file-activity event bound for the collector
//! - VCS probes: detecting project and branch from on-disk metadata
//! - Project resolution: overrides, probe ordering, and projectmap rewriting

pub mod heartbeat;
pub mod project;
pub mod project_map;
pub mod vcs;

pub use heartbeat::{Heartbeat, normalize_entity};
pub use project::{ProjectResult, ResolveError, ResolveOptions, resolve};
pub use project_map::{ProjectMapError, ProjectMapRule};
pub use vcs::{Detection, Probe, SubmodulePolicy};
