//! Heartbeat dispatch: resolve the project, attempt delivery, queue on
//! failure, and drain the offline queue after a success.
//!
//! The dispatcher never blocks the caller on retries: a failed send parks
//! the heartbeat in the queue and the invocation ends. Draining only starts
//! once the current event has been delivered, so a dead collector is probed
//! exactly once per invocation.
//!
//! The queue is opened only after the send outcome is known. Delivery must
//! not depend on the local store being healthy, and the queue's exclusive
//! lock must never be held across a network call.

use std::time::Duration;

use chrono::Utc;

use pulse_api::{Outcome, SessionCache};
use pulse_core::{Heartbeat, ResolveOptions, normalize_entity, resolve};
use pulse_queue::Queue;

use crate::{Cli, Config};

/// Exit code for a delivered heartbeat.
pub const SUCCESS: u8 = 0;
/// Exit code when delivery failed (the event was queued) or the event could
/// not be tagged as configured.
pub const API_ERROR: u8 = 102;
/// Exit code for unloadable configuration.
pub const CONFIG_ERROR: u8 = 103;

/// Runs one heartbeat through resolve/send/queue/drain and returns the
/// process exit code. Nothing is written to stdout; failures are reported
/// through tracing and the exit code only.
pub fn run(args: &Cli, config: &Config) -> u8 {
    let entity = normalize_entity(&args.entity);

    let options = ResolveOptions {
        project_override: args.project.clone(),
        alternate_project: args.alternate_project.clone(),
        submodule_policy: config.submodule_policy(),
        project_map: config.project_map(),
    };

    let (resolved, resolve_code) = match resolve(&entity, &options) {
        Ok(result) => (result, SUCCESS),
        // The heartbeat keeps its unmapped name and still ships, but the
        // run reports the broken mapping.
        Err(err) => (err.fallback.clone(), API_ERROR),
    };
    tracing::debug!(?resolved, "resolved project");

    let heartbeat = Heartbeat {
        entity: entity.to_string_lossy().into_owned(),
        entity_type: "file".to_string(),
        time: args.time.unwrap_or_else(now),
        is_write: args.write,
        project: resolved.project,
        branch: resolved.branch,
        language: args.language.clone(),
        lines: args.lines,
        dependencies: args.dependencies.clone(),
        user_agent: user_agent(args.plugin.as_deref()),
    };

    let mut cache = SessionCache::with_timeout(
        config.api_key.clone(),
        Duration::from_secs(config.timeout_secs),
    );
    let destination = pulse_api::destination(&config.api_url);

    match attempt_send(&mut cache, &destination, &config.api_url, &heartbeat) {
        SendAttempt::Delivered => {
            tracing::debug!("heartbeat delivered");
            // An unavailable store only costs the drain; the event itself
            // is already safe.
            match Queue::open(&config.queue_path, config.queue_max_entries) {
                Ok(mut queue) => drain(&mut queue, &mut cache, &destination, &config.api_url),
                Err(err) => tracing::warn!("failed to open offline queue: {err}"),
            }
            resolve_code
        }
        SendAttempt::Failed => {
            match Queue::open(&config.queue_path, config.queue_max_entries) {
                Ok(mut queue) => {
                    if let Err(err) = queue.push(&heartbeat) {
                        tracing::error!("failed to queue heartbeat: {err}");
                    }
                }
                Err(err) => tracing::error!("failed to open offline queue: {err}"),
            }
            API_ERROR
        }
    }
}

enum SendAttempt {
    Delivered,
    Failed,
}

/// One delivery attempt through the session cache.
///
/// Transport failures other than plain timeouts invalidate the cached
/// session so the next attempt starts from fresh connection state; HTTP
/// error statuses are application outcomes and leave the session alone.
fn attempt_send(
    cache: &mut SessionCache,
    destination: &str,
    api_url: &str,
    heartbeat: &Heartbeat,
) -> SendAttempt {
    let session = match cache.get(destination) {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!("failed to build delivery session: {err}");
            return SendAttempt::Failed;
        }
    };
    match session.send(api_url, heartbeat) {
        Ok(Outcome::Accepted) => SendAttempt::Delivered,
        Ok(Outcome::Rejected { status }) => {
            tracing::warn!(status, "collector rejected heartbeat");
            SendAttempt::Failed
        }
        Err(err) => {
            tracing::warn!("delivery failed: {err}");
            if !err.is_timeout() {
                cache.invalidate(destination);
            }
            SendAttempt::Failed
        }
    }
}

/// Replays queued heartbeats oldest-first with the already-warm session.
///
/// Entries are only removed after the collector accepts them; the first
/// failure leaves the remainder queued for a later invocation.
fn drain(queue: &mut Queue, cache: &mut SessionCache, destination: &str, api_url: &str) {
    loop {
        let next = match queue.peek() {
            Ok(Some(queued)) => queued,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!("failed to read offline queue: {err}");
                break;
            }
        };
        match attempt_send(cache, destination, api_url, &next.heartbeat) {
            SendAttempt::Delivered => {
                if let Err(err) = queue.remove(next.seq) {
                    tracing::warn!("failed to remove drained heartbeat: {err}");
                    break;
                }
                tracing::debug!(seq = next.seq, "drained queued heartbeat");
            }
            SendAttempt::Failed => break,
        }
    }
}

fn now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn user_agent(plugin: Option<&str>) -> String {
    let base = format!(
        "pulse/{} ({}-{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    match plugin {
        Some(plugin) => format!("{base} {plugin}"),
        None => base,
    }
}
