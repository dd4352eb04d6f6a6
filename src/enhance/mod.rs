//! Optional external schema enhancement.
//!
//! An [`Enhancer`] proposes a replacement for the deterministic baseline
//! schema. Every call runs on a worker thread and is abandoned after
//! [`EnhanceConfig::timeout`]; the orchestrator treats any failure as a
//! reason to keep the baseline.

/// `OpenAI` chat-completions enhancer.
#[cfg(feature = "openai")]
pub mod openai;

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Default per-attempt time budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What an enhancer is given to work from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementRequest {
    /// Realm name.
    pub realm: String,
    /// The deterministic baseline schema text.
    pub baseline: String,
    /// Plain-text summary of the realm's roles, composites and groups.
    pub summary: String,
}

/// Why an enhancement attempt produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnhanceError {
    /// The service could not be reached or answered with an error status.
    #[error("enhancement request failed: {0}")]
    Transport(String),

    /// The service answered, but not with a usable schema text.
    #[error("enhancement service returned an unusable reply: {0}")]
    InvalidResponse(String),

    /// No reply within the configured budget.
    #[error("enhancement timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The worker stopped without replying (it panicked).
    #[error("enhancement worker stopped without replying")]
    Disconnected,
}

/// An external producer of alternative schemas.
pub trait Enhancer: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Propose a schema for `request`. May block; the caller bounds the wait.
    fn enhance(&self, request: &EnhancementRequest) -> Result<String, EnhanceError>;
}

/// Time budget and retry policy for enhancement calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhanceConfig {
    timeout: Duration,
    max_retries: u32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
        }
    }
}

impl EnhanceConfig {
    /// Set the per-attempt time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many times a failed attempt is retried; at most once.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.min(1);
        self
    }

    /// Per-attempt time budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retries after a failed attempt (0 or 1).
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Ask `enhancer` for a candidate, retrying per `config`.
///
/// Returns the last error when every attempt fails.
pub fn request_candidate(
    enhancer: &Arc<dyn Enhancer>,
    request: &Arc<EnhancementRequest>,
    config: &EnhanceConfig,
) -> Result<String, EnhanceError> {
    let attempts = 1 + config.max_retries();
    let mut attempt = 1;
    loop {
        match call_with_timeout(enhancer, request, config.timeout()) {
            Ok(candidate) => return Ok(candidate),
            Err(err) if attempt < attempts => {
                debug!(
                    "enhancer '{}' attempt {attempt} failed ({err}); retrying",
                    enhancer.name()
                );
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn call_with_timeout(
    enhancer: &Arc<dyn Enhancer>,
    request: &Arc<EnhancementRequest>,
    timeout: Duration,
) -> Result<String, EnhanceError> {
    let (tx, rx) = mpsc::channel();
    let worker_enhancer = Arc::clone(enhancer);
    let worker_request = Arc::clone(request);

    // A timed-out worker is left to finish on its own; its reply is discarded.
    thread::Builder::new()
        .name("kc2spicedb-enhance".to_string())
        .spawn(move || {
            let _ = tx.send(worker_enhancer.enhance(&worker_request));
        })
        .map_err(|e| EnhanceError::Transport(format!("could not start enhancement worker: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(reply) => reply,
        Err(RecvTimeoutError::Timeout) => Err(EnhanceError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(EnhanceError::Disconnected),
    }
}

/// Trim a reply and drop a surrounding Markdown code fence, if any.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Skip the info string (` ```zed `).
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}
