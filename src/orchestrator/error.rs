//! Error taxonomy for the orchestration core.
//!
//! Errors fall into two families with different blast radius:
//!
//! - [`StartupError`] is fatal to an [`Orchestrator`](super::Orchestrator) instance. It moves the
//!   readiness gate to its failed state and is shared (behind an `Arc`) with every
//!   request queued or arriving afterwards.
//! - [`RequestError`] is local to one HTTP request and never touches readiness.

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T, E = RequestError> = std::result::Result<T, E>;

/// Fatal errors raised while bringing the backends up.
#[derive(Error, Debug)]
pub enum StartupError {
    /// The framework packager could not be launched at all.
    #[error("failed to spawn framework packager `{command}`: {source}")]
    Spawn {
        /// Program that was executed
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The packager process was launched but exited before its port opened.
    #[error("framework packager exited before accepting connections ({status})")]
    PackagerExited {
        /// Exit status as reported by the OS
        status: String,
    },

    /// The packager port never became reachable within the retry policy.
    #[error("framework packager at {addr} not reachable after {attempts} attempts")]
    ReadinessTimeout {
        /// `host:port` that was polled
        addr: String,
        /// Number of probes performed
        attempts: u32,
    },

    /// A required backend is missing or the configuration is inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The module bundler failed to come up or stopped before its first build.
    #[error("module bundler error: {0}")]
    Bundler(String),

    /// The orchestrator's own listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// `host:port` requested
        addr: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// `start()` was called after `stop()`.
    #[error("orchestrator already stopped")]
    Stopped,

    /// Scratch entry files could not be written.
    #[error("failed to write scratch entry files: {0}")]
    Scratch(#[from] std::io::Error),
}

/// Per-request errors surfaced at the HTTP boundary.
#[derive(Error, Debug)]
pub enum RequestError {
    /// An upstream fetch answered with a non-200 status.
    #[error("backend {url} responded with status {status}: {body}")]
    Backend {
        /// URL that was fetched
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body, kept as diagnostic text
        body: String,
    },

    /// The upstream fetch failed below HTTP (connection refused, reset, ...).
    #[error("failed to fetch {url}: {source}")]
    Transport {
        /// URL that was fetched
        url: String,
        /// Transport-level error
        #[source]
        source: reqwest::Error,
    },

    /// One of the source maps handed to the merger is invalid.
    #[error(transparent)]
    MalformedSourceMap(#[from] MalformedSourceMap),

    /// The request names a platform this orchestrator does not serve.
    #[error("unknown platform: {0:?}")]
    UnknownPlatform(String),

    /// The readiness gate failed or was stopped.
    #[error("bundle server is not available: {0}")]
    NotReady(#[from] GateError),
}

/// Source map input could not be decoded. No partial recovery is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed source map: {0}")]
pub struct MalformedSourceMap(pub String);

/// Why a waiter was turned away by the readiness gate.
#[derive(Error, Debug, Clone)]
pub enum GateError {
    /// Startup failed; every waiter sees the same captured error.
    #[error("{0}")]
    Failed(Arc<StartupError>),

    /// The orchestrator was stopped.
    #[error("orchestrator stopped")]
    Stopped,
}
