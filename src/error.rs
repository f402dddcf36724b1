//! Unified error types for the edge agent.
//!
//! One enum per boundary: hardware, backend client, configuration, and the
//! fatal class that the orchestrator escalates to a non-zero exit.  Hardware
//! and client errors are per-channel / per-cycle and never terminate a loop;
//! only [`FatalError`] is terminal.

use thiserror::Error;

use crate::channel::Direction;

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Failures surfaced by a [`HardwareInterface`](crate::app::ports::HardwareInterface).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    /// `read`/`write` called before `connect` or after `disconnect`.
    #[error("hardware not connected")]
    NotConnected,

    /// The device link could not be established.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("channel '{channel}' is not an {expected} channel")]
    WrongDirection { channel: String, expected: Direction },

    #[error("read of '{channel}' failed: {reason}")]
    ReadFailed { channel: String, reason: String },

    #[error("write to '{channel}' failed: {reason}")]
    WriteFailed { channel: String, reason: String },

    #[error("device timeout on '{channel}'")]
    Timeout { channel: String },

    /// Commanded value is outside the channel's configured bounds.
    #[error("value {value} out of range for '{channel}'")]
    OutOfRange { channel: String, value: f64 },
}

// ---------------------------------------------------------------------------
// Backend client errors
// ---------------------------------------------------------------------------

/// Final outcome of a failed [`ResilientClient`](crate::client::ResilientClient)
/// call.  Transient failures and 401s are absorbed inside the client; callers
/// only ever see one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// Transient failures persisted through every allowed retry.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The per-call deadline elapsed before the call resolved.
    #[error("deadline exceeded after {attempts} attempts")]
    DeadlineExceeded { attempts: u32 },

    /// Credential exchange failed; not retried.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The request was still rejected with 401 after a fresh token.
    #[error("unauthorized after re-authentication")]
    Unauthorized,

    /// Non-retryable 4xx.
    #[error("request rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Transport-layer failure of a single attempt (no HTTP status available).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field failed range or consistency validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

/// Conditions that stop the whole agent with a non-zero exit status.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("hardware unavailable at startup: {0}")]
    HardwareConnect(#[source] HardwareError),

    #[error("http client setup failed: {0}")]
    ClientSetup(String),

    /// A supervised task failed or exited before shutdown was requested.
    #[error("task '{task}' failed: {reason}")]
    TaskFailed { task: &'static str, reason: String },
}
