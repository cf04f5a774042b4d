//! GitHub adapter error types.
//!
//! [`GithubError`] is returned by every remote operation. Failures of a bulk
//! mutation are never flattened into a string: [`BulkMutationError`] keeps one
//! [`MutationFailure`] per identifier so callers can tell exactly which
//! identifiers failed and why.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tidy::{NodeId, ValidationError};

use crate::dispatch::MutationKind;

/// Errors produced by the GitHub adapter.
#[derive(Debug, Error)]
pub enum GithubError {
    /// Arguments were rejected before any request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The session could not be configured (missing token, bad endpoint).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("request to GitHub failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote answered with a non-success status that was not a quota
    /// signal.
    #[error("GitHub API error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    /// A rate-limit header was present but could not be interpreted.
    #[error("unable to parse '{header}' header: '{value}'")]
    RateLimitHeader { header: &'static str, value: String },

    /// The quota stayed exhausted across every permitted wait.
    #[error("GitHub API usage limits still exceeded after {waits} waits")]
    RateLimitExhausted {
        waits: u32,
        reset: Option<DateTime<Utc>>,
    },

    /// The remote asked for a pause longer than the configured ceiling.
    #[error("GitHub API usage limits reset in {wait:?}, longer than the allowed {limit:?}")]
    RateLimitWaitTooLong { wait: Duration, limit: Duration },

    /// The GraphQL response carried an `errors` array.
    #[error("GraphQL error: {}", .messages.join("; "))]
    GraphQl { messages: Vec<String> },

    /// The GraphQL response carried neither `data` nor `errors`.
    #[error("GraphQL response carried no data")]
    MissingData,

    /// The repository does not exist or the token cannot see it.
    #[error("could not resolve to a repository: {0}")]
    RepositoryNotFound(String),

    /// A page claimed more results but gave no cursor to continue from.
    #[error("page reported more results but no end cursor")]
    MissingCursor,

    /// A node lacked a field every node must have.
    #[error("response node is missing '{0}'")]
    InvalidNode(&'static str),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The session's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A mutation task panicked or was aborted by the runtime.
    #[error("mutation task failed: {0}")]
    TaskFailed(String),

    #[error(transparent)]
    BulkMutation(#[from] BulkMutationError),
}

impl GithubError {
    pub fn configuration(message: impl Into<String>) -> Self {
        GithubError::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this error, or any failure inside a bulk mutation,
    /// was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            GithubError::Cancelled => true,
            GithubError::BulkMutation(bulk) => bulk.is_cancelled(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Bulk mutation aggregation
// ---------------------------------------------------------------------------

/// One identifier whose mutation failed.
#[derive(Debug, Error)]
#[error("unable to {} {}: {id}. error: {cause}", .kind.verb(), .kind.noun())]
pub struct MutationFailure {
    pub kind: MutationKind,
    pub id: NodeId,
    pub cause: GithubError,
}

/// Every failure from one bulk dispatch.
///
/// Renders one line per failure. The order of failures follows submission
/// order, but callers must not rely on it.
#[derive(Debug)]
pub struct BulkMutationError {
    kind: MutationKind,
    attempted: usize,
    failures: Vec<MutationFailure>,
}

impl BulkMutationError {
    pub(crate) fn new(kind: MutationKind, attempted: usize, failures: Vec<MutationFailure>) -> Self {
        Self {
            kind,
            attempted,
            failures,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Number of identifiers submitted to the dispatch.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Number of identifiers that failed.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[MutationFailure] {
        &self.failures
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.failures.iter().map(|f| &f.id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.failures.iter().any(|f| f.cause.is_cancelled())
    }

    pub fn into_failures(self) -> Vec<MutationFailure> {
        self.failures
    }
}

impl fmt::Display for BulkMutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BulkMutationError {}
