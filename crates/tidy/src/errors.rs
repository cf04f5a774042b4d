//! Validation and configuration errors shared by every crate.
//!
//! [`ValidationError`] covers argument problems detected before any network
//! access. Remote failures (HTTP, GraphQL, rate limiting, bulk mutation
//! aggregation) are defined in the `github` crate.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Arguments rejected before any remote call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("an owner must be specified")]
    MissingOwner,

    #[error("a repo must be specified")]
    MissingRepository,

    /// The argument was not of the form `owner/repository`.
    #[error("invalid repository '{0}': expected <owner>/<repository>")]
    InvalidRepository(String),

    /// A bulk mutation was requested with an empty identifier list.
    #[error("no {0} have been specified")]
    NoIdentifiers(&'static str),

    /// A pull request state token outside `OPEN`, `CLOSED`, `MERGED`.
    #[error("unsupported pull request state '{0}': expected OPEN, CLOSED or MERGED")]
    UnknownPullRequestState(String),

    #[error("the worker count must be at least 1")]
    ZeroWorkerCount,
}

// ---------------------------------------------------------------------------
// Top-level errors
// ---------------------------------------------------------------------------

/// Errors raised while setting up a run, before the remote is contacted.
#[derive(Debug, Error)]
pub enum TidyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The runtime configuration is invalid or incomplete.
    ///
    /// Produced at start-up; nothing is fetched with an invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An exclusion pattern failed to compile.
    #[error("invalid exclusion pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl TidyError {
    pub fn configuration(message: impl Into<String>) -> Self {
        TidyError::Configuration {
            message: message.into(),
        }
    }
}
