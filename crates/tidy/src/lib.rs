//! Core domain for gh-tidy.
//!
//! This crate contains every domain concept used to find stale branches, tags
//! and pull requests: newtype identifiers, the fetched value types, the
//! staleness rules, and the port trait the infrastructure implements.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `github` crate defines *how* to fetch and
//! mutate it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`NodeId`, `RefName`, `RepositorySlug`, etc.) |
//! | [`types`] | Fetched value types (`Ref`, `PullRequest`, `Timestamp`, etc.) |
//! | [`staleness`] | Threshold and exclusion-pattern selection |
//! | [`ports`] | The [`RemoteRepository`] trait |
//! | [`errors`] | Validation and configuration errors |

pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod staleness;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{TidyError, ValidationError};
pub use identifiers::{
    NodeId, OwnerName, PullRequestNumber, RefName, RepositoryName, RepositorySlug,
};
pub use ports::RemoteRepository;
pub use staleness::{is_stale, StalenessFilter};
pub use types::{PullRequest, PullRequestState, Ref, RefType, Timestamp};
