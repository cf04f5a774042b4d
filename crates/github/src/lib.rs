//! gh-tidy GitHub infrastructure adapter.
//!
//! Implements the [`tidy::RemoteRepository`] port over the GitHub GraphQL v4
//! API.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules such as
//! staleness. Every GitHub API detail (rate limiting, pagination,
//! authentication, mutation fan-out) is handled here; the [`tidy`] crate
//! never sees them.
//!
//! ## Layers
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`transport`] | One JSON `POST`; `reqwest` in production |
//! | [`rate_limit`] | Absorbs quota exhaustion with bounded, cancellable waits |
//! | [`graphql`] | `{query, variables}` envelope and `errors` handling |
//! | [`queries`] | Cursor pagination for refs and pull requests |
//! | [`dispatch`] | Semaphore-bounded bulk mutations with typed failures |
//! | [`session`] | Token, configuration and the port implementation |

pub mod dispatch;
pub mod error;
pub mod graphql;
pub mod queries;
pub mod rate_limit;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use dispatch::{BulkMutationDispatcher, MutationKind};
pub use error::{BulkMutationError, GithubError, MutationFailure};
pub use graphql::{endpoint_for, GraphQlClient, DEFAULT_ENDPOINT};
pub use queries::{parse_states, PagedQueryClient, PAGE_SIZE};
pub use rate_limit::{RateLimitConfig, RateLimitStatus, RateLimitedTransport};
pub use session::{AccessToken, Session, SessionConfig, DEFAULT_WORKER_COUNT, TOKEN_ENV_VAR};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
