//! Port trait for the hosted repository.
//!
//! The `github` crate implements [`RemoteRepository`] over GraphQL. Command
//! handlers depend only on this trait, so they can be exercised against an
//! in-memory implementation.

use async_trait::async_trait;

use crate::{NodeId, OwnerName, PullRequest, PullRequestState, Ref, RefType, RepositoryName};

/// Read and bulk-write access to one hosting service.
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Error produced by every operation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists every ref under `ref_type`'s namespace, in server order.
    async fn list_refs(
        &self,
        owner: &OwnerName,
        repository: &RepositoryName,
        ref_type: RefType,
    ) -> Result<Vec<Ref>, Self::Error>;

    /// Lists every pull request in one of `states`. An empty slice means
    /// every state.
    async fn list_pull_requests(
        &self,
        owner: &OwnerName,
        repository: &RepositoryName,
        states: &[PullRequestState],
    ) -> Result<Vec<PullRequest>, Self::Error>;

    /// Deletes every ref in `ids`. All deletions are attempted; the error
    /// describes every one that failed.
    async fn delete_refs(&self, ids: &[NodeId]) -> Result<(), Self::Error>;

    /// Closes every pull request in `ids`, with the same failure semantics as
    /// [`RemoteRepository::delete_refs`].
    async fn close_pull_requests(&self, ids: &[NodeId]) -> Result<(), Self::Error>;
}
