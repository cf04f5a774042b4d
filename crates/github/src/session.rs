//! The authenticated entry point to the GitHub adapter.
//!
//! A [`Session`] owns one rate-limited transport, the query client and the
//! bulk dispatcher built on top of it. Every operation shares the session's
//! cancellation token.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tidy::{
    NodeId, OwnerName, PullRequest, PullRequestState, Ref, RefType, RemoteRepository,
    RepositoryName, ValidationError,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::dispatch::{send_mutation, BulkMutationDispatcher, MutationKind};
use crate::graphql::{endpoint_for, GraphQlClient};
use crate::queries::PagedQueryClient;
use crate::rate_limit::{RateLimitConfig, RateLimitedTransport};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::GithubError;

/// Environment variable holding the bearer token.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Mutations in flight per session unless configured otherwise.
pub const DEFAULT_WORKER_COUNT: usize = 20;

// ---------------------------------------------------------------------------
// AccessToken
// ---------------------------------------------------------------------------

/// A GitHub bearer token. Never printed.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    /// Reads the token from [`TOKEN_ENV_VAR`].
    pub fn from_env() -> Result<Self, GithubError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the token through `lookup`, which is handed [`TOKEN_ENV_VAR`].
    pub fn from_lookup(lookup: impl FnOnce(&str) -> Option<String>) -> Result<Self, GithubError> {
        lookup(TOKEN_ENV_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Self)
            .ok_or_else(|| {
                GithubError::configuration(format!(
                    "a {TOKEN_ENV_VAR} environment variable needs to be set"
                ))
            })
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    worker_count: usize,
    enterprise_endpoint: Option<String>,
    rate_limit: RateLimitConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            enterprise_endpoint: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Sets the mutation concurrency ceiling. Zero is rejected.
    pub fn with_worker_count(mut self, worker_count: usize) -> Result<Self, ValidationError> {
        if worker_count == 0 {
            return Err(ValidationError::ZeroWorkerCount);
        }
        self.worker_count = worker_count;
        Ok(self)
    }

    /// Targets a GitHub Enterprise API URL instead of github.com.
    pub fn with_enterprise_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.enterprise_endpoint = endpoint;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn enterprise_endpoint(&self) -> Option<&str> {
        self.enterprise_endpoint.as_deref()
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        self.rate_limit
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session<T = ReqwestTransport> {
    config: SessionConfig,
    graphql: Arc<GraphQlClient<T>>,
    queries: PagedQueryClient<T>,
    dispatcher: BulkMutationDispatcher,
}

impl Session<ReqwestTransport> {
    /// Builds a session authenticated with `GITHUB_TOKEN`.
    pub fn from_env(config: SessionConfig, cancel: CancellationToken) -> Result<Self, GithubError> {
        let token = AccessToken::from_env()?;
        let transport = ReqwestTransport::new(&token)?;
        Self::with_transport(config, transport, cancel)
    }
}

impl<T: HttpTransport + 'static> Session<T> {
    /// Builds a session over a caller-supplied transport.
    pub fn with_transport(
        config: SessionConfig,
        transport: T,
        cancel: CancellationToken,
    ) -> Result<Self, GithubError> {
        let endpoint = endpoint_for(config.enterprise_endpoint())?;
        let dispatcher = BulkMutationDispatcher::new(config.worker_count, cancel.clone())?;
        let graphql = Arc::new(GraphQlClient::new(
            RateLimitedTransport::new(transport, config.rate_limit, cancel),
            endpoint,
        ));
        info!(endpoint = graphql.endpoint(), workers = config.worker_count, "GitHub session ready");

        Ok(Self {
            queries: PagedQueryClient::new(Arc::clone(&graphql)),
            graphql,
            dispatcher,
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        self.graphql.endpoint()
    }

    #[instrument(skip(self))]
    pub async fn list_refs(
        &self,
        owner: &str,
        repository: &str,
        ref_type: RefType,
    ) -> Result<Vec<Ref>, GithubError> {
        let refs = self.queries.list_refs(owner, repository, ref_type).await?;
        info!(count = refs.len(), "listed refs");
        Ok(refs)
    }

    #[instrument(skip(self))]
    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repository: &str,
        states: &[PullRequestState],
    ) -> Result<Vec<PullRequest>, GithubError> {
        let prs = self
            .queries
            .list_pull_requests(owner, repository, states)
            .await?;
        info!(count = prs.len(), "listed pull requests");
        Ok(prs)
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    pub async fn delete_refs(&self, ids: &[NodeId]) -> Result<(), GithubError> {
        self.mutate_all(MutationKind::DeleteRef, ids).await
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    pub async fn close_pull_requests(&self, ids: &[NodeId]) -> Result<(), GithubError> {
        self.mutate_all(MutationKind::ClosePullRequest, ids).await
    }

    async fn mutate_all(&self, kind: MutationKind, ids: &[NodeId]) -> Result<(), GithubError> {
        let graphql = Arc::clone(&self.graphql);
        self.dispatcher
            .dispatch(kind, ids, move |id| {
                let graphql = Arc::clone(&graphql);
                async move { send_mutation(&graphql, kind, &id).await }
            })
            .await
    }
}

#[async_trait]
impl<T: HttpTransport + 'static> RemoteRepository for Session<T> {
    type Error = GithubError;

    async fn list_refs(
        &self,
        owner: &OwnerName,
        repository: &RepositoryName,
        ref_type: RefType,
    ) -> Result<Vec<Ref>, GithubError> {
        Session::list_refs(self, owner.as_str(), repository.as_str(), ref_type).await
    }

    async fn list_pull_requests(
        &self,
        owner: &OwnerName,
        repository: &RepositoryName,
        states: &[PullRequestState],
    ) -> Result<Vec<PullRequest>, GithubError> {
        Session::list_pull_requests(self, owner.as_str(), repository.as_str(), states).await
    }

    async fn delete_refs(&self, ids: &[NodeId]) -> Result<(), GithubError> {
        Session::delete_refs(self, ids).await
    }

    async fn close_pull_requests(&self, ids: &[NodeId]) -> Result<(), GithubError> {
        Session::close_pull_requests(self, ids).await
    }
}
