//! Cursor-paginated listing of refs and pull requests.
//!
//! Both listings follow the same discipline: request 100 nodes, append them,
//! and continue from `pageInfo.endCursor` while `pageInfo.hasNextPage` holds.
//! Any failing page aborts the whole listing; partial results are dropped.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tidy::{
    NodeId, PullRequest, PullRequestNumber, PullRequestState, Ref, RefName, RefType, Timestamp,
    ValidationError,
};
use tracing::debug;

use crate::graphql::GraphQlClient;
use crate::transport::HttpTransport;
use crate::GithubError;

/// Nodes requested per page; the remote's maximum.
pub const PAGE_SIZE: u32 = 100;

pub(crate) const LIST_REFS: &str = "query($owner: String!, $name: String!, $first: Int!, $after: String, $refPrefix: String!) { \
repository(owner: $owner, name: $name) { \
refs(first: $first, after: $after, refPrefix: $refPrefix) { \
nodes { id name target { \
... on Commit { committedDate } \
... on Tag { tagger { date } target { ... on Commit { committedDate } } } \
} } \
pageInfo { endCursor hasNextPage } \
} } }";

pub(crate) const LIST_PULL_REQUESTS: &str = "query($owner: String!, $name: String!, $first: Int!, $after: String, $states: [PullRequestState!]) { \
repository(owner: $owner, name: $name) { \
pullRequests(first: $first, after: $after, states: $states) { \
nodes { id number url baseRefName headRefName \
commits(last: 1) { nodes { commit { committedDate } } } \
} \
pageInfo { endCursor hasNextPage } \
} } }";

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

/// One page of a connection. GraphQL lists may contain `null` entries.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<N> {
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<N>>,
    #[serde(default)]
    page_info: PageInfo,
}

#[derive(Deserialize)]
struct RepositoryData<R> {
    repository: Option<R>,
}

#[derive(Deserialize)]
struct RefsRepository {
    refs: Option<Connection<RefNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestsRepository {
    pull_requests: Option<Connection<PullRequestNode>>,
}

#[derive(Debug, Deserialize)]
struct RefNode {
    id: Option<String>,
    name: Option<String>,
    target: Option<RefTarget>,
}

/// `target` is a union; the fragment the server matched decides which
/// members are filled.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefTarget {
    committed_date: Option<DateTime<FixedOffset>>,
    tagger: Option<Tagger>,
    target: Option<TaggedCommit>,
}

#[derive(Debug, Deserialize)]
struct Tagger {
    date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaggedCommit {
    committed_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    id: Option<String>,
    number: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    base_ref_name: String,
    #[serde(default)]
    head_ref_name: String,
    commits: Option<Connection<CommitNode>>,
}

#[derive(Debug, Deserialize)]
struct CommitNode {
    commit: Option<CommitDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitDate {
    committed_date: Option<DateTime<FixedOffset>>,
}

impl RefNode {
    fn into_ref(self) -> Result<Ref, GithubError> {
        let id = self.id.and_then(NodeId::new).ok_or(GithubError::InvalidNode("id"))?;
        let name = self.name.and_then(RefName::new).ok_or(GithubError::InvalidNode("name"))?;
        let target = self.target.unwrap_or_default();

        let last_commit_date = target
            .committed_date
            .or_else(|| target.target.and_then(|t| t.committed_date))
            .map(Timestamp::from);
        let tag_date = target.tagger.and_then(|t| t.date).map(Timestamp::from);

        Ok(Ref {
            id,
            name,
            last_commit_date,
            tag_date,
        })
    }
}

impl PullRequestNode {
    fn into_pull_request(self) -> Result<PullRequest, GithubError> {
        let id = self.id.and_then(NodeId::new).ok_or(GithubError::InvalidNode("id"))?;
        // commits(last: 1) returns at most one node: the most recent commit.
        let last_commit_date = self
            .commits
            .and_then(|c| c.nodes.into_iter().flatten().last())
            .and_then(|n| n.commit)
            .and_then(|c| c.committed_date)
            .map(Timestamp::from);

        Ok(PullRequest {
            id,
            number: PullRequestNumber::new(self.number),
            source_branch: self.head_ref_name,
            target_branch: self.base_ref_name,
            last_commit_date,
            url: self.url,
        })
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefsVariables<'a> {
    owner: &'a str,
    name: &'a str,
    first: u32,
    after: Option<&'a str>,
    ref_prefix: &'static str,
}

#[derive(Serialize)]
struct PullRequestsVariables<'a> {
    owner: &'a str,
    name: &'a str,
    first: u32,
    after: Option<&'a str>,
    states: Option<&'a [PullRequestState]>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

fn validate<'a>(owner: &'a str, repository: &'a str) -> Result<(&'a str, &'a str), ValidationError> {
    let owner = owner.trim();
    let repository = repository.trim();
    if owner.is_empty() {
        return Err(ValidationError::MissingOwner);
    }
    if repository.is_empty() {
        return Err(ValidationError::MissingRepository);
    }
    Ok((owner, repository))
}

/// Drives a paginated query until the server reports no further pages.
async fn collect_pages<N, F, Fut>(mut fetch_page: F) -> Result<Vec<N>, GithubError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Connection<N>, GithubError>>,
{
    let mut nodes = Vec::new();
    let mut after = None;
    let mut pages = 0usize;
    loop {
        let page = fetch_page(after.take()).await?;
        pages += 1;
        nodes.extend(page.nodes.into_iter().flatten());

        if !page.page_info.has_next_page {
            debug!(pages, total = nodes.len(), "pagination complete");
            return Ok(nodes);
        }
        match page.page_info.end_cursor {
            Some(cursor) if !cursor.is_empty() => after = Some(cursor),
            _ => return Err(GithubError::MissingCursor),
        }
    }
}

/// Lists complete collections, hiding pagination from the caller.
pub struct PagedQueryClient<T> {
    graphql: Arc<GraphQlClient<T>>,
}

impl<T: HttpTransport> PagedQueryClient<T> {
    pub fn new(graphql: Arc<GraphQlClient<T>>) -> Self {
        Self { graphql }
    }

    /// Lists every branch or tag of `owner/repository`, in server order.
    ///
    /// Blank owner or repository names are rejected without a request.
    pub async fn list_refs(
        &self,
        owner: &str,
        repository: &str,
        ref_type: RefType,
    ) -> Result<Vec<Ref>, GithubError> {
        let (owner, repository) = validate(owner, repository)?;

        let nodes = collect_pages(|after| async move {
            let variables = RefsVariables {
                owner,
                name: repository,
                first: PAGE_SIZE,
                after: after.as_deref(),
                ref_prefix: ref_type.prefix(),
            };
            let data: RepositoryData<RefsRepository> =
                self.graphql.execute(LIST_REFS, &variables).await?;
            let repo = data
                .repository
                .ok_or_else(|| GithubError::RepositoryNotFound(format!("{owner}/{repository}")))?;
            Ok(repo.refs.unwrap_or_else(empty_connection))
        })
        .await?;

        nodes.into_iter().map(RefNode::into_ref).collect()
    }

    /// Lists every pull request of `owner/repository` in one of `states`,
    /// in server order. An empty `states` slice applies no state filter.
    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repository: &str,
        states: &[PullRequestState],
    ) -> Result<Vec<PullRequest>, GithubError> {
        let (owner, repository) = validate(owner, repository)?;
        let states = (!states.is_empty()).then_some(states);

        let nodes = collect_pages(|after| async move {
            let variables = PullRequestsVariables {
                owner,
                name: repository,
                first: PAGE_SIZE,
                after: after.as_deref(),
                states,
            };
            let data: RepositoryData<PullRequestsRepository> =
                self.graphql.execute(LIST_PULL_REQUESTS, &variables).await?;
            let repo = data
                .repository
                .ok_or_else(|| GithubError::RepositoryNotFound(format!("{owner}/{repository}")))?;
            Ok(repo.pull_requests.unwrap_or_else(empty_connection))
        })
        .await?;

        nodes
            .into_iter()
            .map(PullRequestNode::into_pull_request)
            .collect()
    }
}

fn empty_connection<N>() -> Connection<N> {
    Connection {
        nodes: Vec::new(),
        page_info: PageInfo::default(),
    }
}

/// Parses a list of state tokens such as `["open", "Merged"]`.
pub fn parse_states<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<PullRequestState>, ValidationError> {
    let mut states: Vec<PullRequestState> = tokens
        .iter()
        .map(|t| t.as_ref().parse())
        .collect::<Result<_, _>>()?;
    states.sort();
    states.dedup();
    Ok(states)
}
