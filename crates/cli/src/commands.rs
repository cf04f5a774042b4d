//! Command handlers.
//!
//! Handlers depend only on [`RemoteRepository`], so the GitHub session can be
//! swapped for an in-memory repository in tests. Each handler takes an
//! immutable request value built from the parsed arguments.

use anyhow::Context;
use tidy::{
    NodeId, PullRequest, PullRequestState, Ref, RefName, RefType, RemoteRepository,
    RepositorySlug, StalenessFilter, ValidationError,
};
use tracing::{info, warn};

use crate::output::Report;
use crate::prompt::Confirm;

/// Resolves every repository argument, failing on the first invalid one.
pub fn resolve_repositories(
    arguments: &[String],
    owner: Option<&str>,
) -> Result<Vec<RepositorySlug>, ValidationError> {
    let owner = owner.and_then(tidy::OwnerName::new);
    if arguments.is_empty() {
        return Err(ValidationError::MissingRepository);
    }
    arguments
        .iter()
        .map(|argument| RepositorySlug::resolve(argument, owner.as_ref()))
        .collect()
}

fn ref_noun(ref_type: RefType) -> &'static str {
    match ref_type {
        RefType::Branch => "branches",
        RefType::Tag => "tags",
    }
}

// ---------------------------------------------------------------------------
// stale branches / stale tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StaleRefsRequest {
    pub repositories: Vec<RepositorySlug>,
    pub ref_type: RefType,
    pub filter: StalenessFilter,
}

pub async fn find_stale_refs<R: RemoteRepository>(
    remote: &R,
    request: &StaleRefsRequest,
) -> anyhow::Result<Report<Ref>> {
    let mut report = Report::new();
    for repository in &request.repositories {
        let refs = remote
            .list_refs(&repository.owner, &repository.name, request.ref_type)
            .await
            .with_context(|| {
                format!("unable to list {} of {repository}", ref_noun(request.ref_type))
            })?;
        let total = refs.len();
        let stale = request.filter.select_refs(refs, request.ref_type);
        info!(%repository, total, stale = stale.len(), kind = ref_noun(request.ref_type), "stale refs selected");
        report.insert(repository.to_string(), stale);
    }
    Ok(report)
}

/// Deletes every ref in `report`, one bulk dispatch per repository, asking
/// for confirmation per repository. Returns the number of refs deleted.
pub async fn remove_refs<R: RemoteRepository, C: Confirm + ?Sized>(
    remote: &R,
    report: &Report<Ref>,
    ref_type: RefType,
    confirm: &mut C,
) -> anyhow::Result<usize> {
    let noun = ref_noun(ref_type);
    let mut removed = 0;
    for (repository, refs) in report {
        if refs.is_empty() {
            continue;
        }
        let question = format!("Delete [{}] {noun} in repo [{repository}]?", refs.len());
        if !confirm.confirm(&question).context("unable to read confirmation")? {
            info!(%repository, "deletion skipped");
            continue;
        }
        let ids: Vec<NodeId> = refs.iter().map(|r| r.id.clone()).collect();
        remote
            .delete_refs(&ids)
            .await
            .with_context(|| format!("unable to delete stale {noun} in {repository}"))?;
        removed += ids.len();
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// stale prs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StalePullRequestsRequest {
    pub repositories: Vec<RepositorySlug>,
    pub states: Vec<PullRequestState>,
    pub filter: StalenessFilter,
}

pub async fn find_stale_pull_requests<R: RemoteRepository>(
    remote: &R,
    request: &StalePullRequestsRequest,
) -> anyhow::Result<Report<PullRequest>> {
    let mut report = Report::new();
    for repository in &request.repositories {
        let prs = remote
            .list_pull_requests(&repository.owner, &repository.name, &request.states)
            .await
            .with_context(|| format!("unable to list pull requests of {repository}"))?;
        let total = prs.len();
        let stale = request.filter.select_pull_requests(prs);
        info!(%repository, total, stale = stale.len(), "stale pull requests selected");
        report.insert(repository.to_string(), stale);
    }
    Ok(report)
}

/// Closes every pull request in `report` with the same per-repository
/// confirmation as [`remove_refs`]. Returns the number closed.
pub async fn close_pull_requests<R: RemoteRepository, C: Confirm + ?Sized>(
    remote: &R,
    report: &Report<PullRequest>,
    confirm: &mut C,
) -> anyhow::Result<usize> {
    let mut closed = 0;
    for (repository, prs) in report {
        if prs.is_empty() {
            continue;
        }
        let question = format!("Close [{}] PRs in repo [{repository}]?", prs.len());
        if !confirm.confirm(&question).context("unable to read confirmation")? {
            info!(%repository, "closing skipped");
            continue;
        }
        let ids: Vec<NodeId> = prs.iter().map(|p| p.id.clone()).collect();
        remote
            .close_pull_requests(&ids)
            .await
            .with_context(|| format!("unable to close stale PRs in {repository}"))?;
        closed += ids.len();
    }
    Ok(closed)
}

// ---------------------------------------------------------------------------
// delete --ref
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeleteRefsRequest {
    pub repository: RepositorySlug,
    pub names: Vec<RefName>,
}

/// Deletes the branches and tags named in `request`.
///
/// Names are matched exactly against both namespaces, so a branch and a tag
/// sharing a name are both deleted. Returns the deleted refs; the report is
/// empty when nothing matched or the operator declined.
pub async fn delete_named_refs<R: RemoteRepository, C: Confirm + ?Sized>(
    remote: &R,
    request: &DeleteRefsRequest,
    confirm: &mut C,
) -> anyhow::Result<Report<Ref>> {
    if request.names.is_empty() {
        return Err(ValidationError::NoIdentifiers("refs").into());
    }
    let repository = &request.repository;

    let mut candidates = Vec::new();
    for ref_type in [RefType::Branch, RefType::Tag] {
        let refs = remote
            .list_refs(&repository.owner, &repository.name, ref_type)
            .await
            .with_context(|| format!("unable to list {} of {repository}", ref_noun(ref_type)))?;
        candidates.extend(refs);
    }

    let matched: Vec<Ref> = candidates
        .into_iter()
        .filter(|r| request.names.contains(&r.name))
        .collect();
    for name in &request.names {
        if !matched.iter().any(|r| &r.name == name) {
            warn!(%repository, %name, "no branch or tag with this name");
        }
    }

    let mut report = Report::new();
    if matched.is_empty() {
        return Ok(report);
    }
    let question = format!("Delete [{}] refs in repo [{repository}]?", matched.len());
    if !confirm.confirm(&question).context("unable to read confirmation")? {
        return Ok(report);
    }

    let ids: Vec<NodeId> = matched.iter().map(|r| r.id.clone()).collect();
    remote.delete_refs(&ids).await.with_context(|| {
        let names: Vec<&str> = request.names.iter().map(RefName::as_str).collect();
        format!("unable to delete [refs={}] in {repository}", names.join(", "))
    })?;
    report.insert(repository.to_string(), matched);
    Ok(report)
}
