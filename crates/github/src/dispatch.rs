//! Bounded-concurrency bulk mutations.
//!
//! A dispatch applies one mutation to many node ids. Admission is gated by a
//! semaphore shared by every dispatch of the same dispatcher, so no more than
//! `max_concurrency` mutations are ever in flight. Every id is attempted once
//! and every failure is kept.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tidy::{NodeId, ValidationError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{BulkMutationError, MutationFailure};
use crate::graphql::GraphQlClient;
use crate::transport::HttpTransport;
use crate::GithubError;

const DELETE_REF: &str =
    "mutation($input: DeleteRefInput!) { deleteRef(input: $input) { __typename } }";

const CLOSE_PULL_REQUEST: &str =
    "mutation($input: ClosePullRequestInput!) { closePullRequest(input: $input) { __typename } }";

/// The mutations a bulk dispatch can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    DeleteRef,
    ClosePullRequest,
}

impl MutationKind {
    pub fn verb(self) -> &'static str {
        match self {
            MutationKind::DeleteRef => "delete",
            MutationKind::ClosePullRequest => "close",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            MutationKind::DeleteRef => "ref",
            MutationKind::ClosePullRequest => "PR",
        }
    }

    /// Name of the identifiers this mutation takes, for validation messages.
    pub fn plural(self) -> &'static str {
        match self {
            MutationKind::DeleteRef => "refs",
            MutationKind::ClosePullRequest => "PR ids",
        }
    }

    pub(crate) fn document(self) -> &'static str {
        match self {
            MutationKind::DeleteRef => DELETE_REF,
            MutationKind::ClosePullRequest => CLOSE_PULL_REQUEST,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.noun())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MutationInput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pull_request_id: Option<&'a str>,
}

#[derive(Serialize)]
struct MutationVariables<'a> {
    input: MutationInput<'a>,
}

/// Sends one mutation for `id`. The payload (`__typename`) is not inspected.
pub(crate) async fn send_mutation<T: HttpTransport>(
    graphql: &GraphQlClient<T>,
    kind: MutationKind,
    id: &NodeId,
) -> Result<(), GithubError> {
    let input = match kind {
        MutationKind::DeleteRef => MutationInput {
            ref_id: Some(id.as_str()),
            pull_request_id: None,
        },
        MutationKind::ClosePullRequest => MutationInput {
            ref_id: None,
            pull_request_id: Some(id.as_str()),
        },
    };
    let _: serde_json::Value = graphql
        .execute(kind.document(), &MutationVariables { input })
        .await?;
    Ok(())
}

/// Runs independent mutations with a concurrency ceiling.
#[derive(Debug, Clone)]
pub struct BulkMutationDispatcher {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    cancel: CancellationToken,
}

impl BulkMutationDispatcher {
    pub fn new(max_concurrency: usize, cancel: CancellationToken) -> Result<Self, ValidationError> {
        if max_concurrency == 0 {
            return Err(ValidationError::ZeroWorkerCount);
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            cancel,
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Applies `mutate` to every id and waits for all of them.
    ///
    /// An empty `ids` slice is rejected before anything runs. Ids not yet
    /// admitted when the cancellation token fires are reported as
    /// [`GithubError::Cancelled`] without being attempted.
    pub async fn dispatch<F, Fut>(
        &self,
        kind: MutationKind,
        ids: &[NodeId],
        mutate: F,
    ) -> Result<(), GithubError>
    where
        F: Fn(NodeId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), GithubError>> + Send + 'static,
    {
        if ids.is_empty() {
            return Err(ValidationError::NoIdentifiers(kind.plural()).into());
        }

        info!(operation = %kind, count = ids.len(), workers = self.max_concurrency, "dispatching mutations");

        let mutate = Arc::new(mutate);
        let mut failures = Vec::new();
        let mut jobs = Vec::with_capacity(ids.len());

        for id in ids {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                failures.push(MutationFailure {
                    kind,
                    id: id.clone(),
                    cause: GithubError::Cancelled,
                });
                continue;
            };

            let mutate = Arc::clone(&mutate);
            let cancel = self.cancel.clone();
            let job_id = id.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(GithubError::Cancelled),
                    result = mutate(job_id) => result,
                }
            });
            jobs.push((id.clone(), handle));
        }

        for (id, handle) in jobs {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(GithubError::TaskFailed(join_error.to_string())),
            };
            match outcome {
                Ok(()) => debug!(operation = %kind, id = %id, "mutation applied"),
                Err(cause) => {
                    warn!(operation = %kind, id = %id, error = %cause, "mutation failed");
                    failures.push(MutationFailure { kind, id, cause });
                }
            }
        }

        if failures.is_empty() {
            info!(operation = %kind, count = ids.len(), "all mutations applied");
            return Ok(());
        }
        warn!(operation = %kind, failed = failures.len(), attempted = ids.len(), "some mutations failed");
        Err(BulkMutationError::new(kind, ids.len(), failures).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{RateLimitConfig, RateLimitedTransport};
    use crate::test_support::{ok_json, ScriptedTransport};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn ids(n: usize) -> Vec<NodeId> {
        (0..n).map(|i| NodeId::new(format!("id-{i}")).unwrap()).collect()
    }

    fn bulk(err: GithubError) -> BulkMutationError {
        match err {
            GithubError::BulkMutation(bulk) => bulk,
            other => panic!("expected a bulk failure, got {other}"),
        }
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = BulkMutationDispatcher::new(0, CancellationToken::new()).unwrap_err();
        assert_eq!(err, ValidationError::ZeroWorkerCount);
    }

    #[test]
    fn kind_wording() {
        assert_eq!(MutationKind::DeleteRef.to_string(), "delete ref");
        assert_eq!(MutationKind::ClosePullRequest.to_string(), "close PR");
        assert_eq!(MutationKind::DeleteRef.plural(), "refs");
        assert_eq!(MutationKind::ClosePullRequest.plural(), "PR ids");
    }

    #[tokio::test]
    async fn empty_input_performs_no_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let dispatcher = BulkMutationDispatcher::new(4, CancellationToken::new()).unwrap();

        let err = dispatcher
            .dispatch(MutationKind::DeleteRef, &[], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GithubError::Validation(ValidationError::NoIdentifiers("refs"))
        ));
        assert_eq!(err.to_string(), "no refs have been specified");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn every_failure_is_reported() {
        let dispatcher = BulkMutationDispatcher::new(2, CancellationToken::new()).unwrap();
        let input: Vec<NodeId> = ["x", "y", "z", "w"]
            .into_iter()
            .filter_map(NodeId::new)
            .collect();

        let err = dispatcher
            .dispatch(MutationKind::DeleteRef, &input, |_| async {
                Err(GithubError::Http {
                    status: 500,
                    body: "boom".into(),
                })
            })
            .await
            .unwrap_err();

        let bulk = bulk(err);
        assert_eq!(bulk.len(), 4);
        assert_eq!(bulk.attempted(), 4);
        let failed: HashSet<_> = bulk.failed_ids().cloned().collect();
        assert_eq!(failed, input.iter().cloned().collect::<HashSet<_>>());
        let text = bulk.to_string();
        for id in ["x", "y", "z", "w"] {
            assert!(text.contains(&format!("unable to delete ref: {id}. error: GitHub API error (HTTP 500): boom")));
        }
        assert_eq!(text.lines().count(), 4);
    }

    #[tokio::test]
    async fn only_failing_ids_are_reported() {
        let dispatcher = BulkMutationDispatcher::new(3, CancellationToken::new()).unwrap();

        let err = dispatcher
            .dispatch(MutationKind::ClosePullRequest, &ids(10), |id| async move {
                if id.as_str().ends_with('3') || id.as_str().ends_with('7') {
                    Err(GithubError::MissingData)
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        let bulk = bulk(err);
        let mut failed: Vec<_> = bulk.failed_ids().map(|id| id.as_str().to_string()).collect();
        failed.sort();
        assert_eq!(failed, ["id-3", "id-7"]);
        assert!(!bulk.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_never_exceeds_the_ceiling() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Mutex::new(HashSet::new()));
        let dispatcher = BulkMutationDispatcher::new(20, CancellationToken::new()).unwrap();

        let (f, p, d) = (Arc::clone(&in_flight), Arc::clone(&peak), Arc::clone(&done));
        dispatcher
            .dispatch(MutationKind::DeleteRef, &ids(1000), move |id| {
                let (f, p, d) = (Arc::clone(&f), Arc::clone(&p), Arc::clone(&d));
                async move {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    f.fetch_sub(1, Ordering::SeqCst);
                    d.lock().unwrap().insert(id);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 20);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(done.lock().unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn cancellation_before_dispatch_attempts_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let dispatcher = BulkMutationDispatcher::new(4, cancel).unwrap();

        let err = dispatcher
            .dispatch(MutationKind::DeleteRef, &ids(5), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        let bulk = bulk(err);
        assert_eq!(bulk.len(), 5);
        assert!(bulk
            .failures()
            .iter()
            .all(|f| matches!(f.cause, GithubError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_dispatch_stops_pending_jobs() {
        let cancel = CancellationToken::new();
        let dispatcher = BulkMutationDispatcher::new(2, cancel.clone()).unwrap();
        let trigger = cancel.clone();

        let err = dispatcher
            .dispatch(MutationKind::DeleteRef, &ids(10), move |id| {
                let trigger = trigger.clone();
                async move {
                    if id.as_str() == "id-1" {
                        trigger.cancel();
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        let bulk = bulk(err);
        assert!(bulk.is_cancelled());
        assert!(bulk.len() >= 8);
        assert!(bulk.len() <= 10);
    }

    #[tokio::test]
    async fn panicking_job_is_a_failure_for_its_id() {
        let dispatcher = BulkMutationDispatcher::new(2, CancellationToken::new()).unwrap();

        let err = dispatcher
            .dispatch(MutationKind::DeleteRef, &ids(3), |id| async move {
                if id.as_str() == "id-1" {
                    panic!("job blew up");
                }
                Ok(())
            })
            .await
            .unwrap_err();

        let bulk = bulk(err);
        assert_eq!(bulk.len(), 1);
        assert_eq!(bulk.failures()[0].id.as_str(), "id-1");
        assert!(matches!(bulk.failures()[0].cause, GithubError::TaskFailed(_)));
    }

    #[tokio::test]
    async fn mutation_payloads() {
        let transport = Arc::new(ScriptedTransport::sequence(vec![
            ok_json(r#"{"data":{"deleteRef":{"__typename":"DeleteRefPayload"}}}"#),
            ok_json(r#"{"data":{"closePullRequest":{"__typename":"ClosePullRequestPayload"}}}"#),
        ]));
        let graphql = GraphQlClient::new(
            RateLimitedTransport::new(
                Arc::clone(&transport),
                RateLimitConfig::default(),
                CancellationToken::new(),
            ),
            crate::graphql::DEFAULT_ENDPOINT,
        );

        let id = NodeId::new("REF_1").unwrap();
        send_mutation(&graphql, MutationKind::DeleteRef, &id).await.unwrap();
        let id = NodeId::new("PR_1").unwrap();
        send_mutation(&graphql, MutationKind::ClosePullRequest, &id).await.unwrap();

        let bodies = transport.bodies();
        assert_eq!(bodies[0]["query"], DELETE_REF);
        assert_eq!(bodies[0]["variables"], json!({"input": {"refId": "REF_1"}}));
        assert_eq!(bodies[1]["query"], CLOSE_PULL_REQUEST);
        assert_eq!(
            bodies[1]["variables"],
            json!({"input": {"pullRequestId": "PR_1"}})
        );
    }
}
