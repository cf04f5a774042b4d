//! Staleness rules: which fetched refs and pull requests are old enough to
//! be reported (and, on request, removed).

use chrono::Duration;
use regex::Regex;

use crate::{PullRequest, Ref, RefType, Timestamp};

/// Returns `true` if `date` lies strictly before `now - threshold`.
pub fn is_stale(date: Timestamp, threshold: Duration, now: Timestamp) -> bool {
    date.to_utc() < now.to_utc() - threshold
}

/// Selects stale items relative to a fixed instant.
///
/// Items without an activity date are never stale: there is nothing to
/// compare against, and a destructive action must not be guessed.
#[derive(Debug, Clone)]
pub struct StalenessFilter {
    threshold: Duration,
    exclude: Option<Regex>,
    now: Timestamp,
}

impl StalenessFilter {
    pub fn new(threshold: Duration, now: Timestamp) -> Self {
        Self {
            threshold,
            exclude: None,
            now,
        }
    }

    /// Names matching `pattern` are never selected.
    pub fn with_exclusion(mut self, pattern: Regex) -> Self {
        self.exclude = Some(pattern);
        self
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(name))
    }

    pub fn select_refs(&self, refs: Vec<Ref>, ref_type: RefType) -> Vec<Ref> {
        refs.into_iter()
            .filter(|r| !self.is_excluded(r.name.as_str()))
            .filter(|r| {
                r.activity_date(ref_type)
                    .is_some_and(|d| is_stale(d, self.threshold, self.now))
            })
            .collect()
    }

    /// Pull requests are matched against the exclusion pattern by their
    /// source branch.
    pub fn select_pull_requests(&self, prs: Vec<PullRequest>) -> Vec<PullRequest> {
        prs.into_iter()
            .filter(|pr| !self.is_excluded(&pr.source_branch))
            .filter(|pr| {
                pr.last_commit_date
                    .is_some_and(|d| is_stale(d, self.threshold, self.now))
            })
            .collect()
    }
}
