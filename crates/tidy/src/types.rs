//! Value types for refs and pull requests as returned by the remote.
//!
//! Values are built fresh from each query response, held in memory for the
//! duration of one invocation, and discarded afterwards.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::{NodeId, PullRequestNumber, RefName, ValidationError};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A wall-clock timestamp that keeps the offset the server reported.
///
/// Equality and ordering compare instants, so `19:20:49+01:00` equals
/// `18:20:49Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now().fixed_offset())
    }

    pub fn from_datetime(dt: DateTime<FixedOffset>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 string such as `2023-08-29T19:20:49+01:00`.
    pub fn parse_rfc3339(value: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(value).map(Self)
    }

    pub fn as_datetime(self) -> DateTime<FixedOffset> {
        self.0
    }

    pub fn to_utc(self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self(dt)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.fixed_offset())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Ref kinds
// ---------------------------------------------------------------------------

/// The namespace a ref lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Branch,
    Tag,
}

impl RefType {
    /// The fully-qualified prefix used by the remote's `refPrefix` filter.
    pub fn prefix(self) -> &'static str {
        match self {
            RefType::Branch => "refs/heads/",
            RefType::Tag => "refs/tags/",
        }
    }
}

impl std::fmt::Display for RefType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefType::Branch => f.write_str("branch"),
            RefType::Tag => f.write_str("tag"),
        }
    }
}

// ---------------------------------------------------------------------------

/// A branch or tag pointer.
///
/// A successfully fetched ref has at least one date: branches carry
/// `last_commit_date`, annotated tags carry `tag_date` and usually the date of
/// the commit they point at as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub id: NodeId,
    pub name: RefName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_date: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_date: Option<Timestamp>,
}

impl Ref {
    /// The date that decides whether this ref is stale.
    ///
    /// Tags prefer the tagger date and fall back to the commit date; branches
    /// only have a commit date.
    pub fn activity_date(&self, ref_type: RefType) -> Option<Timestamp> {
        match ref_type {
            RefType::Tag => self.tag_date.or(self.last_commit_date),
            RefType::Branch => self.last_commit_date,
        }
    }
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

/// Pull request states understood by the remote's `states` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

impl PullRequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            PullRequestState::Open => "OPEN",
            PullRequestState::Closed => "CLOSED",
            PullRequestState::Merged => "MERGED",
        }
    }
}

impl FromStr for PullRequestState {
    type Err = ValidationError;

    /// Case-insensitive: `open`, `Open` and `OPEN` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(PullRequestState::Open),
            "CLOSED" => Ok(PullRequestState::Closed),
            "MERGED" => Ok(PullRequestState::Merged),
            _ => Err(ValidationError::UnknownPullRequestState(s.to_string())),
        }
    }
}

impl std::fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// A pull request together with the date of its most recent commit.
///
/// `last_commit_date` tracks code activity, not the pull request's own
/// update time. It is `None` when the remote returned no commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: NodeId,
    pub number: PullRequestNumber,
    #[serde(rename = "source")]
    pub source_branch: String,
    #[serde(rename = "target")]
    pub target_branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_date: Option<Timestamp>,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse_rfc3339(s).unwrap()
    }

    #[test]
    fn timestamps_compare_instants_across_offsets() {
        assert_eq!(ts("2023-08-29T19:20:49+01:00"), ts("2023-08-29T18:20:49Z"));
        assert!(ts("2023-08-29T19:20:49+01:00") < ts("2023-08-29T19:20:49Z"));
    }

    #[test]
    fn timestamp_display_keeps_offset() {
        assert_eq!(ts("2023-08-29T19:20:49+01:00").to_string(), "2023-08-29T19:20:49+01:00");
    }

    #[test]
    fn ref_type_prefixes() {
        assert_eq!(RefType::Branch.prefix(), "refs/heads/");
        assert_eq!(RefType::Tag.prefix(), "refs/tags/");
    }

    #[test]
    fn pull_request_state_is_case_normalised() {
        assert_eq!("open".parse::<PullRequestState>(), Ok(PullRequestState::Open));
        assert_eq!(" Merged ".parse::<PullRequestState>(), Ok(PullRequestState::Merged));
        assert_eq!("CLOSED".parse::<PullRequestState>(), Ok(PullRequestState::Closed));
        assert!(matches!(
            "draft".parse::<PullRequestState>(),
            Err(ValidationError::UnknownPullRequestState(s)) if s == "draft"
        ));
    }

    #[test]
    fn tag_activity_prefers_tagger_date() {
        let tag = Ref {
            id: NodeId::new("1").unwrap(),
            name: RefName::new("v1").unwrap(),
            last_commit_date: Some(ts("2020-01-01T00:00:00Z")),
            tag_date: Some(ts("2021-01-01T00:00:00Z")),
        };
        assert_eq!(tag.activity_date(RefType::Tag), tag.tag_date);
        assert_eq!(tag.activity_date(RefType::Branch), tag.last_commit_date);

        let lightweight = Ref { tag_date: None, ..tag };
        assert_eq!(
            lightweight.activity_date(RefType::Tag),
            Some(ts("2020-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn ref_serialisation_omits_missing_dates() {
        let branch = Ref {
            id: NodeId::new("007").unwrap(),
            name: RefName::new("test-ref").unwrap(),
            last_commit_date: Some(ts("2023-08-29T19:20:49+01:00")),
            tag_date: None,
        };
        let json = serde_json::to_value(&branch).unwrap();
        assert_eq!(json["id"], "007");
        assert_eq!(json["last_commit_date"], "2023-08-29T19:20:49+01:00");
        assert!(json.get("tag_date").is_none());
    }

    #[test]
    fn pull_request_serialises_branch_names_as_source_and_target() {
        let pr = PullRequest {
            id: NodeId::new("PR_1").unwrap(),
            number: PullRequestNumber::new(7),
            source_branch: "feature".into(),
            target_branch: "main".into(),
            last_commit_date: None,
            url: "https://github.com/o/r/pull/7".into(),
        };
        let json = serde_json::to_value(&pr).unwrap();
        assert_eq!(json["source"], "feature");
        assert_eq!(json["target"], "main");
        assert_eq!(json["number"], 7);
    }
}
