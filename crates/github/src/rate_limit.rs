//! Rate-limit-aware request execution.
//!
//! GitHub reports the caller's quota on every response through four headers:
//!
//! | Header | Meaning |
//! |--------|---------|
//! | `x-ratelimit-limit` | Requests allowed per window |
//! | `x-ratelimit-used` | Requests consumed in the current window |
//! | `x-ratelimit-remaining` | Requests left in the current window |
//! | `x-ratelimit-reset` | Window reset, in epoch seconds |
//!
//! [`RateLimitedTransport`] reads them after every call. When a response says
//! the quota is exhausted it sleeps until the reset and sends the identical
//! request again, so callers never see quota exhaustion as an error. The loop
//! is bounded by [`RateLimitConfig`] and every wait can be cut short by the
//! session's cancellation token.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::GithubError;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_USED: &str = "x-ratelimit-used";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";
/// Sent with GitHub's secondary (abuse) rate limit, in seconds.
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Bounds on how long a single call may be held back by the quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Waits allowed per call before giving up.
    pub max_retries: u32,
    /// Longest single wait accepted. GitHub windows are one hour long.
    pub max_wait: Duration,
}

impl RateLimitConfig {
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        max_wait: Duration::from_secs(60 * 60),
    };

    pub fn new(max_retries: u32, max_wait: Duration) -> Self {
        Self {
            max_retries,
            max_wait,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Header parsing
// ---------------------------------------------------------------------------

/// The quota signals of one response. Every field is optional because
/// instances with rate limiting disabled omit the headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: Option<u64>,
    pub used: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
    /// Reads the quota headers. Returns `None` if none are present.
    ///
    /// Malformed values are logged and dropped. A reset time that is needed to
    /// wait out exhaustion is parsed again, strictly, by the exhaustion check.
    pub fn from_response(response: &HttpResponse) -> Option<Self> {
        let status = Self {
            limit: lenient(parse_count(response, HEADER_LIMIT)),
            used: lenient(parse_count(response, HEADER_USED)),
            remaining: lenient(parse_count(response, HEADER_REMAINING)),
            reset: lenient(parse_reset(response)),
        };
        (status != Self::default()).then_some(status)
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn lenient<V>(parsed: Result<Option<V>, GithubError>) -> Option<V> {
    parsed.unwrap_or_else(|err| {
        debug!(%err, "ignoring malformed rate limit header");
        None
    })
}

fn parse_count(response: &HttpResponse, header: &'static str) -> Result<Option<u64>, GithubError> {
    response
        .header(header)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| GithubError::RateLimitHeader {
                    header,
                    value: value.to_string(),
                })
        })
        .transpose()
}

/// GitHub sends epoch seconds. Some proxies rewrite the value as an ISO-8601
/// timestamp with a numeric offset, which is accepted too.
fn parse_reset(response: &HttpResponse) -> Result<Option<DateTime<Utc>>, GithubError> {
    let Some(value) = response.header(HEADER_RESET) else {
        return Ok(None);
    };
    let trimmed = value.trim();
    let parsed = match trimmed.parse::<i64>() {
        Ok(secs) => DateTime::from_timestamp(secs, 0),
        Err(_) => DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%z")
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    };
    parsed.map(Some).ok_or_else(|| GithubError::RateLimitHeader {
        header: HEADER_RESET,
        value: value.to_string(),
    })
}

fn parse_retry_after(response: &HttpResponse) -> Result<Option<Duration>, GithubError> {
    response
        .header(HEADER_RETRY_AFTER)
        .map(|value| {
            value
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| GithubError::RateLimitHeader {
                    header: HEADER_RETRY_AFTER,
                    value: value.to_string(),
                })
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// Exhaustion decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// Hand the response to the caller.
    Deliver,
    /// Sleep, then send the same request again.
    RetryAfter(Duration),
}

fn assess(
    response: &HttpResponse,
    status: Option<&RateLimitStatus>,
    now: DateTime<Utc>,
) -> Result<Verdict, GithubError> {
    if matches!(response.status, 403 | 429) {
        if let Some(after) = lenient(parse_retry_after(response)) {
            return Ok(Verdict::RetryAfter(after));
        }
    }

    let depleted = status.is_some_and(RateLimitStatus::is_depleted);
    let exhausted = response.status == 429 || (depleted && !response.is_success());
    if !exhausted {
        return Ok(Verdict::Deliver);
    }

    match parse_reset(response)? {
        Some(reset) => Ok(Verdict::RetryAfter(until(reset, now))),
        None => Err(GithubError::RateLimitHeader {
            header: HEADER_RESET,
            value: String::new(),
        }),
    }
}

/// Time from `now` to `reset`, zero if the reset already passed.
fn until(reset: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (reset - now).to_std().unwrap_or(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Wraps an [`HttpTransport`] and absorbs quota exhaustion.
///
/// A response that is successful but leaves zero requests is delivered as-is
/// (a mutation must never be sent twice); the reset time is remembered and
/// the next call waits for it before it is sent.
pub struct RateLimitedTransport<T> {
    inner: T,
    config: RateLimitConfig,
    cancel: CancellationToken,
    paused_until: Mutex<Option<DateTime<Utc>>>,
}

impl<T: HttpTransport> RateLimitedTransport<T> {
    pub fn new(inner: T, config: RateLimitConfig, cancel: CancellationToken) -> Self {
        Self {
            inner,
            config,
            cancel,
            paused_until: Mutex::new(None),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Sends `request`, waiting out quota exhaustion as often as the config
    /// allows.
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, GithubError> {
        self.wait_for_pause().await?;

        let mut waits = 0;
        loop {
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(GithubError::Cancelled),
                response = self.inner.execute(request.clone()) => response?,
            };

            let status = RateLimitStatus::from_response(&response);
            if let Some(s) = &status {
                debug!(
                    used = ?s.used,
                    limit = ?s.limit,
                    remaining = ?s.remaining,
                    "GitHub API usage limit statistics"
                );
            }

            match assess(&response, status.as_ref(), Utc::now())? {
                Verdict::Deliver => {
                    if let Some(reset) = status.filter(RateLimitStatus::is_depleted).and_then(|s| s.reset) {
                        self.pause_until(reset);
                    }
                    return Ok(response);
                }
                Verdict::RetryAfter(delay) => {
                    if waits >= self.config.max_retries {
                        return Err(GithubError::RateLimitExhausted {
                            waits,
                            reset: status.and_then(|s| s.reset),
                        });
                    }
                    waits += 1;
                    warn!(
                        status = response.status,
                        wait_secs = delay.as_secs(),
                        attempt = waits,
                        "GitHub API usage limits exceeded, waiting for reset"
                    );
                    self.sleep(delay).await?;
                }
            }
        }
    }

    fn pause_until(&self, reset: DateTime<Utc>) {
        let mut paused = self
            .paused_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if paused.is_none_or(|current| current < reset) {
            *paused = Some(reset);
        }
    }

    async fn wait_for_pause(&self) -> Result<(), GithubError> {
        let until_reset = *self
            .paused_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(reset) = until_reset else {
            return Ok(());
        };
        let delay = until(reset, Utc::now());
        if !delay.is_zero() {
            info!(wait_secs = delay.as_secs(), "GitHub API quota depleted, holding request until reset");
            self.sleep(delay).await?;
        }
        Ok(())
    }

    async fn sleep(&self, delay: Duration) -> Result<(), GithubError> {
        if delay > self.config.max_wait {
            return Err(GithubError::RateLimitWaitTooLong {
                wait: delay,
                limit: self.config.max_wait,
            });
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GithubError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
