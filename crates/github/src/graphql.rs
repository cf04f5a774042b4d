//! Minimal GraphQL-over-HTTP client.
//!
//! Only the envelope is handled here: `{"query", "variables"}` out,
//! `{"data", "errors"}` back. Documents and response shapes live next to the
//! operations that use them ([`crate::queries`], [`crate::dispatch`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitedTransport;
use crate::transport::{HttpRequest, HttpTransport};
use crate::GithubError;

/// GraphQL endpoint of github.com.
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

/// Resolves the GraphQL endpoint for an optional GitHub Enterprise API URL.
///
/// `https://ghe.example.com/api` becomes `https://ghe.example.com/api/graphql`.
/// The REST base `https://ghe.example.com/api/v3` maps to the same endpoint. A
/// URL that already ends in `/graphql` is used as given.
pub fn endpoint_for(enterprise: Option<&str>) -> Result<String, GithubError> {
    let Some(raw) = enterprise.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DEFAULT_ENDPOINT.to_string());
    };
    if !(raw.starts_with("https://") || raw.starts_with("http://")) {
        return Err(GithubError::configuration(format!(
            "the enterprise endpoint '{raw}' must be an http(s) URL"
        )));
    }
    let base = raw.trim_end_matches('/');
    if base.ends_with("/graphql") {
        return Ok(base.to_string());
    }
    let base = base.strip_suffix("/v3").unwrap_or(base);
    Ok(format!("{base}/graphql"))
}

#[derive(Serialize)]
struct Envelope<'a, V> {
    query: &'a str,
    variables: &'a V,
}

#[derive(Deserialize)]
struct Reply<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<ReplyError>,
}

#[derive(Deserialize)]
struct ReplyError {
    message: String,
}

/// Sends GraphQL documents through a [`RateLimitedTransport`].
pub struct GraphQlClient<T> {
    transport: RateLimitedTransport<T>,
    endpoint: String,
}

impl<T: HttpTransport> GraphQlClient<T> {
    pub fn new(transport: RateLimitedTransport<T>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Executes `document` with `variables` and decodes `data` into `D`.
    ///
    /// Non-success statuses, a non-empty `errors` array and a missing `data`
    /// member are all errors.
    pub async fn execute<V, D>(&self, document: &str, variables: &V) -> Result<D, GithubError>
    where
        V: Serialize + Sync,
        D: DeserializeOwned,
    {
        let body = serde_json::to_vec(&Envelope {
            query: document,
            variables,
        })?;
        let request = HttpRequest::new(self.endpoint.clone(), body);
        let response = self.transport.execute(&request).await?;

        if !response.is_success() {
            return Err(GithubError::Http {
                status: response.status,
                body: response.body_snippet(),
            });
        }

        let reply: Reply<D> = serde_json::from_slice(&response.body)?;
        if !reply.errors.is_empty() {
            return Err(GithubError::GraphQl {
                messages: reply.errors.into_iter().map(|e| e.message).collect(),
            });
        }
        reply.data.ok_or(GithubError::MissingData)
    }
}
