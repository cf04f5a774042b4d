//! In-memory transport for unit tests.
//!
//! [`ScriptedTransport`] records every request and answers from a script, so
//! tests can assert both what was sent and how the client reacted.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::rate_limit::{HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET, HEADER_USED};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::GithubError;

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

pub struct ScriptedTransport {
    handler: Option<Handler>,
    queue: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Answers each request with the next response; panics when the script
    /// runs out.
    pub fn sequence(responses: Vec<HttpResponse>) -> Self {
        Self {
            handler: None,
            queue: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request by calling `handler`.
    pub fn replying(handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            queue: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Request bodies decoded as JSON.
    pub fn bodies(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, GithubError> {
        self.requests.lock().unwrap().push(request.clone());
        let response = match &self.handler {
            Some(handler) => handler(&request),
            None => self
                .queue
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted transport ran out of responses"),
        };
        Ok(response)
    }
}

/// A 200 response carrying healthy quota headers, like the ones GitHub sends.
pub fn ok_json(body: &str) -> HttpResponse {
    HttpResponse::new(200, body)
        .with_header(HEADER_LIMIT, "15000")
        .with_header(HEADER_USED, "0")
        .with_header(HEADER_REMAINING, "15000")
        .with_header(HEADER_RESET, "1693646702")
}

/// Extracts `variables.<name>` from a GraphQL request body.
pub fn variable(request: &HttpRequest, name: &str) -> Value {
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    body["variables"][name].clone()
}
