//! JSON-over-HTTP transport shared by both runner clients.
//!
//! Every runner method is `POST <base_url>/<method>` with a JSON object of
//! named arguments. A successful answer is `{"<method>": <result>}`; a failed
//! one is `{"exception": <message>}`.

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::RunnerError;
use crate::types::CapturedResult;
use crate::{Result, RESPONSE_GRACE_SECS};

/// Marker some runners put in `status` when the budget ran out.
const TIMED_OUT: &str = "timed_out";

pub(crate) struct RunnerTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl RunnerTransport {
    pub(crate) fn new(base_url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("kata-runner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RunnerError::Http {
                method: "client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call `method` and return the unwrapped result value.
    ///
    /// `budget_secs` is only used to describe a time-out; the HTTP call is
    /// abandoned after `timeout`.
    pub(crate) async fn call(
        &self,
        method: &str,
        args: Value,
        timeout: Duration,
        budget_secs: u64,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(url = %url, "calling runner");

        let response = self
            .http_client
            .post(&url)
            .json(&args)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(method, budget_secs, e))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| transport_error(method, budget_secs, e))?;

        if !status.is_success() && body.get("exception").is_none() {
            return Err(RunnerError::Http {
                method: method.to_string(),
                message: format!("status {status}"),
            });
        }

        unwrap_response(method, body)
    }
}

fn transport_error(method: &str, budget_secs: u64, err: reqwest::Error) -> RunnerError {
    if err.is_timeout() {
        RunnerError::TimedOut {
            method: method.to_string(),
            max_seconds: budget_secs,
            partial: None,
        }
    } else {
        RunnerError::Http {
            method: method.to_string(),
            message: err.to_string(),
        }
    }
}

/// Pull the result for `method` out of a response body.
pub(crate) fn unwrap_response(method: &str, mut body: Value) -> Result<Value> {
    if let Some(exception) = body.get("exception") {
        let message = match exception {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(RunnerError::Exception {
            method: method.to_string(),
            message,
        });
    }

    match body.get_mut(method) {
        Some(result) => Ok(result.take()),
        None => Err(RunnerError::MalformedResponse {
            method: method.to_string(),
            message: format!("missing '{method}' key in {body}"),
        }),
    }
}

/// How long a `run` call may take before it is abandoned.
pub(crate) fn run_timeout(max_seconds: u64) -> Duration {
    Duration::from_secs(max_seconds.saturating_add(RESPONSE_GRACE_SECS))
}

/// Interpret a `run` result as a [`CapturedResult`].
pub(crate) fn parse_captured(method: &str, result: &Value, max_seconds: u64) -> Result<CapturedResult> {
    let text = |key: &str| -> String {
        result
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let stdout = text("stdout");
    let stderr = text("stderr");

    let timed_out = result
        .get(TIMED_OUT)
        .and_then(Value::as_bool)
        .unwrap_or(false)
        || result.get("status").and_then(Value::as_str) == Some(TIMED_OUT);
    if timed_out {
        return Err(RunnerError::TimedOut {
            method: method.to_string(),
            max_seconds,
            partial: Some(CapturedResult {
                stdout,
                stderr,
                status: -1,
            }),
        });
    }

    let status = match result.get("status") {
        Some(Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
        _ => None,
    };

    status
        .map(|status| CapturedResult {
            stdout,
            stderr,
            status,
        })
        .ok_or_else(|| RunnerError::MalformedResponse {
            method: method.to_string(),
            message: format!("no integer status in {result}"),
        })
}
