use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by the FHIR transport client.
///
/// None of these are retried by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} for {url}: {message}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        /// OperationOutcome diagnostics when present, otherwise the raw body
        message: String,
        body: String,
    },

    /// The request never produced a response (connect, timeout, TLS, bad URL).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response carried a body that is not JSON.
    #[error("invalid JSON in response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    pub(crate) fn http_status(status: StatusCode, url: String, body: String) -> Self {
        let message = operation_outcome_diagnostics(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .to_string()
            } else {
                body.clone()
            }
        });
        ClientError::HttpStatus {
            status,
            url,
            message,
            body,
        }
    }

    /// HTTP status code, if the server responded at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Join the `diagnostics` of every issue in an OperationOutcome body.
fn operation_outcome_diagnostics(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    if json.get("resourceType").and_then(Value::as_str) != Some("OperationOutcome") {
        return None;
    }
    let issues = json.get("issue")?.as_array()?;
    let messages: Vec<&str> = issues
        .iter()
        .filter_map(|issue| issue.get("diagnostics").and_then(Value::as_str))
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}
