//! Apply executor: sends the one mutating call a plan step carries, or reports it in check mode.

use nsx_diff_core::DiffReason;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::plan::ActionKind;
use crate::transport::{ApiRequest, Method, Transport, TransportError};

/// Planned change for one top-level resource, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: ActionKind,
    /// Known id of the target; create calls learn it from the response.
    pub id: Option<String>,
    /// `None` for no-op steps.
    pub request: Option<ApiRequest>,
    pub reason: Option<DiffReason>,
}

impl Step {
    pub fn no_op(id: Option<String>, reason: Option<DiffReason>) -> Self {
        Self {
            kind: ActionKind::NoOp,
            id,
            request: None,
            reason,
        }
    }

    pub fn delete(id: String, request: ApiRequest) -> Self {
        Self {
            kind: ActionKind::Delete,
            id: Some(id),
            request: Some(request),
            reason: None,
        }
    }
}

/// Result of one reconciliation, as reported to the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub resource: String,
    pub changed: bool,
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
    /// Body a check-mode run would send, with passwords masked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DiffReason>,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("{endpoint} rejected the change with HTTP {status}: the resource was modified since it was read")]
    Conflict { endpoint: String, status: u16 },
    #[error("{method} {endpoint} failed with body {body}: {source}")]
    Request {
        method: Method,
        endpoint: String,
        body: String,
        #[source]
        source: TransportError,
    },
    #[error("{endpoint} did not return an id for the created resource")]
    MissingId { endpoint: String },
}

/// Execute `step` for the resource named `label`.
///
/// In check mode nothing is sent and `payload` carries the body a real run
/// would send, passwords masked. Real runs carry no payload. Stale revisions
/// surface as [`ApplyError::Conflict`] and are not retried.
pub fn execute(
    transport: &dyn Transport,
    label: &str,
    step: Step,
    check: bool,
) -> Result<Outcome, ApplyError> {
    let Step {
        kind,
        id,
        request,
        reason,
    } = step;

    let Some(request) = request else {
        let message = match id {
            Some(_) => format!("{label} already exists and has not changed"),
            None => format!("{label} does not exist"),
        };
        info!(resource = label, "no change required");
        return Ok(Outcome {
            resource: label.to_string(),
            changed: false,
            action: kind,
            id,
            message,
            payload: None,
            reason,
        });
    };

    if check {
        info!(resource = label, action = %kind, "check mode, request not sent");
        return Ok(Outcome {
            resource: label.to_string(),
            changed: true,
            action: kind,
            id,
            message: format!("{label} would be {}", past_tense(kind)),
            payload: request.body.as_deref().map(redact_passwords),
            reason,
        });
    }

    debug!(method = %request.method, path = %request.path, "sending change");
    let response = transport
        .request(&request)
        .map_err(|source| classify(&request, source))?;

    let id = match (id, kind) {
        (Some(id), _) => Some(id),
        (None, ActionKind::Create) => Some(response_id(&response).ok_or_else(|| {
            ApplyError::MissingId {
                endpoint: request.path.clone(),
            }
        })?),
        (None, _) => None,
    };
    let message = match kind {
        ActionKind::Create => format!("{label} created successfully"),
        other => format!("{label} {}", past_tense(other)),
    };
    info!(resource = label, action = %kind, id = id.as_deref().unwrap_or(""), "applied");

    Ok(Outcome {
        resource: label.to_string(),
        changed: true,
        action: kind,
        id,
        message,
        payload: None,
        reason,
    })
}

fn classify(request: &ApiRequest, source: TransportError) -> ApplyError {
    match source.status() {
        Some(status @ (409 | 412)) => ApplyError::Conflict {
            endpoint: request.path.clone(),
            status,
        },
        _ => ApplyError::Request {
            method: request.method,
            endpoint: request.path.clone(),
            body: request
                .body
                .as_deref()
                .map(redact_passwords)
                .unwrap_or_default(),
            source,
        },
    }
}

fn response_id(response: &Value) -> Option<String> {
    response.get("id").and_then(Value::as_str).map(str::to_string)
}

fn past_tense(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Create => "created",
        ActionKind::Update => "updated",
        ActionKind::Delete => "deleted",
        ActionKind::NoOp => "left unchanged",
    }
}

/// Body text safe for operator output: every `password` member is masked.
/// Bodies without one come back byte for byte.
fn redact_passwords(body: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    if mask(&mut value) {
        value.to_string()
    } else {
        body.to_string()
    }
}

fn mask(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut masked = false;
            for (key, member) in map.iter_mut() {
                if key == "password" {
                    *member = Value::String("<redacted>".to_string());
                    masked = true;
                } else {
                    masked |= mask(member);
                }
            }
            masked
        }
        Value::Array(items) => items.iter_mut().fold(false, |acc, item| mask(item) | acc),
        _ => false,
    }
}
