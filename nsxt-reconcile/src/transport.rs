//! HTTP boundary to the NSX manager.
//!
//! Everything above this module talks to [`Transport`], so the reconcile
//! pipeline can run against a recorded fake in tests and against the real
//! manager through [`HttpTransport`].

use std::fmt;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ManagerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One API call. `path` is relative to the manager base URL and includes the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    pub fn is_mutating(&self) -> bool {
        self.method != Method::Get
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{method} {endpoint} failed: {source}")]
    Connection {
        method: Method,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {endpoint} returned HTTP {status}: {body}")]
    Status {
        method: Method,
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("{endpoint} returned a malformed body: {source}")]
    Malformed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Blocking request/response channel to the manager.
pub trait Transport {
    /// Send one request. Empty success bodies come back as `Value::Null`.
    fn request(&self, request: &ApiRequest) -> Result<Value, TransportError>;
}

/// Production transport: blocking reqwest client with basic auth.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(config: &ManagerConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.validate_certs)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

impl Transport for HttpTransport {
    fn request(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, path = %request.path, "sending request");

        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &url)
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let connection_error = |source| TransportError::Connection {
            method: request.method,
            endpoint: request.path.clone(),
            source,
        };
        let response = builder.send().map_err(connection_error)?;
        let status = response.status();
        let text = response.text().map_err(connection_error)?;
        debug!(status = status.as_u16(), path = %request.path, "received response");

        if !status.is_success() {
            return Err(TransportError::Status {
                method: request.method,
                endpoint: request.path.clone(),
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|source| TransportError::Malformed {
            endpoint: request.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;

    use serde_json::Value;

    use super::{ApiRequest, Method, Transport, TransportError};

    type Reply = Result<Value, (u16, String)>;

    /// Canned responses keyed by method and full path; unknown routes answer 404.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        routes: Vec<(Method, String, Reply)>,
        requests: RefCell<Vec<ApiRequest>>,
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn on(mut self, method: Method, path: &str, body: Value) -> Self {
            self.routes.push((method, path.to_string(), Ok(body)));
            self
        }

        pub(crate) fn fail(mut self, method: Method, path: &str, status: u16) -> Self {
            self.routes
                .push((method, path.to_string(), Err((status, format!("HTTP {status}")))));
            self
        }

        pub(crate) fn requests(&self) -> Vec<ApiRequest> {
            self.requests.borrow().clone()
        }

        pub(crate) fn mutating(&self) -> Vec<ApiRequest> {
            self.requests()
                .into_iter()
                .filter(ApiRequest::is_mutating)
                .collect()
        }
    }

    impl Transport for FakeTransport {
        fn request(&self, request: &ApiRequest) -> Result<Value, TransportError> {
            self.requests.borrow_mut().push(request.clone());
            let reply = self
                .routes
                .iter()
                .find(|(method, path, _)| *method == request.method && *path == request.path)
                .map(|(_, _, reply)| reply.clone())
                .unwrap_or_else(|| Err((404, "not found".to_string())));
            reply.map_err(|(status, body)| TransportError::Status {
                method: request.method,
                endpoint: request.path.clone(),
                status,
                body,
            })
        }
    }
}
