use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// First mismatch found between a desired and an existing tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DiffReason {
    /// A desired scalar is absent from, or not equal to, the existing value.
    Scalar {
        path: String,
        field: String,
        desired: Value,
        existing: Option<Value>,
    },
    /// Reference multisets differ; entries are `type:id` keys.
    References {
        path: String,
        field: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    /// Inline service signatures differ.
    CustomServices {
        path: String,
        field: String,
        desired: usize,
        existing: usize,
    },
    /// Child collections hold a different number of entries.
    ChildCount {
        path: String,
        field: String,
        desired: usize,
        existing: usize,
    },
    /// A desired child has no existing counterpart.
    MissingChild {
        path: String,
        field: String,
        key: String,
    },
}

impl DiffReason {
    /// Path of the node where the mismatch was found.
    pub fn path(&self) -> &str {
        match self {
            DiffReason::Scalar { path, .. }
            | DiffReason::References { path, .. }
            | DiffReason::CustomServices { path, .. }
            | DiffReason::ChildCount { path, .. }
            | DiffReason::MissingChild { path, .. } => path,
        }
    }
}

/// Outcome of comparing one desired tree with one existing tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DiffResult {
    Unchanged,
    Differs { reason: DiffReason },
}

impl DiffResult {
    pub fn differs(&self) -> bool {
        matches!(self, DiffResult::Differs { .. })
    }

    pub fn reason(&self) -> Option<&DiffReason> {
        match self {
            DiffResult::Unchanged => None,
            DiffResult::Differs { reason } => Some(reason),
        }
    }
}

/// Input trees that do not have the shape the schema describes.
#[derive(Debug, Error, PartialEq)]
pub enum DiffError {
    #[error("expected an object at {path}")]
    NotAnObject { path: String },
    #[error("expected a list at {path}")]
    NotAList { path: String },
}
