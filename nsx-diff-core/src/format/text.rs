use serde_json::Value;

use crate::diff::result::{DiffReason, DiffResult};

/// Format a diff result as one line of plain text.
pub fn format_result(result: &DiffResult) -> String {
    match result {
        DiffResult::Unchanged => "= unchanged".to_string(),
        DiffResult::Differs { reason } => format!("~ {}", format_reason(reason)),
    }
}

/// Describe where and why two trees differ.
pub fn format_reason(reason: &DiffReason) -> String {
    match reason {
        DiffReason::Scalar {
            path,
            field,
            desired,
            existing,
        } => match existing {
            Some(existing) => format!(
                "{path}.{field}: desired {} but found {}",
                compact(desired),
                compact(existing)
            ),
            None => format!("{path}.{field}: desired {} but unset", compact(desired)),
        },
        DiffReason::References {
            path,
            field,
            missing,
            unexpected,
        } => {
            let mut parts = Vec::new();
            if !missing.is_empty() {
                parts.push(format!("missing {}", missing.join(", ")));
            }
            if !unexpected.is_empty() {
                parts.push(format!("unexpected {}", unexpected.join(", ")));
            }
            format!("{path}.{field}: references differ ({})", parts.join("; "))
        }
        DiffReason::CustomServices {
            path,
            field,
            desired,
            existing,
        } => format!(
            "{path}.{field}: inline services differ (desired {desired}, existing {existing})"
        ),
        DiffReason::ChildCount {
            path,
            field,
            desired,
            existing,
        } => format!("{path}.{field}: desired {desired} entries, found {existing}"),
        DiffReason::MissingChild { path, field, key } => {
            format!("{path}.{field}[{key}]: not present")
        }
    }
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}
