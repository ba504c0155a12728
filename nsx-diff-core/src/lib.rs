//! Generic comparison primitives for NSX-style desired state.
//!
//! Desired and existing resources are handled as `serde_json::Value` trees.
//! A [`NodeSchema`] describes, per resource kind, which fields are reference
//! lists, where inline services live, which fields the manager owns, and
//! which child collections hang off the node. [`differs`] walks both trees
//! with that schema and reports the first meaningful mismatch.
//!
//! Nothing here knows about HTTP or about specific NSX resource types; the
//! reconcile crate supplies the schemas and the trees.

pub mod diff;
pub mod format;
pub mod multiset;
pub mod normalize;
pub mod schema;
pub mod signature;

pub use diff::{covers, differs, DiffError, DiffReason, DiffResult};
pub use format::{format_json, format_reason, format_result};
pub use multiset::Multiset;
pub use normalize::{normalize_node, strip_nulls, SERVER_FIELDS};
pub use schema::{Cardinality, ChildSchema, CustomServiceField, NodeSchema};
pub use signature::service_signature;
