use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::model::firewall::{Placement, PlacementOperation};
use crate::model::State;
use crate::remote::{object_id, object_revision};
use crate::resolve::{find_by_display_name, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    NoOp,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::NoOp => "no_op",
            ActionKind::Delete => "delete",
        })
    }
}

/// Identity and revision of the remote object found for a desired resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Existing {
    pub id: String,
    pub revision: Option<u64>,
}

impl Existing {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            id: object_id(value)?,
            revision: object_revision(value),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update { id: String, revision: Option<u64> },
    NoOp { id: Option<String> },
    Delete { id: String },
}

impl PlanAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            PlanAction::Create => ActionKind::Create,
            PlanAction::Update { .. } => ActionKind::Update,
            PlanAction::NoOp { .. } => ActionKind::NoOp,
            PlanAction::Delete { .. } => ActionKind::Delete,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            PlanAction::Create => None,
            PlanAction::Update { id, .. } | PlanAction::Delete { id } => Some(id),
            PlanAction::NoOp { id } => id.as_deref(),
        }
    }
}

/// Pick the single action for one top-level resource.
pub fn choose_action(state: State, existing: Option<&Existing>, differs: bool) -> PlanAction {
    match (state, existing) {
        (State::Present, None) => PlanAction::Create,
        (State::Present, Some(found)) if differs => PlanAction::Update {
            id: found.id.clone(),
            revision: found.revision,
        },
        (State::Present, Some(found)) => PlanAction::NoOp {
            id: Some(found.id.clone()),
        },
        (State::Absent, Some(found)) => PlanAction::Delete {
            id: found.id.clone(),
        },
        (State::Absent, None) => PlanAction::NoOp { id: None },
    }
}

/// Query-string form of a placement directive for the create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementQuery {
    pub operation: PlacementOperation,
    pub anchor_id: Option<String>,
}

impl PlacementQuery {
    pub fn to_query(&self) -> String {
        match &self.anchor_id {
            Some(id) => format!("&operation={}&id={id}", self.operation.as_str()),
            None => format!("&operation={}", self.operation.as_str()),
        }
    }
}

/// Resolve the anchor section of a placement against the current section listing.
pub fn resolve_placement(
    placement: &Placement,
    sections: &[Value],
) -> Result<PlacementQuery, ResolveError> {
    if !placement.operation.needs_anchor() {
        return Ok(PlacementQuery {
            operation: placement.operation,
            anchor_id: None,
        });
    }

    let name = placement.display_name.as_deref().unwrap_or_default();
    let anchor = find_by_display_name(sections, "FirewallSection", name)?
        .and_then(object_id)
        .ok_or_else(|| ResolveError::AnchorNotFound {
            name: name.to_string(),
            operation: placement.operation.as_str(),
        })?;
    Ok(PlacementQuery {
        operation: placement.operation,
        anchor_id: Some(anchor),
    })
}
