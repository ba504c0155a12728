//! One reconciliation run: validate, resolve, fetch, diff, plan, apply.

use nsx_diff_core::{DiffError, DiffReason};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::apply::{execute, ApplyError, Outcome, Step};
use crate::capabilities::{detect, CapabilityError};
use crate::catalog::{snapshot, snapshot_in};
use crate::model::{DesiredResource, ResolvedReference, SectionSpec, State, Tier0Spec};
use crate::plan::{choose_action, resolve_placement, ActionKind, Existing, PlanAction};
use crate::remote::{
    fetch_section_tree, fetch_tier0_tree, get_optional, list_all, list_sections, INFRA_PATH,
    SECTIONS_PATH, TIER0S_PATH,
};
use crate::resolve::{
    find_by_display_name, resolve_section, resolve_tier0, section_lookup_types,
    tier0_enforcement_points, tier0_lookup_types, ResolveError,
};
use crate::schemas::{section_schema, tier0_schema};
use crate::transport::{ApiRequest, Transport, TransportError};
use crate::validate::{validate, ValidationError};
use crate::wire::{section_body, tier0_body, tier0_delete_body, tier0_id};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to compare desired and existing state: {0}")]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error("failed to serialize request body: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReconcileError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Apply(ApplyError::Conflict { .. }))
    }
}

/// Bring one resource on the manager in line with `desired`.
///
/// At most one mutating call is issued. With `check` set, the whole pipeline
/// runs and the outcome carries the body that would have been sent.
pub fn reconcile(
    transport: &dyn Transport,
    desired: DesiredResource,
    check: bool,
) -> Result<Outcome, ReconcileError> {
    validate(&desired)?;
    let label = desired.label();
    info!(resource = %label, state = ?desired.state(), check, "reconciling");

    let step = match desired {
        DesiredResource::FirewallSection(spec) => plan_section(transport, spec)?,
        DesiredResource::Tier0(spec) => plan_tier0(transport, spec)?,
    };
    info!(resource = %label, action = %step.kind, "planned");

    Ok(execute(transport, &label, step, check)?)
}

fn plan_section(transport: &dyn Transport, spec: SectionSpec) -> Result<Step, ReconcileError> {
    let sections = list_sections(transport)?;
    let existing = find_by_display_name(&sections, "FirewallSection", &spec.display_name)?;
    let found = existing.and_then(Existing::from_value);

    if spec.state.is_absent() {
        return Ok(match choose_action(State::Absent, found.as_ref(), false) {
            PlanAction::Delete { id } => delete_section(id),
            other => Step::no_op(other.id().map(str::to_string), None),
        });
    }

    let capabilities = detect(transport)?;
    let mut spec = spec;
    capabilities.gate_section(&mut spec);
    let allowed = capabilities.firewall_catalog_types();
    let kinds: Vec<_> = section_lookup_types(&spec)
        .into_iter()
        .filter(|kind| allowed.contains(kind))
        .collect();
    let catalog = snapshot(transport, &kinds)?;
    let resolved = resolve_section(spec, &catalog)?;

    let (differs, reason) = match existing {
        Some(section) => {
            let tree = fetch_section_tree(transport, section)?;
            compare(&serde_json::to_value(&resolved)?, &tree, &section_schema())?
        }
        None => (true, None),
    };

    Ok(match choose_action(State::Present, found.as_ref(), differs) {
        PlanAction::Create => create_section(&resolved, &sections, reason)?,
        PlanAction::Update { id, revision } => {
            let body = section_body(&resolved, revision)?;
            let path = format!("{SECTIONS_PATH}/{id}?action=update_with_rules");
            Step {
                kind: ActionKind::Update,
                id: Some(id),
                request: Some(ApiRequest::post(path, body)),
                reason,
            }
        }
        PlanAction::NoOp { id } => Step::no_op(id, reason),
        PlanAction::Delete { id } => delete_section(id),
    })
}

fn create_section(
    resolved: &SectionSpec<ResolvedReference>,
    sections: &[Value],
    reason: Option<DiffReason>,
) -> Result<Step, ReconcileError> {
    let query = match &resolved.section_placement {
        Some(placement) => resolve_placement(placement, sections)?.to_query(),
        None => String::new(),
    };
    let path = format!("{SECTIONS_PATH}?action=create_with_rules{query}");
    Ok(Step {
        kind: ActionKind::Create,
        id: None,
        request: Some(ApiRequest::post(path, section_body(resolved, None)?)),
        reason,
    })
}

fn delete_section(id: String) -> Step {
    let path = format!("{SECTIONS_PATH}/{id}?cascade=true");
    Step::delete(id, ApiRequest::delete(path))
}

fn plan_tier0(transport: &dyn Transport, spec: Tier0Spec) -> Result<Step, ReconcileError> {
    let existing = find_tier0(transport, &spec)?;
    let found = existing.as_ref().and_then(Existing::from_value);
    let tree = match &existing {
        Some(tier0) => Some(fetch_tier0_tree(transport, tier0)?),
        None => None,
    };

    if spec.state.is_absent() {
        return Ok(match (choose_action(State::Absent, found.as_ref(), false), &tree) {
            (PlanAction::Delete { id }, Some(tree)) => {
                Step::delete(id, ApiRequest::patch(INFRA_PATH, tier0_delete_body(tree)?))
            }
            (other, _) => Step::no_op(other.id().map(str::to_string), None),
        });
    }

    let catalog = snapshot_in(
        transport,
        &tier0_lookup_types(&spec),
        &tier0_enforcement_points(&spec),
    )?;
    let resolved = resolve_tier0(spec, &catalog)?;

    let (differs, reason) = match &tree {
        Some(tree) => {
            let desired = serde_json::to_value(resolved.without_absent_children())?;
            compare(&desired, tree, &tier0_schema())?
        }
        None => (true, None),
    };

    Ok(match choose_action(State::Present, found.as_ref(), differs) {
        PlanAction::Create => Step {
            kind: ActionKind::Create,
            id: Some(tier0_id(&resolved, None)),
            request: Some(ApiRequest::patch(INFRA_PATH, tier0_body(&resolved, None, None)?)),
            reason,
        },
        PlanAction::Update { id, revision } => Step {
            kind: ActionKind::Update,
            id: Some(id),
            request: Some(ApiRequest::patch(
                INFRA_PATH,
                tier0_body(&resolved, tree.as_ref(), revision)?,
            )),
            reason,
        },
        PlanAction::NoOp { id } => Step::no_op(id, reason),
        PlanAction::Delete { id } => {
            let body = match &tree {
                Some(tree) => tier0_delete_body(tree)?,
                None => tier0_delete_body(&serde_json::json!({ "id": id.as_str() }))?,
            };
            Step::delete(id, ApiRequest::patch(INFRA_PATH, body))
        }
    })
}

/// Existing Tier-0 by id when one is given, otherwise by display name.
fn find_tier0(transport: &dyn Transport, spec: &Tier0Spec) -> Result<Option<Value>, ReconcileError> {
    if let Some(id) = &spec.id {
        return Ok(get_optional(transport, &format!("{TIER0S_PATH}/{id}"))?);
    }
    let Some(name) = spec.display_name.as_deref() else {
        return Ok(None);
    };
    let tier0s = list_all(transport, TIER0S_PATH)?;
    Ok(find_by_display_name(&tier0s, "Tier0", name)?.cloned())
}

fn compare(
    desired: &Value,
    existing: &Value,
    schema: &nsx_diff_core::NodeSchema,
) -> Result<(bool, Option<DiffReason>), DiffError> {
    let result = nsx_diff_core::differs(desired, existing, schema)?;
    Ok((result.differs(), result.reason().cloned()))
}
