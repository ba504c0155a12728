use colored::Colorize;
use nsx_diff_core::format_reason;

use crate::apply::Outcome;
use crate::plan::ActionKind;
use crate::validate::ValidationIssue;

/// Render the result of an apply run for terminal output.
pub fn render_outcome(outcome: &Outcome) -> String {
    let mut out = vec![status_line(outcome)];
    if let Some(payload) = &outcome.payload {
        out.push(format!("payload: {payload}"));
    }
    out.join("\n")
}

/// Render a plan: the action, why it was chosen, and the request body.
pub fn render_plan(outcome: &Outcome) -> String {
    let mut out = vec![status_line(outcome)];
    match &outcome.reason {
        Some(reason) => out.push(format!("reason: {}", format_reason(reason)).yellow().to_string()),
        None if outcome.action == ActionKind::Create => {
            out.push("reason: not present on the manager".yellow().to_string())
        }
        None => {}
    }
    if let Some(payload) = &outcome.payload {
        out.push(format!("payload: {payload}"));
    }
    out.join("\n")
}

/// Render validation results for one desired file.
pub fn render_validation(label: &str, issues: &[ValidationIssue]) -> String {
    if issues.is_empty() {
        return format!("{} {label}", "OK".green());
    }
    let mut out = vec![format!("{} {label}: {} issue(s)", "INVALID".red(), issues.len())];
    for issue in issues {
        out.push(format!("- [{}] {}", issue.code, issue.message));
    }
    out.join("\n")
}

fn status_line(outcome: &Outcome) -> String {
    let tag = match outcome.action {
        ActionKind::Create => "+ create".green(),
        ActionKind::Update => "~ update".yellow(),
        ActionKind::Delete => "- delete".red(),
        ActionKind::NoOp => "= no_op".normal(),
    };
    match &outcome.id {
        Some(id) => format!("{tag} {} (id {id})", outcome.message),
        None => format!("{tag} {}", outcome.message),
    }
}

#[cfg(test)]
mod tests {
    use nsx_diff_core::DiffReason;
    use serde_json::json;

    use super::{render_outcome, render_plan, render_validation};
    use crate::apply::Outcome;
    use crate::plan::ActionKind;
    use crate::validate::ValidationIssue;

    fn update() -> Outcome {
        Outcome {
            resource: "FirewallSection[S1]".to_string(),
            changed: true,
            action: ActionKind::Update,
            id: Some("sec-1".to_string()),
            message: "FirewallSection[S1] would be updated".to_string(),
            payload: Some("{}".to_string()),
            reason: Some(DiffReason::Scalar {
                path: "FirewallSection[S1].rules[R1]".to_string(),
                field: "action".to_string(),
                desired: json!("DROP"),
                existing: Some(json!("ALLOW")),
            }),
        }
    }

    #[test]
    fn plan_includes_reason_and_payload() {
        colored::control::set_override(false);
        let text = render_plan(&update());
        assert!(text.starts_with("~ update FirewallSection[S1] would be updated (id sec-1)"));
        assert!(text.contains(
            "reason: FirewallSection[S1].rules[R1].action: desired \"DROP\" but found \"ALLOW\""
        ));
        assert!(text.ends_with("payload: {}"));
    }

    #[test]
    fn outcome_omits_reason() {
        colored::control::set_override(false);
        let text = render_outcome(&update());
        assert!(!text.contains("reason:"));
    }

    #[test]
    fn validation_lists_each_issue() {
        colored::control::set_override(false);
        let issues = vec![ValidationIssue {
            code: "duplicate_name".to_string(),
            message: "FirewallSection[S1].rules has duplicate display_names [R1]".to_string(),
        }];
        let text = render_validation("FirewallSection[S1]", &issues);
        assert!(text.starts_with("INVALID FirewallSection[S1]: 1 issue(s)"));
        assert!(text.contains("- [duplicate_name]"));
        assert_eq!(render_validation("Tier0[T0]", &[]), "OK Tier0[T0]");
    }
}
