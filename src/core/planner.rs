//! LM-014: Plan generation — diff a compiled template against the last artifact.
//!
//! Resources are compared by the BLAKE3 digest of their rendered JSON entry
//! (type, dependencies, properties). Provenance metadata is not compared, so
//! a new build id alone never produces an update.

use super::compiler::CompiledTemplate;
use super::hasher;
use super::types::*;
use serde_json::Value;

/// Generate a deployment plan. `previous` is the artifact emitted last time,
/// if any.
pub fn plan(previous: Option<&Value>, next: &CompiledTemplate) -> Result<DeploymentPlan, String> {
    let rendered = next.to_json()?;
    let empty = serde_json::Map::new();
    let before = previous
        .and_then(|doc| doc.get("Resources"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let after = rendered
        .get("Resources")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut changes = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut to_destroy = 0u32;
    let mut unchanged = 0u32;

    for id in next.order() {
        let Some(entry) = after.get(id) else {
            continue;
        };
        let action = determine_action(before.get(id), entry);
        match action {
            PlanAction::Create => to_create += 1,
            PlanAction::Update => to_update += 1,
            PlanAction::NoOp => unchanged += 1,
            PlanAction::Destroy => to_destroy += 1,
        }
        changes.push(PlannedChange {
            resource_id: id.to_string(),
            resource_type: resource_type(entry),
            action,
        });
    }

    // Destroys go last, in the previous artifact's order.
    for (id, entry) in before {
        if !after.contains_key(id) {
            to_destroy += 1;
            changes.push(PlannedChange {
                resource_id: id.clone(),
                resource_type: resource_type(entry),
                action: PlanAction::Destroy,
            });
        }
    }

    tracing::debug!(to_create, to_update, to_destroy, unchanged, "plan computed");
    Ok(DeploymentPlan {
        stack: next.stack_name().to_string(),
        changes,
        to_create,
        to_update,
        to_destroy,
        unchanged,
    })
}

fn determine_action(previous: Option<&Value>, desired: &Value) -> PlanAction {
    match previous {
        None => PlanAction::Create,
        Some(prev) if hash_resource(prev) == hash_resource(desired) => PlanAction::NoOp,
        Some(_) => PlanAction::Update,
    }
}

/// Digest of one rendered resource entry.
pub fn hash_resource(entry: &Value) -> String {
    hasher::hash_json(entry)
}

fn resource_type(entry: &Value) -> String {
    entry
        .get("Type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// Render a plan for terminal output.
pub fn format_plan(plan: &DeploymentPlan) -> String {
    let mut out = format!("Plan for stack {}:\n", plan.stack);
    for change in &plan.changes {
        let symbol = match change.action {
            PlanAction::Create => "+",
            PlanAction::Update => "~",
            PlanAction::Destroy => "-",
            PlanAction::NoOp => " ",
        };
        out.push_str(&format!(
            "  {} {} ({}) {}\n",
            symbol, change.resource_id, change.resource_type, change.action
        ));
    }
    out.push_str(&format!(
        "Plan: {} to create, {} to update, {} to destroy, {} unchanged.\n",
        plan.to_create, plan.to_update, plan.to_destroy, plan.unchanged
    ));
    out
}
