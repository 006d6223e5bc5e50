//! LM-003: Privilege synthesis — minimal role definitions from the taxonomy.
//!
//! Verbs are accumulated per target with set semantics; the final permission
//! list follows the taxonomy's declaration order, so the same verb set in any
//! order produces the same role.

use super::taxonomy::Taxonomy;
use super::types::{Access, Privilege, RoleDefinition, TargetRef, Verb};
use std::collections::BTreeSet;

/// Synthesize the role granting `verbs` on a single target.
///
/// A verb with no taxonomy rule contributes nothing. If no verb contributes
/// anything the role has zero privileges, which denotes no access.
pub fn synthesize(
    taxonomy: &Taxonomy,
    target: &TargetRef,
    verbs: impl IntoIterator<Item = Verb>,
) -> RoleDefinition {
    let mut role = RoleDefinition::default();
    if let Some(privilege) = privilege_for(taxonomy, target, verbs) {
        role.privileges.push(privilege);
    }
    role
}

/// Synthesize one role covering every access entry of a function.
///
/// Entries naming the same logical id are merged into a single privilege;
/// the kind of the first entry for an id wins. Privileges appear in the
/// order their targets were first requested.
pub fn synthesize_role(taxonomy: &Taxonomy, access: &[Access]) -> RoleDefinition {
    let mut grouped: Vec<(&TargetRef, BTreeSet<Verb>)> = Vec::new();
    for entry in access {
        match grouped
            .iter_mut()
            .find(|(t, _)| t.logical_id == entry.target.logical_id)
        {
            Some((_, verbs)) => verbs.extend(entry.verbs.iter().copied()),
            None => grouped.push((&entry.target, entry.verbs.iter().copied().collect())),
        }
    }

    let mut role = RoleDefinition::default();
    for (target, verbs) in grouped {
        match privilege_for(taxonomy, target, verbs.iter().copied()) {
            Some(privilege) => role.privileges.push(privilege),
            None => tracing::warn!(
                target_id = %target.logical_id,
                kind = %target.kind,
                verbs = ?verbs,
                "no taxonomy rule grants these verbs; target receives no permissions"
            ),
        }
    }
    role
}

fn privilege_for(
    taxonomy: &Taxonomy,
    target: &TargetRef,
    verbs: impl IntoIterator<Item = Verb>,
) -> Option<Privilege> {
    let mut granted: BTreeSet<&'static str> = BTreeSet::new();
    for verb in verbs {
        granted.extend(taxonomy.actions_for(verb, &target.kind).iter().copied());
    }
    if granted.is_empty() {
        return None;
    }

    let permissions = taxonomy
        .declared_order(&target.kind)
        .into_iter()
        .filter(|p| granted.contains(p))
        .map(str::to_string)
        .collect();
    Some(Privilege {
        target: target.clone(),
        permissions,
    })
}
