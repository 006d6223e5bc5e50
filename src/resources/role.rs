//! LM-010: Role resource — one inline policy per synthesized role.

use crate::core::types::{Privilege, ResourceKind, ResourceNode, RoleDefinition};
use serde_json::{json, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

/// Principal allowed to assume function roles.
pub const FUNCTION_PRINCIPAL: &str = "lambda.amazonaws.com";

/// Build the role node. The role depends on every privilege target, since
/// its policy references their ARNs.
pub fn role_node(role_id: &str, role: &RoleDefinition) -> ResourceNode {
    let statements: Vec<Value> = role.privileges().iter().map(statement).collect();
    let policies = if statements.is_empty() {
        Vec::new()
    } else {
        vec![json!({
            "PolicyName": format!("{}Policy", role_id),
            "PolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": statements,
            },
        })]
    };

    let properties = json!({
        "AssumeRolePolicyDocument": {
            "Version": POLICY_VERSION,
            "Statement": [{
                "Effect": "Allow",
                "Principal": { "Service": [FUNCTION_PRINCIPAL] },
                "Action": ["sts:AssumeRole"],
            }],
        },
        "Policies": policies,
    });

    role.privileges().iter().fold(
        ResourceNode::new(role_id, ResourceKind::Role).with_properties(properties),
        |node, p| node.depends_on(p.target.logical_id.clone()),
    )
}

fn statement(privilege: &Privilege) -> Value {
    json!({
        "Effect": "Allow",
        "Action": privilege.permissions,
        "Resource": { "Fn::GetAtt": [privilege.target.logical_id, "Arn"] },
    })
}
