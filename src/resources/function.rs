//! LM-009: Function resource — handler, limits, role and discovery env.

use crate::core::discovery::{DiscoveryInfo, DISCOVERY_VAR};
use crate::core::types::{FunctionUnit, ResourceKind, ResourceNode};
use serde_json::json;

/// Build the function node. Limits pass through unchanged.
pub fn function_node(function_id: &str, unit: &FunctionUnit, role_id: &str) -> ResourceNode {
    let properties = json!({
        "Description": format!("{} {}", unit.trigger, unit.handler),
        "Handler": unit.handler.as_str(),
        "MemorySize": unit.limits.memory_mb,
        "Timeout": unit.limits.timeout_secs,
        "Role": { "Fn::GetAtt": [role_id, "Arn"] },
    });

    unit.depends_on.iter().fold(
        ResourceNode::new(function_id, ResourceKind::Function)
            .with_properties(properties)
            .depends_on(role_id),
        |node, dep| node.depends_on(dep.clone()),
    )
}

/// Write the discovery mapping into the function's environment.
pub fn attach_discovery(node: &mut ResourceNode, info: &DiscoveryInfo) {
    if let Some(props) = node.properties.as_object_mut() {
        props.insert(
            "Environment".to_string(),
            json!({
                "Variables": {
                    DISCOVERY_VAR: { "Fn::Sub": info.to_substitution() },
                },
            }),
        );
    }
}
