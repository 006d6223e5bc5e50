//! LM-012: Artifact generation — render a compiled template as JSON.
//!
//! Resources are written in emission order. Serialization goes through
//! ordered structs rather than `serde_json::Value` so that order survives.

use super::compiler::CompiledTemplate;
use super::types::ResourceNode;
use indexmap::IndexMap;
use serde::Serialize;

pub const FORMAT_VERSION: &str = "2010-09-09";

#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: &'static str,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(rename = "Metadata")]
    metadata: Metadata<'a>,
    #[serde(rename = "Resources")]
    resources: IndexMap<&'a str, Entry<'a>>,
}

#[derive(Serialize)]
struct Metadata<'a> {
    lamina: Provenance<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Provenance<'a> {
    service: &'a str,
    stack: &'a str,
    build_id: &'a str,
    generator: String,
}

#[derive(Serialize)]
struct Entry<'a> {
    #[serde(rename = "Type")]
    resource_type: &'a str,
    #[serde(rename = "DependsOn", skip_serializing_if = "no_deps")]
    depends_on: &'a [String],
    #[serde(rename = "Properties")]
    properties: &'a serde_json::Value,
}

fn no_deps(deps: &&[String]) -> bool {
    deps.is_empty()
}

fn entry(node: &ResourceNode) -> Entry<'_> {
    Entry {
        resource_type: node.kind.type_name(),
        depends_on: &node.depends_on,
        properties: &node.properties,
    }
}

fn document(template: &CompiledTemplate) -> Document<'_> {
    Document {
        format_version: FORMAT_VERSION,
        description: template.description(),
        metadata: Metadata {
            lamina: Provenance {
                service: template.service_name(),
                stack: template.stack_name(),
                build_id: template.build_id(),
                generator: format!("lamina {}", env!("CARGO_PKG_VERSION")),
            },
        },
        resources: template
            .resources()
            .map(|node| (node.id.as_str(), entry(node)))
            .collect(),
    }
}

/// Render as a JSON value (key order not preserved).
pub fn render_value(template: &CompiledTemplate) -> Result<serde_json::Value, String> {
    serde_json::to_value(document(template)).map_err(|e| format!("serialize error: {}", e))
}

/// Render as pretty-printed JSON text, resources in emission order.
pub fn render_pretty(template: &CompiledTemplate) -> Result<String, String> {
    let mut text = serde_json::to_string_pretty(&document(template))
        .map_err(|e| format!("serialize error: {}", e))?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compiler::TemplateCompiler;
    use crate::core::decorator::DeploymentContext;
    use crate::core::types::{FunctionUnit, HandlerRef, ResourceKind, TargetRef, Verb};

    fn compiled() -> CompiledTemplate {
        let unit = FunctionUnit::new(Verb::Get, HandlerRef::new("hello::get"))
            .uses(TargetRef::new("Table", ResourceKind::Table), [Verb::Get]);
        TemplateCompiler::builder()
            .description("demo")
            .function(unit)
            .decorator_fn("table", |_, t| {
                t.add_node(crate::core::types::ResourceNode::new(
                    "Table",
                    ResourceKind::Table,
                ))?;
                Ok(())
            })
            .build()
            .compile(&mut DeploymentContext::new("svc", "b-1").with_stack_name("svc-ci"))
            .unwrap()
    }

    #[test]
    fn test_lm012_render_value_shape() {
        let value = render_value(&compiled()).unwrap();
        assert_eq!(value["AWSTemplateFormatVersion"], FORMAT_VERSION);
        assert_eq!(value["Description"], "demo");
        assert_eq!(value["Metadata"]["lamina"]["stack"], "svc-ci");
        assert_eq!(value["Metadata"]["lamina"]["buildId"], "b-1");
        assert_eq!(value["Resources"]["Table"]["Type"], "AWS::DynamoDB::Table");
        assert!(value["Resources"]["Table"].get("DependsOn").is_none());
        assert_eq!(
            value["Resources"]["HelloGet"]["DependsOn"],
            serde_json::json!(["HelloGetRole", "Table"])
        );
    }

    #[test]
    fn test_lm012_render_pretty_keeps_emission_order() {
        let text = render_pretty(&compiled()).unwrap();
        let table = text.find("\"Table\": {").unwrap();
        let role = text.find("\"HelloGetRole\": {").unwrap();
        let function = text.find("\"HelloGet\": {").unwrap();
        assert!(table < role && role < function);
        assert!(text.ends_with("}\n"));
    }
}
