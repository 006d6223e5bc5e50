//! LM-013: Template compilation — roles, graph, decorators, validation.
//!
//! A compile pass runs three steps, each a precondition for the next:
//!
//! 1. derive ids, synthesize a role per function, and register function and
//!    role nodes (edges to stores may dangle at this point);
//! 2. run the decorator pipeline against the partial template;
//! 3. validate the graph and freeze the result in emission order.
//!
//! The pass is all-or-nothing: any error ends it and no template is returned.

use super::codegen;
use super::decorator::{Decorator, DecoratorPipeline, DeploymentContext};
use super::discovery::DiscoveryInfo;
use super::error::{CompileError, DecoratorError, GraphError};
use super::graph::Template;
use super::hasher;
use super::identifier;
use super::privilege;
use super::taxonomy::Taxonomy;
use super::types::{
    FunctionDecl, FunctionUnit, HandlerRef, LaminaConfig, ResourceLimits, ResourceNode,
    RoleDefinition, TargetRef, Verb,
};
use crate::resources::{function, role, store::StoreDecorator};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Accumulates function units and decorators; no global registry.
#[derive(Debug, Default)]
pub struct CompilerBuilder {
    taxonomy: Taxonomy,
    description: Option<String>,
    functions: Vec<FunctionUnit>,
    pipeline: DecoratorPipeline,
}

impl CompilerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for a parsed config: every function in declaration order, and
    /// the store decorator registered first.
    pub fn from_config(config: &LaminaConfig) -> Self {
        let mut builder = Self::new().decorator(StoreDecorator::new(config.stores.clone()));
        if let Some(ref description) = config.description {
            builder = builder.description(description.clone());
        }
        for (verb, decl) in &config.functions {
            builder = builder.function(function_unit(*verb, decl, config));
        }
        builder
    }

    pub fn taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn function(mut self, unit: FunctionUnit) -> Self {
        self.functions.push(unit);
        self
    }

    pub fn decorator(mut self, decorator: impl Decorator + 'static) -> Self {
        self.pipeline.register(decorator);
        self
    }

    pub fn decorator_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut DeploymentContext, &mut Template) -> Result<(), DecoratorError> + 'static,
    {
        self.pipeline.register_fn(name, f);
        self
    }

    pub fn build(self) -> TemplateCompiler {
        TemplateCompiler {
            taxonomy: self.taxonomy,
            description: self.description,
            functions: self.functions,
            pipeline: self.pipeline,
        }
    }
}

fn function_unit(verb: Verb, decl: &FunctionDecl, config: &LaminaConfig) -> FunctionUnit {
    let verbs = if decl.verbs.is_empty() {
        vec![verb]
    } else {
        decl.verbs.clone()
    };
    let mut unit = FunctionUnit::new(verb, HandlerRef::new(decl.handler.clone())).with_limits(
        ResourceLimits {
            memory_mb: decl.memory,
            timeout_secs: decl.timeout,
        },
    );
    for id in &decl.uses {
        unit = match config.stores.get(id) {
            Some(store) => unit.uses(TargetRef::new(id.clone(), store.kind.clone()), verbs.clone()),
            // Left dangling; validation reports it as an unknown node.
            None => unit.depends_on(id.clone()),
        };
    }
    for dep in &decl.depends_on {
        unit = unit.depends_on(dep.clone());
    }
    unit
}

/// A configured compiler, ready for one pass.
#[derive(Debug)]
pub struct TemplateCompiler {
    taxonomy: Taxonomy,
    description: Option<String>,
    functions: Vec<FunctionUnit>,
    pipeline: DecoratorPipeline,
}

impl TemplateCompiler {
    pub fn builder() -> CompilerBuilder {
        CompilerBuilder::new()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn decorator_names(&self) -> Vec<&str> {
        self.pipeline.names()
    }

    /// Run one compile pass. Consumes the function units.
    pub fn compile(self, ctx: &mut DeploymentContext) -> Result<CompiledTemplate, CompileError> {
        let _span = tracing::info_span!("compile", stack = ctx.stack_name()).entered();
        let mut template = Template::new();

        let functions = register_functions(&self.taxonomy, self.functions, &mut template)?;
        self.pipeline.run(ctx, &mut template)?;
        let order = template.validate()?;

        let compiled = freeze(&template, &order, functions, self.description, ctx);
        tracing::info!(
            resources = compiled.len(),
            functions = compiled.roles.len(),
            "template compiled"
        );
        Ok(compiled)
    }
}

/// Compile `functions` through `pipeline` with the built-in taxonomy.
pub fn compile(
    functions: Vec<FunctionUnit>,
    pipeline: DecoratorPipeline,
    ctx: &mut DeploymentContext,
) -> Result<CompiledTemplate, CompileError> {
    TemplateCompiler {
        taxonomy: Taxonomy::builtin(),
        description: None,
        functions,
        pipeline,
    }
    .compile(ctx)
}

struct Registered {
    id: String,
    role_id: String,
    role: RoleDefinition,
}

fn register_functions(
    taxonomy: &Taxonomy,
    functions: Vec<FunctionUnit>,
    template: &mut Template,
) -> Result<Vec<Registered>, CompileError> {
    let mut owners: BTreeMap<String, HandlerRef> = BTreeMap::new();
    let mut registered = Vec::with_capacity(functions.len());

    for mut unit in functions {
        let id = identifier::function_id(&unit.handler)?;
        let role_id = identifier::role_id(&id)?;
        for claimed in [&id, &role_id] {
            if let Some(owner) = owners.get(claimed) {
                return Err(GraphError::InvalidIdentifier {
                    id: claimed.clone(),
                    reason: format!(
                        "handlers '{}' and '{}' derive the same id",
                        owner, unit.handler
                    ),
                }
                .into());
            }
        }
        owners.insert(id.clone(), unit.handler.clone());
        owners.insert(role_id.clone(), unit.handler.clone());

        unit.role = privilege::synthesize_role(taxonomy, &unit.access);
        tracing::debug!(
            function = %id,
            trigger = %unit.trigger,
            privileges = unit.role().privileges().len(),
            "role synthesized"
        );

        template.add_node(role::role_node(&role_id, unit.role()))?;
        template.add_node(function::function_node(&id, &unit, &role_id))?;
        registered.push(Registered {
            id,
            role_id,
            role: unit.role,
        });
    }
    Ok(registered)
}

fn freeze(
    template: &Template,
    order: &[String],
    functions: Vec<Registered>,
    description: Option<String>,
    ctx: &DeploymentContext,
) -> CompiledTemplate {
    let graph = template.graph();
    let mut resources: IndexMap<String, ResourceNode> = order
        .iter()
        .filter_map(|id| graph.get(id))
        .map(|node| {
            let mut node = node.clone();
            node.depends_on = graph
                .dependencies_of(&node.id)
                .into_iter()
                .map(str::to_string)
                .collect();
            (node.id.clone(), node)
        })
        .collect();

    let mut discovery = BTreeMap::new();
    let mut roles = IndexMap::new();
    for f in functions {
        let info = resources
            .get(&f.id)
            .map(|node| {
                node.depends_on
                    .iter()
                    .filter(|dep| **dep != f.role_id)
                    .filter_map(|dep| resources.get(dep))
                    .fold(DiscoveryInfo::new(), |info, dep| {
                        info.with(dep.id.clone(), dep.kind.type_name(), dep.id.clone())
                    })
            })
            .unwrap_or_default();
        if let Some(node) = resources.get_mut(&f.id) {
            function::attach_discovery(node, &info);
        }
        discovery.insert(f.id.clone(), info);
        roles.insert(f.id, f.role);
    }

    CompiledTemplate {
        description,
        service: ctx.service_name().to_string(),
        stack: ctx.stack_name().to_string(),
        build_id: ctx.build_id().to_string(),
        resources,
        roles,
        discovery,
    }
}

/// A validated, frozen template. Resources are in emission order and each
/// node's `depends_on` lists every resolved dependency.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    description: Option<String>,
    service: String,
    stack: String,
    build_id: String,
    resources: IndexMap<String, ResourceNode>,
    roles: IndexMap<String, RoleDefinition>,
    discovery: BTreeMap<String, DiscoveryInfo>,
}

impl CompiledTemplate {
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn stack_name(&self) -> &str {
        &self.stack
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// Logical ids in emission order.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceNode> {
        self.resources.values()
    }

    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.resources.get(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Synthesized role of a function, by function id.
    pub fn role(&self, function_id: &str) -> Option<&RoleDefinition> {
        self.roles.get(function_id)
    }

    /// Function ids in registration order.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// The discovery mapping injected into a function.
    pub fn discovery(&self, function_id: &str) -> Option<&DiscoveryInfo> {
        self.discovery.get(function_id)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, String> {
        codegen::render_value(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, String> {
        codegen::render_pretty(self)
    }

    /// Digest of the resources only; provenance metadata does not count.
    pub fn digest(&self) -> String {
        let resources: serde_json::Map<String, serde_json::Value> = self
            .resources
            .values()
            .map(|n| {
                (
                    n.id.clone(),
                    serde_json::json!({
                        "type": n.kind.type_name(),
                        "dependsOn": n.depends_on,
                        "properties": n.properties,
                    }),
                )
            })
            .collect();
        hasher::hash_json(&serde_json::Value::Object(resources))
    }
}
