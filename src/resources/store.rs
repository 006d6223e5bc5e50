//! LM-011: Backing stores and the decorator that injects them.
//!
//! Stores are added by a decorator rather than up front, mirroring how
//! hand-declared infrastructure joins the template: functions may reference a
//! store before it exists, and the reference is resolved at validation.

use crate::core::decorator::{Decorator, DeploymentContext};
use crate::core::error::DecoratorError;
use crate::core::graph::Template;
use crate::core::types::{ResourceNode, StoreDecl};
use indexmap::IndexMap;

/// Build a store node from its declaration. Properties are opaque.
pub fn store_node(id: &str, decl: &StoreDecl) -> ResourceNode {
    let properties = match &decl.properties {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    decl.depends_on.iter().fold(
        ResourceNode::new(id, decl.kind.clone()).with_properties(properties),
        |node, dep| node.depends_on(dep.clone()),
    )
}

/// Adds every declared store to the template, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct StoreDecorator {
    stores: IndexMap<String, StoreDecl>,
}

impl StoreDecorator {
    pub const NAME: &'static str = "stores";

    pub fn new(stores: IndexMap<String, StoreDecl>) -> Self {
        Self { stores }
    }
}

impl Decorator for StoreDecorator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn decorate(
        &self,
        ctx: &mut DeploymentContext,
        template: &mut Template,
    ) -> Result<(), DecoratorError> {
        for (id, decl) in &self.stores {
            template.add_node(store_node(id, decl))?;
        }
        ctx.insert(
            Self::NAME,
            serde_json::json!(self.stores.keys().collect::<Vec<_>>()),
        );
        Ok(())
    }
}
