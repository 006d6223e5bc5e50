//! LM-005: Decorator pipeline — ordered hooks that append to the template.
//!
//! Decorators run synchronously, once each, in registration order. Each one
//! sees the shared [`DeploymentContext`] and the in-progress [`Template`].
//! A failing decorator stops the pipeline; whatever it appended is rolled
//! back before the error is returned.

use super::error::{CompileError, DecoratorError, DecoratorFailure};
use super::graph::Template;
use std::collections::BTreeMap;

/// Target account/session handle, passed through to decorators untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub profile: Option<String>,
    pub region: Option<String>,
}

/// Per-pass deployment context shared by every decorator.
///
/// Identity fields are fixed at construction; the key/value side-channel is
/// the only part decorators may write.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    service_name: String,
    stack_name: String,
    build_id: String,
    session: Session,
    dry_run: bool,
    values: BTreeMap<String, serde_json::Value>,
}

impl DeploymentContext {
    pub fn new(service_name: impl Into<String>, build_id: impl Into<String>) -> Self {
        let service_name = service_name.into();
        Self {
            stack_name: service_name.clone(),
            service_name,
            build_id: build_id.into(),
            session: Session::default(),
            dry_run: false,
            values: BTreeMap::new(),
        }
    }

    pub fn with_stack_name(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = stack_name.into();
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Advisory: decorators must not cause external effects when set.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Store a value for later decorators; returns the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.values.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.values
    }
}

/// A template-mutation hook.
pub trait Decorator {
    /// Name used in logs and in [`DecoratorFailure`].
    fn name(&self) -> &str;

    fn decorate(
        &self,
        ctx: &mut DeploymentContext,
        template: &mut Template,
    ) -> Result<(), DecoratorError>;
}

/// Adapts a closure into a [`Decorator`].
pub struct FnDecorator<F> {
    name: String,
    f: F,
}

impl<F> Decorator for FnDecorator<F>
where
    F: Fn(&mut DeploymentContext, &mut Template) -> Result<(), DecoratorError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn decorate(
        &self,
        ctx: &mut DeploymentContext,
        template: &mut Template,
    ) -> Result<(), DecoratorError> {
        (self.f)(ctx, template)
    }
}

/// Wrap a closure as a named decorator.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnDecorator<F>
where
    F: Fn(&mut DeploymentContext, &mut Template) -> Result<(), DecoratorError>,
{
    FnDecorator {
        name: name.into(),
        f,
    }
}

/// Registered decorators, run in registration order.
#[derive(Default)]
pub struct DecoratorPipeline {
    stages: Vec<Box<dyn Decorator>>,
}

impl std::fmt::Debug for DecoratorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl DecoratorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, decorator: impl Decorator + 'static) {
        self.stages.push(Box::new(decorator));
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut DeploymentContext, &mut Template) -> Result<(), DecoratorError> + 'static,
    {
        self.register(from_fn(name, f));
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|d| d.name()).collect()
    }

    /// Run every stage in order, stopping at the first failure.
    ///
    /// A rejected graph mutation surfaces as that [`GraphError`]
    /// (e.g. `DuplicateIdentifier`); any other failure is wrapped in
    /// [`DecoratorFailure`]. Either way the failing stage's additions are
    /// discarded.
    ///
    /// [`GraphError`]: super::error::GraphError
    pub fn run(
        &self,
        ctx: &mut DeploymentContext,
        template: &mut Template,
    ) -> Result<(), CompileError> {
        for stage in &self.stages {
            let before = template.len();
            let _span = tracing::info_span!("decorator", name = stage.name()).entered();

            if let Err(err) = template.transaction(|t| stage.decorate(ctx, t)) {
                tracing::warn!(error = %err, "decorator failed; stage additions discarded");
                return Err(match err {
                    DecoratorError::Graph(e) => CompileError::Graph(e),
                    source => CompileError::Decorator(DecoratorFailure {
                        decorator: stage.name().to_string(),
                        source,
                    }),
                });
            }
            tracing::info!(added = template.len() - before, "decorator applied");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GraphError;
    use crate::core::types::{ResourceKind, ResourceNode};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ctx() -> DeploymentContext {
        DeploymentContext::new("svc", "b-1")
    }

    #[test]
    fn test_lm005_context_accessors() {
        let mut c = ctx()
            .with_stack_name("svc-alice")
            .with_dry_run(true)
            .with_session(Session {
                profile: Some("dev".into()),
                region: Some("us-west-2".into()),
            });
        assert_eq!(c.service_name(), "svc");
        assert_eq!(c.stack_name(), "svc-alice");
        assert_eq!(c.build_id(), "b-1");
        assert!(c.dry_run());
        assert_eq!(c.session().region.as_deref(), Some("us-west-2"));
        assert!(c.insert("k", serde_json::json!(1)).is_none());
        assert_eq!(c.insert("k", serde_json::json!(2)), Some(serde_json::json!(1)));
        assert_eq!(c.get("k"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_lm005_runs_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = DecoratorPipeline::new();
        for name in ["first", "second", "third"] {
            let seen = Rc::clone(&seen);
            pipeline.register_fn(name, move |_, _| {
                seen.borrow_mut().push(name);
                Ok(())
            });
        }
        let mut template = Template::new();
        pipeline.run(&mut ctx(), &mut template).unwrap();
        assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);
        assert_eq!(pipeline.names(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_lm005_side_channel_between_stages() {
        let mut pipeline = DecoratorPipeline::new();
        pipeline.register_fn("producer", |ctx, _| {
            ctx.insert("table", serde_json::json!("Orders"));
            Ok(())
        });
        pipeline.register_fn("consumer", |ctx, template| {
            let id = ctx
                .get("table")
                .and_then(|v| v.as_str())
                .ok_or_else(|| DecoratorError::msg("producer did not run"))?
                .to_string();
            template.add_node(ResourceNode::new(id, ResourceKind::Table))?;
            Ok(())
        });
        let mut template = Template::new();
        pipeline.run(&mut ctx(), &mut template).unwrap();
        assert!(template.contains("Orders"));
    }

    #[test]
    fn test_lm005_failure_aborts_and_rolls_back() {
        let ran_after = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran_after);
        let mut pipeline = DecoratorPipeline::new();
        pipeline.register_fn("ok", |_, t| {
            t.add_node(ResourceNode::new("Kept", ResourceKind::Queue))?;
            Ok(())
        });
        pipeline.register_fn("broken", |_, t| {
            t.add_node(ResourceNode::new("Partial", ResourceKind::Queue))?;
            t.add_edge("Partial", "Kept");
            Err(DecoratorError::msg("quota exceeded"))
        });
        pipeline.register_fn("never", move |_, _| {
            *flag.borrow_mut() = true;
            Ok(())
        });

        let mut template = Template::new();
        let err = pipeline.run(&mut ctx(), &mut template).unwrap_err();
        match err {
            CompileError::Decorator(DecoratorFailure { decorator, .. }) => {
                assert_eq!(decorator, "broken");
            }
            other => panic!("expected decorator failure, got {:?}", other),
        }
        assert!(!*ran_after.borrow());
        assert_eq!(template.len(), 1);
        assert!(template.contains("Kept"));
        assert_eq!(template.graph().edge_count(), 0);
    }

    #[test]
    fn test_lm005_duplicate_surfaces_as_graph_error() {
        let mut pipeline = DecoratorPipeline::new();
        pipeline.register_fn("colliding", |_, t| {
            t.add_node(ResourceNode::new("Fresh", ResourceKind::Topic))?;
            t.add_node(ResourceNode::new("Existing", ResourceKind::Topic))?;
            Ok(())
        });

        let mut template = Template::new();
        template
            .add_node(ResourceNode::new("Existing", ResourceKind::Table))
            .unwrap();
        let err = pipeline.run(&mut ctx(), &mut template).unwrap_err();
        assert_eq!(
            err.graph_error(),
            Some(&GraphError::DuplicateIdentifier {
                id: "Existing".into()
            })
        );
        assert_eq!(template.len(), 1);
        assert_eq!(template.get("Existing").unwrap().kind, ResourceKind::Table);
    }

    struct DryRunAware {
        calls: Rc<RefCell<u32>>,
    }

    impl Decorator for DryRunAware {
        fn name(&self) -> &str {
            "external"
        }

        fn decorate(
            &self,
            ctx: &mut DeploymentContext,
            _template: &mut Template,
        ) -> Result<(), DecoratorError> {
            if !ctx.dry_run() {
                *self.calls.borrow_mut() += 1;
            }
            Ok(())
        }
    }

    #[test]
    fn test_lm005_trait_decorator_sees_dry_run() {
        let calls = Rc::new(RefCell::new(0));
        let mut pipeline = DecoratorPipeline::new();
        pipeline.register(DryRunAware {
            calls: Rc::clone(&calls),
        });
        let mut template = Template::new();
        pipeline
            .run(&mut ctx().with_dry_run(true), &mut template)
            .unwrap();
        assert_eq!(*calls.borrow(), 0);
        pipeline.run(&mut ctx(), &mut template).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }
}
