//! LM-007: Error taxonomy for graph building, decorators and compilation.

use thiserror::Error;

/// Violations of the template graph's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node with this logical id already exists.
    #[error("duplicate logical id '{id}'")]
    DuplicateIdentifier { id: String },

    /// An edge endpoint was never added to the graph.
    #[error("'{from}' depends on '{to}', but '{missing}' is not in the template")]
    UnknownNode {
        from: String,
        to: String,
        missing: String,
    },

    /// The listed ids form a dependency cycle, in dependency order.
    #[error("dependency cycle detected involving: {}", cycle.join(", "))]
    CyclicDependency { cycle: Vec<String> },

    /// The id cannot be made a legal, unique logical identifier.
    #[error("invalid identifier '{id}': {reason}")]
    InvalidIdentifier { id: String, reason: String },
}

/// What a decorator may return on failure.
#[derive(Debug, Error)]
pub enum DecoratorError {
    /// A graph mutation was rejected.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl DecoratorError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

/// A decorator aborted the compile pass.
#[derive(Debug, Error)]
#[error("decorator '{decorator}' failed: {source}")]
pub struct DecoratorFailure {
    pub decorator: String,
    pub source: DecoratorError,
}

/// Terminal error of a compile pass. No artifact accompanies it.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compile failed: {0}")]
    Graph(#[from] GraphError),

    #[error("compile failed: {0}")]
    Decorator(#[from] DecoratorFailure),
}

impl CompileError {
    /// The graph error behind this failure, if it was one.
    pub fn graph_error(&self) -> Option<&GraphError> {
        match self {
            Self::Graph(e) => Some(e),
            Self::Decorator(_) => None,
        }
    }
}

/// Failure to load an injected discovery mapping at startup.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery variable {0} is not set")]
    Missing(&'static str),

    #[error("malformed discovery mapping: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lm007_cycle_message_lists_members() {
        let e = GraphError::CyclicDependency {
            cycle: vec!["A".into(), "B".into()],
        };
        assert_eq!(e.to_string(), "dependency cycle detected involving: A, B");
    }

    #[test]
    fn test_lm007_decorator_failure_wraps_source() {
        let failure = DecoratorFailure {
            decorator: "tables".into(),
            source: DecoratorError::msg("throughput quota exceeded"),
        };
        let err = CompileError::from(failure);
        assert!(err.graph_error().is_none());
        assert_eq!(
            err.to_string(),
            "compile failed: decorator 'tables' failed: throughput quota exceeded"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("tables"));
    }

    #[test]
    fn test_lm007_graph_error_converts() {
        let err: CompileError = GraphError::DuplicateIdentifier { id: "T".into() }.into();
        assert_eq!(
            err.graph_error(),
            Some(&GraphError::DuplicateIdentifier { id: "T".into() })
        );
    }
}
