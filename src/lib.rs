//! Lamina — declarative function-to-infrastructure compiler.
//!
//! Least-privilege roles from a static action taxonomy. A validated
//! dependency DAG. Decorator hooks for everything hand-declared.

pub mod cli;
pub mod core;
pub mod resources;
