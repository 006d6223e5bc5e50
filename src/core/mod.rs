//! Core compiler logic — taxonomy, privileges, graph, decorators, compilation.

pub mod artifact;
pub mod codegen;
pub mod compiler;
pub mod decorator;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod hasher;
pub mod identifier;
pub mod parser;
pub mod planner;
pub mod privilege;
pub mod taxonomy;
pub mod types;
