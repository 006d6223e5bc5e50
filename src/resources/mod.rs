//! Resource emitters — build template nodes for each kind the compiler owns.
//!
//! Functions and roles are generated from function units; stores come from
//! declarations and are injected through [`store::StoreDecorator`].

pub mod function;
pub mod role;
pub mod store;
